//! Light Management
//!
//! The light manager owns the scene-side view of lights: which slot each
//! light occupies, which shadow sources it owns, and what has changed since
//! the last frame. It never touches the [`LightTable`](crate::light_table::LightTable)
//! directly; it only emits commands.
//!
//! # Shadow Sources
//!
//! A shadow-casting point light owns six consecutive shadow-source slots (one
//! per cube face, ordered +X -X +Y -Y +Z -Z); a spot light owns one. Sources
//! are re-rendered when stale and when the light is within the shadow update
//! distance of the camera, subject to the shadow manager's budget.

use std::collections::VecDeque;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandQueue};
use crate::record::{LightKind, LightRecord};
use crate::shadow::{ShadowAtlas, ShadowConfig, ShadowManager, ShadowRender};

/// Cube face look directions and up vectors
const CUBE_FACES: [(Vec3, Vec3); 6] = [
    (Vec3::X, Vec3::NEG_Y),
    (Vec3::NEG_X, Vec3::NEG_Y),
    (Vec3::Y, Vec3::Z),
    (Vec3::NEG_Y, Vec3::NEG_Z),
    (Vec3::Z, Vec3::NEG_Y),
    (Vec3::NEG_Z, Vec3::NEG_Y),
];

/// A light as described by the application
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub kind: LightKind,
    /// World position
    pub position: [f32; 3],
    /// Spot direction (ignored for point lights)
    pub direction: [f32; 3],
    /// Linear RGB color
    pub color: [f32; 3],
    /// Outer radius
    pub radius: f32,
    /// Inner radius
    pub inner_radius: f32,
    /// Spot cone angle in degrees
    pub fov: f32,
    pub casts_shadows: bool,
    /// Light profile index, -1 if unused
    pub profile: i32,
}

impl Light {
    /// Create a point light
    pub fn point(position: [f32; 3], color: [f32; 3], radius: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: [0.0, 0.0, -1.0],
            color,
            radius,
            inner_radius: 0.0,
            fov: 90.0,
            casts_shadows: false,
            profile: -1,
        }
    }

    /// Create a spot light
    pub fn spot(position: [f32; 3], direction: [f32; 3], color: [f32; 3], radius: f32, fov: f32) -> Self {
        Self {
            kind: LightKind::Spot,
            direction,
            fov,
            ..Self::point(position, color, radius)
        }
    }

    /// Enable or disable shadow casting
    pub fn with_shadows(mut self, casts_shadows: bool) -> Self {
        self.casts_shadows = casts_shadows;
        self
    }

    /// Set inner radius
    pub fn with_inner_radius(mut self, inner_radius: f32) -> Self {
        self.inner_radius = inner_radius;
        self
    }

    /// Set light profile index
    pub fn with_profile(mut self, profile: i32) -> Self {
        self.profile = profile;
        self
    }

    /// Shadow sources this light needs
    pub fn shadow_source_count(&self) -> usize {
        if self.casts_shadows {
            self.kind.shadow_source_count()
        } else {
            0
        }
    }

    /// Table record for `slot`
    pub fn to_record(&self, slot: u32, first_source: Option<u32>) -> LightRecord {
        let mut record = LightRecord::new(slot, self.kind, self.position, self.color, self.radius)
            .with_shadow_source(first_source)
            .with_inner_radius(self.inner_radius);
        record.extra = self.profile as f32;
        record
    }

    /// View-projection for shadow source `face` (0 for spot lights)
    pub fn shadow_matrix(&self, face: usize, near_plane: f32) -> Mat4 {
        let position = Vec3::from(self.position);
        let far = self.radius.max(near_plane * 2.0);

        match self.kind {
            LightKind::Spot => {
                let direction = Vec3::from(self.direction).try_normalize().unwrap_or(Vec3::NEG_Z);
                let up = if direction.dot(Vec3::Y).abs() > 0.99 {
                    Vec3::Z
                } else {
                    Vec3::Y
                };
                let fov = self.fov.clamp(1.0, 179.0).to_radians();
                let view = Mat4::look_at_rh(position, position + direction, up);
                Mat4::perspective_rh(fov, 1.0, near_plane, far) * view
            }
            _ => {
                let (direction, up) = CUBE_FACES[face % CUBE_FACES.len()];
                let view = Mat4::look_at_rh(position, position + direction, up);
                Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, near_plane, far) * view
            }
        }
    }
}

/// Stable reference to a managed light
///
/// Handles go stale when their light is removed, even if the slot is reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LightHandle {
    slot: u32,
    generation: u32,
}

impl LightHandle {
    /// Light table slot
    pub fn slot(&self) -> u32 {
        self.slot
    }
}

/// Light manager contract
pub trait LightManager {
    /// Start managing a light; `None` when no slot is free
    fn add_light(&mut self, light: Light) -> Option<LightHandle>;

    /// Stop managing a light; `false` for stale handles
    fn remove_light(&mut self, handle: LightHandle) -> bool;

    /// Replace a managed light's parameters
    fn update_light(&mut self, handle: LightHandle, light: Light) -> bool;

    /// Camera position used for shadow update culling
    fn set_camera_position(&mut self, position: [f32; 3]);

    /// Lights farther than this keep their stale shadows
    fn set_shadow_update_distance(&mut self, distance: f32);

    /// Mark every shadow source for re-rendering
    fn invalidate_shadows(&mut self);

    /// Managed light count
    fn num_lights(&self) -> usize;

    /// Emit this frame's commands and shadow render requests
    fn update(&mut self, queue: &mut CommandQueue, shadows: &mut dyn ShadowManager);
}

#[derive(Clone, Debug)]
struct ManagedLight {
    light: Light,
    generation: u32,
    first_source: Option<u32>,
    dirty: bool,
    stale: Vec<bool>,
}

impl ManagedLight {
    fn source_count(&self) -> usize {
        self.stale.len()
    }
}

/// Default [`LightManager`]: first-free slot allocation with contiguous
/// shadow-source ranges
#[derive(Debug)]
pub struct SlotLightManager {
    slots: Vec<Option<ManagedLight>>,
    next_generation: u32,
    sources_used: Vec<bool>,
    pending: VecDeque<Command>,
    atlas: ShadowAtlas,
    camera_position: Vec3,
    update_distance: f32,
    near_plane: f32,
}

impl SlotLightManager {
    /// Manager for `max_lights` lights whose shadows live in `atlas`
    pub fn new(max_lights: usize, atlas: ShadowAtlas, config: &ShadowConfig) -> Self {
        Self {
            slots: vec![None; max_lights],
            next_generation: 0,
            sources_used: vec![false; atlas.max_sources() as usize],
            pending: VecDeque::new(),
            atlas,
            camera_position: Vec3::ZERO,
            update_distance: config.update_distance,
            near_plane: config.near_plane,
        }
    }

    /// Managed light, if the handle is live
    pub fn light(&self, handle: LightHandle) -> Option<&Light> {
        self.managed(handle).map(|m| &m.light)
    }

    /// First shadow-source slot of a managed light
    pub fn shadow_sources(&self, handle: LightHandle) -> Option<(u32, usize)> {
        let managed = self.managed(handle)?;
        managed.first_source.map(|first| (first, managed.source_count()))
    }

    /// Commands waiting for room in the queue
    pub fn pending_commands(&self) -> usize {
        self.pending.len()
    }

    pub fn max_lights(&self) -> usize {
        self.slots.len()
    }

    fn managed(&self, handle: LightHandle) -> Option<&ManagedLight> {
        self.slots
            .get(handle.slot as usize)?
            .as_ref()
            .filter(|m| m.generation == handle.generation)
    }

    fn managed_mut(&mut self, handle: LightHandle) -> Option<&mut ManagedLight> {
        self.slots
            .get_mut(handle.slot as usize)?
            .as_mut()
            .filter(|m| m.generation == handle.generation)
    }

    /// First-fit search for `count` consecutive free sources
    fn allocate_sources(&mut self, count: usize) -> Option<u32> {
        if count == 0 || count > self.sources_used.len() {
            return None;
        }
        let first = (0..=self.sources_used.len() - count)
            .find(|start| self.sources_used[*start..*start + count].iter().all(|used| !used))?;
        self.sources_used[first..first + count].fill(true);
        Some(first as u32)
    }

    /// Release a light's sources and queue their removal
    fn release_sources(&mut self, first: Option<u32>, count: usize) {
        let Some(first) = first else {
            return;
        };
        let start = first as usize;
        let end = (start + count).min(self.sources_used.len());
        self.sources_used[start..end].fill(false);
        if let Some(command) = Command::remove_shadow_sources(first, count as u32) {
            self.pending.push_back(command);
        }
    }

    /// Allocate shadow sources for `light`, falling back to no shadows
    fn sources_for(&mut self, light: &Light) -> (Option<u32>, usize) {
        let count = light.shadow_source_count();
        if count == 0 {
            return (None, 0);
        }
        match self.allocate_sources(count) {
            Some(first) => (Some(first), count),
            None => {
                log::warn!(
                    "No room for {} shadow sources, light will not cast shadows",
                    count
                );
                (None, 0)
            }
        }
    }

    fn in_update_range(&self, light: &Light) -> bool {
        let distance = Vec3::from(light.position).distance(self.camera_position);
        distance - light.radius <= self.update_distance
    }

    /// Flush queued removals; `false` if the queue filled up first
    fn flush_pending(&mut self, queue: &mut CommandQueue) -> bool {
        while let Some(command) = self.pending.front() {
            if !queue.enqueue(command) {
                return false;
            }
            self.pending.pop_front();
        }
        true
    }
}

impl LightManager for SlotLightManager {
    fn add_light(&mut self, light: Light) -> Option<LightHandle> {
        if light.kind == LightKind::Empty {
            log::warn!("Refusing to add a light of kind Empty");
            return None;
        }
        let Some(slot) = self.slots.iter().position(Option::is_none) else {
            log::warn!("All {} light slots in use", self.slots.len());
            return None;
        };

        let (first_source, count) = self.sources_for(&light);
        let generation = self.next_generation;
        self.next_generation = self.next_generation.wrapping_add(1);

        log::debug!(
            "Light {:?} -> slot {} (shadow sources: {:?} x{})",
            light.kind,
            slot,
            first_source,
            count
        );

        self.slots[slot] = Some(ManagedLight {
            light,
            generation,
            first_source,
            dirty: true,
            stale: vec![true; count],
        });

        Some(LightHandle {
            slot: slot as u32,
            generation,
        })
    }

    fn remove_light(&mut self, handle: LightHandle) -> bool {
        if self.managed(handle).is_none() {
            return false;
        }
        let Some(managed) = self.slots[handle.slot as usize].take() else {
            return false;
        };

        self.pending.push_back(Command::remove_light(handle.slot));
        self.release_sources(managed.first_source, managed.source_count());
        log::debug!("Removed light in slot {}", handle.slot);
        true
    }

    fn update_light(&mut self, handle: LightHandle, light: Light) -> bool {
        let Some(managed) = self.managed(handle) else {
            return false;
        };

        let reallocate = managed.light.shadow_source_count() != light.shadow_source_count();
        let (old_first, old_count) = (managed.first_source, managed.source_count());

        let (first_source, count) = if reallocate {
            self.release_sources(old_first, old_count);
            self.sources_for(&light)
        } else {
            (old_first, old_count)
        };

        if let Some(managed) = self.managed_mut(handle) {
            managed.light = light;
            managed.first_source = first_source;
            managed.dirty = true;
            managed.stale = vec![true; count];
        }
        true
    }

    fn set_camera_position(&mut self, position: [f32; 3]) {
        self.camera_position = Vec3::from(position);
    }

    fn set_shadow_update_distance(&mut self, distance: f32) {
        self.update_distance = distance.max(0.0);
    }

    fn invalidate_shadows(&mut self) {
        for managed in self.slots.iter_mut().flatten() {
            managed.stale.fill(true);
        }
    }

    fn num_lights(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    fn update(&mut self, queue: &mut CommandQueue, shadows: &mut dyn ShadowManager) {
        // Removals go first so reused slots are cleared before being stored
        if !self.flush_pending(queue) {
            return;
        }

        for (slot, entry) in self.slots.iter_mut().enumerate() {
            let Some(managed) = entry.as_mut().filter(|m| m.dirty) else {
                continue;
            };
            let record = managed.light.to_record(slot as u32, managed.first_source);
            if !queue.enqueue(&Command::StoreLight(record)) {
                return;
            }
            managed.dirty = false;
        }

        for slot in 0..self.slots.len() {
            let Some(managed) = self.slots[slot].as_ref() else {
                continue;
            };
            let Some(first) = managed.first_source else {
                continue;
            };
            if !managed.stale.contains(&true) || !self.in_update_range(&managed.light) {
                continue;
            }

            let light = managed.light.clone();
            let stale = managed.stale.clone();
            for (face, _) in stale.iter().enumerate().filter(|(_, s)| **s) {
                let source = first + face as u32;
                let (Some(uv), Some(viewport)) =
                    (self.atlas.tile_uv(source), self.atlas.tile_viewport(source))
                else {
                    continue;
                };
                if queue.is_full() {
                    return;
                }

                let render = ShadowRender {
                    slot: source,
                    mvp: light.shadow_matrix(face, self.near_plane).to_cols_array_2d(),
                    uv,
                    viewport,
                };
                if !shadows.add_update(render) {
                    return;
                }
                queue.enqueue(&Command::StoreShadowSource(render.record()));
                if let Some(managed) = self.slots[slot].as_mut() {
                    managed.stale[face] = false;
                }
            }
        }
    }
}
