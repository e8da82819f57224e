//! Packed GPU Table Records
//!
//! Fixed-size slot records for the light data table. Every field is an `f32`
//! (integers are stored as integer-valued floats) so the table can be sampled
//! as a float buffer texture.
//!
//! # Layout
//!
//! - Light: slot, type, extra, [ss0, pos.xyz, color.rgb, radius], inner radius
//!   = 12 floats (48 bytes)
//! - Shadow source: slot, mvp (16, column-major), uv rect (4) = 21 floats
//!   (84 bytes)

use core::fmt;
use serde::{Deserialize, Serialize};

/// Default light table capacity
pub const MAX_LIGHTS: usize = 16;
/// Shadow sources reserved per light (one per cube face)
pub const SHADOW_SOURCES_PER_LIGHT: usize = 6;
/// Default shadow-source table capacity
pub const MAX_SHADOW_SOURCES: usize = MAX_LIGHTS * SHADOW_SOURCES_PER_LIGHT;

/// Size of one light slot in bytes
pub const LIGHT_RECORD_SIZE: usize = core::mem::size_of::<LightRecord>();
/// Size of one shadow-source slot in bytes
pub const SHADOW_SOURCE_RECORD_SIZE: usize = core::mem::size_of::<ShadowSourceRecord>();
/// Size of the serialized table for the default capacities
pub const LIGHT_DATA_SIZE: usize =
    LIGHT_RECORD_SIZE * MAX_LIGHTS + SHADOW_SOURCE_RECORD_SIZE * MAX_SHADOW_SOURCES;

/// Light type tag as stored in the table
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LightKind {
    /// Unused slot
    #[default]
    Empty = 0,
    Point = 1,
    Spot = 2,
}

impl LightKind {
    /// Decode a stored tag; anything unrecognized reads as empty
    pub fn from_tag(tag: f32) -> Self {
        match tag as i32 {
            1 => Self::Point,
            2 => Self::Spot,
            _ => Self::Empty,
        }
    }

    /// Tag value written into the record
    pub fn tag(self) -> f32 {
        self as u8 as f32
    }

    /// Number of shadow sources a shadow-casting light of this kind needs
    pub fn shadow_source_count(self) -> usize {
        match self {
            Self::Point => SHADOW_SOURCES_PER_LIGHT,
            Self::Spot => 1,
            Self::Empty => 0,
        }
    }
}

/// One light slot
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightRecord {
    /// Slot index in the light table
    pub slot: f32,
    /// [`LightKind`] tag
    pub kind: f32,
    /// Extra scalar (light profile index, -1 if unused)
    pub extra: f32,
    /// First shadow-source slot (-1 if the light casts no shadows)
    pub shadow_source: f32,
    /// World position
    pub position: [f32; 3],
    /// Light color (linear RGB)
    pub color: [f32; 3],
    /// Outer radius
    pub radius: f32,
    /// Inner radius
    pub inner_radius: f32,
}

impl LightRecord {
    /// Create a record for `slot`
    pub fn new(slot: u32, kind: LightKind, position: [f32; 3], color: [f32; 3], radius: f32) -> Self {
        Self {
            slot: slot as f32,
            kind: kind.tag(),
            extra: -1.0,
            shadow_source: -1.0,
            position,
            color,
            radius,
            inner_radius: 0.0,
        }
    }

    /// Set the first shadow-source slot
    pub fn with_shadow_source(mut self, first: Option<u32>) -> Self {
        self.shadow_source = first.map_or(-1.0, |s| s as f32);
        self
    }

    /// Set the inner radius
    pub fn with_inner_radius(mut self, inner_radius: f32) -> Self {
        self.inner_radius = inner_radius;
        self
    }

    /// Decoded light kind
    pub fn light_kind(&self) -> LightKind {
        LightKind::from_tag(self.kind)
    }

    /// An empty record is logically absent
    pub fn is_empty(&self) -> bool {
        self.light_kind() == LightKind::Empty
    }

    /// Slot index, if the stored value is a valid index
    pub fn slot_index(&self) -> Option<usize> {
        slot_index(self.slot)
    }

    /// First shadow-source slot, if any
    pub fn shadow_source_index(&self) -> Option<usize> {
        slot_index(self.shadow_source)
    }
}

impl fmt::Display for LightRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "LightRecord {{")?;
        writeln!(f, "    slot: {}", self.slot as i32)?;
        writeln!(f, "    type: {:?}", self.light_kind())?;
        writeln!(f, "    extra: {}", self.extra)?;
        writeln!(f, "    ss0: {}", self.shadow_source as i32)?;
        writeln!(
            f,
            "    pos: [{}, {}, {}]",
            self.position[0], self.position[1], self.position[2]
        )?;
        writeln!(
            f,
            "    color: [{}, {}, {}]",
            self.color[0], self.color[1], self.color[2]
        )?;
        writeln!(f, "    radius: {}", self.radius)?;
        writeln!(f, "    iradius: {}", self.inner_radius)?;
        write!(f, "}}")
    }
}

/// One shadow-source slot
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowSourceRecord {
    /// Slot index in the shadow-source table
    pub slot: f32,
    /// Shadow caster model-view-projection (column-major)
    pub mvp: [[f32; 4]; 4],
    /// Atlas tile: u, v, width, height (normalized)
    pub uv: [f32; 4],
}

impl ShadowSourceRecord {
    /// Create a record for `slot`
    pub fn new(slot: u32, mvp: [[f32; 4]; 4], uv: [f32; 4]) -> Self {
        Self {
            slot: slot as f32,
            mvp,
            uv,
        }
    }

    /// Slot index, if the stored value is a valid index
    pub fn slot_index(&self) -> Option<usize> {
        slot_index(self.slot)
    }

    /// Only a fully zeroed record is absent
    pub fn is_empty(&self) -> bool {
        bytemuck::bytes_of(self).iter().all(|b| *b == 0)
    }
}

impl fmt::Display for ShadowSourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ShadowSourceRecord {{")?;
        writeln!(f, "    slot: {}", self.slot as i32)?;
        writeln!(f, "    mvp: [")?;
        // Printed row by row
        for row in 0..4 {
            writeln!(
                f,
                "        {}, {}, {}, {},",
                self.mvp[0][row], self.mvp[1][row], self.mvp[2][row], self.mvp[3][row]
            )?;
        }
        writeln!(f, "    ]")?;
        writeln!(
            f,
            "    uv: [{}, {}, {}, {}]",
            self.uv[0], self.uv[1], self.uv[2], self.uv[3]
        )?;
        write!(f, "}}")
    }
}

/// Convert an integer-valued float into a slot index
pub(crate) fn slot_index(value: f32) -> Option<usize> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 {
        Some(value as usize)
    } else {
        None
    }
}
