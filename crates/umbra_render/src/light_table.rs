//! Light Table
//!
//! The authoritative slot-indexed light and shadow-source data. Commands are
//! applied one at a time in the order they were drained; each store overwrites
//! its slot wholesale, so the last writer wins.
//!
//! The serialized form is all light slots followed by all shadow-source slots,
//! each slot at a fixed offset. Empty slots serialize as zeroes.

use serde::{Deserialize, Serialize};

use crate::command::{Command, CommandBlock};
use crate::record::{
    slot_index, LightRecord, ShadowSourceRecord, LIGHT_RECORD_SIZE, MAX_LIGHTS,
    SHADOW_SOURCES_PER_LIGHT, SHADOW_SOURCE_RECORD_SIZE,
};

/// Result of applying one command
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The table changed (or was already in the requested state)
    Applied,
    /// Slot out of range; nothing changed
    Rejected,
    /// Unrecognized tag; nothing changed
    Ignored,
}

/// Table statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableStats {
    /// Commands applied since creation
    pub applied: u64,
    /// Commands with an out-of-range slot
    pub rejected: u64,
    /// Commands with an unknown tag
    pub ignored: u64,
}

/// Slot-indexed light and shadow-source storage
#[derive(Clone, Debug)]
pub struct LightTable {
    lights: Vec<LightRecord>,
    shadow_sources: Vec<ShadowSourceRecord>,
    stats: TableStats,
}

impl Default for LightTable {
    fn default() -> Self {
        Self::new(MAX_LIGHTS)
    }
}

impl LightTable {
    /// Table with `max_lights` light slots and six shadow-source slots per light
    pub fn new(max_lights: usize) -> Self {
        Self::with_capacity(max_lights, max_lights * SHADOW_SOURCES_PER_LIGHT)
    }

    /// Table with explicit capacities
    pub fn with_capacity(max_lights: usize, max_shadow_sources: usize) -> Self {
        Self {
            lights: vec![LightRecord::default(); max_lights],
            shadow_sources: vec![ShadowSourceRecord::default(); max_shadow_sources],
            stats: TableStats::default(),
        }
    }

    /// Apply a single command
    pub fn apply(&mut self, command: &Command) -> ApplyOutcome {
        let outcome = match command {
            Command::StoreLight(record) => match self.light_slot(record.slot) {
                Some(slot) => {
                    self.lights[slot] = *record;
                    ApplyOutcome::Applied
                }
                None => ApplyOutcome::Rejected,
            },
            Command::RemoveLight { slot } => match self.light_slot(*slot) {
                Some(slot) => {
                    self.lights[slot] = LightRecord::default();
                    ApplyOutcome::Applied
                }
                None => ApplyOutcome::Rejected,
            },
            Command::StoreShadowSource(record) => match self.source_slot(record.slot) {
                Some(slot) => {
                    self.shadow_sources[slot] = *record;
                    ApplyOutcome::Applied
                }
                None => ApplyOutcome::Rejected,
            },
            Command::RemoveShadowSources { first, count } => {
                self.remove_sources(*first, *count)
            }
            Command::Unknown { .. } => ApplyOutcome::Ignored,
        };

        match outcome {
            ApplyOutcome::Applied => self.stats.applied += 1,
            ApplyOutcome::Rejected => {
                self.stats.rejected += 1;
                log::warn!("Rejected out-of-range command: {:?}", command);
            }
            ApplyOutcome::Ignored => {
                self.stats.ignored += 1;
                log::trace!("Ignored command: {:?}", command);
            }
        }
        outcome
    }

    /// Decode and apply one block
    pub fn apply_block(&mut self, block: &CommandBlock) -> ApplyOutcome {
        self.apply(&Command::decode(block))
    }

    /// Apply a batch in order, returning how many commands were applied
    pub fn apply_all(&mut self, blocks: &[CommandBlock]) -> usize {
        blocks
            .iter()
            .filter(|block| self.apply_block(block) == ApplyOutcome::Applied)
            .count()
    }

    /// Clear `first..=first + count`, clamped to the table
    fn remove_sources(&mut self, first: f32, count: f32) -> ApplyOutcome {
        let (Some(first), Some(count)) = (slot_index(first), slot_index(count)) else {
            return ApplyOutcome::Rejected;
        };
        if first >= self.shadow_sources.len() {
            return ApplyOutcome::Rejected;
        }
        let last = first
            .saturating_add(count)
            .min(self.shadow_sources.len() - 1);
        for source in &mut self.shadow_sources[first..=last] {
            *source = ShadowSourceRecord::default();
        }
        ApplyOutcome::Applied
    }

    fn light_slot(&self, slot: f32) -> Option<usize> {
        slot_index(slot).filter(|s| *s < self.lights.len())
    }

    fn source_slot(&self, slot: f32) -> Option<usize> {
        slot_index(slot).filter(|s| *s < self.shadow_sources.len())
    }

    /// Light in `slot`, if present
    pub fn light(&self, slot: usize) -> Option<&LightRecord> {
        self.lights.get(slot).filter(|l| !l.is_empty())
    }

    /// Shadow source in `slot`, if present
    pub fn shadow_source(&self, slot: usize) -> Option<&ShadowSourceRecord> {
        self.shadow_sources.get(slot).filter(|s| !s.is_empty())
    }

    /// All light slots, empty ones included
    pub fn lights(&self) -> &[LightRecord] {
        &self.lights
    }

    /// All shadow-source slots, empty ones included
    pub fn shadow_sources(&self) -> &[ShadowSourceRecord] {
        &self.shadow_sources
    }

    /// Number of occupied light slots
    pub fn active_lights(&self) -> usize {
        self.lights.iter().filter(|l| !l.is_empty()).count()
    }

    pub fn max_lights(&self) -> usize {
        self.lights.len()
    }

    pub fn max_shadow_sources(&self) -> usize {
        self.shadow_sources.len()
    }

    pub fn stats(&self) -> TableStats {
        self.stats
    }

    /// Size of the serialized table in bytes
    pub fn byte_size(&self) -> usize {
        self.lights.len() * LIGHT_RECORD_SIZE
            + self.shadow_sources.len() * SHADOW_SOURCE_RECORD_SIZE
    }

    /// Serialize into `out`, returning the number of bytes written
    ///
    /// Writes nothing if `out` is smaller than [`byte_size`](Self::byte_size).
    pub fn serialize_into(&self, out: &mut [u8]) -> usize {
        let size = self.byte_size();
        if out.len() < size {
            log::warn!(
                "Light table needs {} bytes, destination has {}",
                size,
                out.len()
            );
            return 0;
        }
        let light_bytes: &[u8] = bytemuck::cast_slice(&self.lights);
        let source_bytes: &[u8] = bytemuck::cast_slice(&self.shadow_sources);
        out[..light_bytes.len()].copy_from_slice(light_bytes);
        out[light_bytes.len()..size].copy_from_slice(source_bytes);
        size
    }

    /// Serialize into a fresh buffer
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.byte_size()];
        self.serialize_into(&mut bytes);
        bytes
    }

    /// Snapshot the table contents
    pub fn save_state(&self) -> LightTableState {
        LightTableState {
            lights: self.lights.clone(),
            shadow_sources: self.shadow_sources.clone(),
        }
    }

    /// Restore a snapshot, keeping this table's capacities
    pub fn restore_state(&mut self, state: LightTableState) {
        let max_lights = self.lights.len();
        let max_sources = self.shadow_sources.len();

        self.lights = state.lights;
        self.shadow_sources = state.shadow_sources;

        // Enforce capacities
        self.lights.resize(max_lights, LightRecord::default());
        self.shadow_sources
            .resize(max_sources, ShadowSourceRecord::default());
    }
}

/// Serialized table contents
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LightTableState {
    pub lights: Vec<LightRecord>,
    pub shadow_sources: Vec<ShadowSourceRecord>,
}
