//! GPU Command Queue
//!
//! Producers (the light manager, the driver) enqueue fixed-size command
//! blocks. Once per frame the driver drains a bounded batch, applies it to the
//! [`LightTable`](crate::light_table::LightTable) in FIFO order and uploads the
//! same batch for GPU-side consumers.
//!
//! # Block Layout
//!
//! Each block is [`COMMAND_WORDS`] floats. Word 0 is the tag, the payload
//! follows:
//!
//! | Tag | Command | Payload |
//! |-----|---------|---------|
//! | 1 | store light | [`LightRecord`] (12 words) |
//! | 2 | remove light | slot |
//! | 3 | store shadow source | [`ShadowSourceRecord`] (21 words) |
//! | 4 | remove shadow sources | first slot, count |
//!
//! Unused words are zero.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::record::{slot_index, LightRecord, ShadowSourceRecord};

/// Maximum commands drained per frame, and the default queue capacity
pub const COMMAND_QUEUE_LIMIT: usize = 1024;
/// Words per command block
pub const COMMAND_WORDS: usize = 32;
/// Bytes per command block
pub const COMMAND_SIZE: usize = COMMAND_WORDS * 4;

/// Command tags
pub mod tag {
    pub const STORE_LIGHT: i32 = 1;
    pub const REMOVE_LIGHT: i32 = 2;
    pub const STORE_SHADOW_SOURCE: i32 = 3;
    pub const REMOVE_SHADOW_SOURCES: i32 = 4;
}

const LIGHT_WORDS: usize = core::mem::size_of::<LightRecord>() / 4;
const SOURCE_WORDS: usize = core::mem::size_of::<ShadowSourceRecord>() / 4;

/// One fixed-size encoded command
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CommandBlock {
    pub words: [f32; COMMAND_WORDS],
}

impl Default for CommandBlock {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

impl CommandBlock {
    /// Block carrying only a tag
    pub fn with_tag(tag: i32) -> Self {
        let mut block = Self::default();
        block.words[0] = tag as f32;
        block
    }

    /// Raw tag value
    pub fn tag(&self) -> i32 {
        self.words[0] as i32
    }

    /// Block as bytes
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

/// Decoded command
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Overwrite the light slot named by the record
    StoreLight(LightRecord),
    /// Clear a light slot
    RemoveLight { slot: f32 },
    /// Overwrite the shadow-source slot named by the record
    StoreShadowSource(ShadowSourceRecord),
    /// Clear shadow-source slots `first..=first + count`
    ///
    /// The range is inclusive: `count` is the index offset of the last slot,
    /// so clearing `n` sources takes `count = n - 1`.
    RemoveShadowSources { first: f32, count: f32 },
    /// Unrecognized tag; ignored when applied
    Unknown { tag: i32 },
}

impl Command {
    /// Remove a light slot
    pub fn remove_light(slot: u32) -> Self {
        Self::RemoveLight { slot: slot as f32 }
    }

    /// Remove `n` consecutive shadow sources starting at `first`
    ///
    /// Returns `None` for `n == 0`.
    pub fn remove_shadow_sources(first: u32, n: u32) -> Option<Self> {
        if n == 0 {
            return None;
        }
        Some(Self::RemoveShadowSources {
            first: first as f32,
            count: (n - 1) as f32,
        })
    }

    /// Encode into a fixed-size block
    pub fn encode(&self) -> CommandBlock {
        match self {
            Self::StoreLight(record) => {
                let mut block = CommandBlock::with_tag(tag::STORE_LIGHT);
                let payload: &[f32] = bytemuck::cast_slice(core::slice::from_ref(record));
                block.words[1..1 + LIGHT_WORDS].copy_from_slice(payload);
                block
            }
            Self::RemoveLight { slot } => {
                let mut block = CommandBlock::with_tag(tag::REMOVE_LIGHT);
                block.words[1] = *slot;
                block
            }
            Self::StoreShadowSource(record) => {
                let mut block = CommandBlock::with_tag(tag::STORE_SHADOW_SOURCE);
                let payload: &[f32] = bytemuck::cast_slice(core::slice::from_ref(record));
                block.words[1..1 + SOURCE_WORDS].copy_from_slice(payload);
                block
            }
            Self::RemoveShadowSources { first, count } => {
                let mut block = CommandBlock::with_tag(tag::REMOVE_SHADOW_SOURCES);
                block.words[1] = *first;
                block.words[2] = *count;
                block
            }
            Self::Unknown { tag } => CommandBlock::with_tag(*tag),
        }
    }

    /// Decode a block
    pub fn decode(block: &CommandBlock) -> Self {
        match block.tag() {
            tag::STORE_LIGHT => {
                let bytes: &[u8] = bytemuck::cast_slice(&block.words[1..1 + LIGHT_WORDS]);
                Self::StoreLight(bytemuck::pod_read_unaligned(bytes))
            }
            tag::REMOVE_LIGHT => Self::RemoveLight {
                slot: block.words[1],
            },
            tag::STORE_SHADOW_SOURCE => {
                let bytes: &[u8] = bytemuck::cast_slice(&block.words[1..1 + SOURCE_WORDS]);
                Self::StoreShadowSource(bytemuck::pod_read_unaligned(bytes))
            }
            tag::REMOVE_SHADOW_SOURCES => Self::RemoveShadowSources {
                first: block.words[1],
                count: block.words[2],
            },
            tag => Self::Unknown { tag },
        }
    }

    /// Slot addressed by single-slot commands
    pub fn slot(&self) -> Option<usize> {
        match self {
            Self::StoreLight(record) => record.slot_index(),
            Self::RemoveLight { slot } => slot_index(*slot),
            Self::StoreShadowSource(record) => record.slot_index(),
            Self::RemoveShadowSources { first, .. } => slot_index(*first),
            Self::Unknown { .. } => None,
        }
    }
}

/// Queue statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Commands accepted since creation
    pub enqueued: u64,
    /// Commands drained since creation
    pub drained: u64,
    /// Commands refused because the queue was full
    pub overflow_count: u64,
}

/// Bounded FIFO of command blocks
#[derive(Debug)]
pub struct CommandQueue {
    blocks: VecDeque<CommandBlock>,
    capacity: usize,
    stats: QueueStats,
    overflow_logged: bool,
}

impl Default for CommandQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandQueue {
    /// Queue holding up to [`COMMAND_QUEUE_LIMIT`] commands
    pub fn new() -> Self {
        Self::with_capacity(COMMAND_QUEUE_LIMIT)
    }

    /// Queue holding up to `capacity` commands
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            blocks: VecDeque::with_capacity(capacity),
            capacity,
            stats: QueueStats::default(),
            overflow_logged: false,
        }
    }

    /// Enqueue a command
    ///
    /// Returns `false` and leaves the queue untouched when it is full; retrying
    /// is up to the producer.
    pub fn enqueue(&mut self, command: &Command) -> bool {
        self.enqueue_block(command.encode())
    }

    /// Enqueue an already-encoded block
    pub fn enqueue_block(&mut self, block: CommandBlock) -> bool {
        if self.is_full() {
            self.stats.overflow_count += 1;
            // Once until the next drain
            if !self.overflow_logged {
                self.overflow_logged = true;
                log::warn!(
                    "Command queue full ({} commands), dropping tag {}",
                    self.capacity,
                    block.tag()
                );
            }
            return false;
        }
        self.blocks.push_back(block);
        self.stats.enqueued += 1;
        true
    }

    /// Remove and return up to `max_count` commands in FIFO order
    pub fn drain(&mut self, max_count: usize) -> Vec<CommandBlock> {
        let count = max_count.min(self.blocks.len());
        self.stats.drained += count as u64;
        self.overflow_logged = false;
        self.blocks.drain(..count).collect()
    }

    /// Move up to `max_count` commands into `out`, returning how many
    ///
    /// Never writes past `out.len()`. Slots past the returned count are left
    /// as they were.
    pub fn write_commands_to(&mut self, out: &mut [CommandBlock], max_count: usize) -> usize {
        let count = max_count.min(out.len()).min(self.blocks.len());
        for (slot, block) in out.iter_mut().zip(self.blocks.drain(..count)) {
            *slot = block;
        }
        self.stats.drained += count as u64;
        self.overflow_logged = false;
        count
    }

    /// Pending command count
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.blocks.len() >= self.capacity
    }

    /// Remaining room before the queue refuses commands
    pub fn remaining(&self) -> usize {
        self.capacity.saturating_sub(self.blocks.len())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    /// Discard all pending commands
    pub fn clear(&mut self) {
        self.blocks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LightKind;

    fn light(slot: u32) -> LightRecord {
        LightRecord::new(slot, LightKind::Point, [1.0, 2.0, 3.0], [1.0, 0.5, 0.25], 8.0)
    }

    #[test]
    fn test_block_size() {
        assert_eq!(core::mem::size_of::<CommandBlock>(), COMMAND_SIZE);
        assert!(LIGHT_WORDS + 1 <= COMMAND_WORDS);
        assert!(SOURCE_WORDS + 1 <= COMMAND_WORDS);
    }

    #[test]
    fn test_store_light_encoding() {
        let block = Command::StoreLight(light(5)).encode();
        assert_eq!(block.tag(), tag::STORE_LIGHT);
        assert_eq!(block.words[1], 5.0);
        assert_eq!(Command::decode(&block), Command::StoreLight(light(5)));
        assert!(block.words[1 + LIGHT_WORDS..].iter().all(|w| *w == 0.0));
    }

    #[test]
    fn test_shadow_source_encoding() {
        let mut mvp = [[0.0; 4]; 4];
        mvp[3][2] = -7.5;
        let record = ShadowSourceRecord::new(40, mvp, [0.25, 0.5, 0.25, 0.25]);
        let block = Command::StoreShadowSource(record).encode();

        assert_eq!(block.words[0], 3.0);
        assert_eq!(block.words[1], 40.0);
        assert_eq!(block.words[1 + 1 + 14], -7.5);
        assert_eq!(&block.words[18..22], &[0.25, 0.5, 0.25, 0.25]);
        assert_eq!(Command::decode(&block).slot(), Some(40));
    }

    #[test]
    fn test_remove_sources_is_inclusive() {
        let command = Command::remove_shadow_sources(12, 6).unwrap();
        assert_eq!(
            command,
            Command::RemoveShadowSources {
                first: 12.0,
                count: 5.0
            }
        );
        assert!(Command::remove_shadow_sources(0, 0).is_none());
    }

    #[test]
    fn test_unknown_tag_decodes() {
        let block = CommandBlock::with_tag(99);
        assert_eq!(Command::decode(&block), Command::Unknown { tag: 99 });
        assert_eq!(Command::decode(&CommandBlock::default()), Command::Unknown { tag: 0 });
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = CommandQueue::new();
        for slot in 0..4 {
            assert!(queue.enqueue(&Command::remove_light(slot)));
        }

        let batch = queue.drain(3);
        let slots: Vec<_> = batch.iter().map(|b| b.words[1]).collect();
        assert_eq!(slots, vec![0.0, 1.0, 2.0]);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_overflow_rejected_without_change() {
        let mut queue = CommandQueue::with_capacity(2);
        assert!(queue.enqueue(&Command::remove_light(0)));
        assert!(queue.enqueue(&Command::remove_light(1)));
        assert!(!queue.enqueue(&Command::remove_light(2)));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.stats().overflow_count, 1);
        assert_eq!(queue.drain(10)[1].words[1], 1.0);
    }

    #[test]
    fn test_write_commands_to() {
        let mut queue = CommandQueue::new();
        queue.enqueue(&Command::remove_light(7));
        queue.enqueue(&Command::remove_light(8));

        let mut out = [CommandBlock::with_tag(-1); 4];
        assert_eq!(queue.write_commands_to(&mut out, COMMAND_QUEUE_LIMIT), 2);
        assert_eq!(out[0].words[1], 7.0);
        assert_eq!(out[1].words[1], 8.0);
        assert_eq!(out[2].tag(), -1);
        assert!(queue.is_empty());
        assert_eq!(queue.stats().drained, 2);
    }

    #[test]
    fn test_write_commands_respects_max() {
        let mut queue = CommandQueue::new();
        for slot in 0..5 {
            queue.enqueue(&Command::remove_light(slot));
        }
        let mut out = [CommandBlock::default(); 8];
        assert_eq!(queue.write_commands_to(&mut out, 2), 2);
        assert_eq!(queue.write_commands_to(&mut out[..1], 10), 1);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_drain_more_than_available() {
        let mut queue = CommandQueue::new();
        queue.enqueue(&Command::remove_light(1));
        assert_eq!(queue.drain(COMMAND_QUEUE_LIMIT).len(), 1);
        assert!(queue.drain(COMMAND_QUEUE_LIMIT).is_empty());
    }
}
