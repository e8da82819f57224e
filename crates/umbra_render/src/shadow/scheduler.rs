//! Shadow Update Scheduling
//!
//! Shadow tiles are only re-rendered on request, and only up to a per-frame
//! budget. Requests past the budget are refused; the light manager keeps the
//! source stale and asks again next frame.

use crate::record::{ShadowSourceRecord, MAX_SHADOW_SOURCES};

/// One shadow tile to re-render this frame
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowRender {
    /// Shadow-source slot
    pub slot: u32,
    /// Caster view-projection (column-major)
    pub mvp: [[f32; 4]; 4],
    /// Normalized atlas rectangle
    pub uv: [f32; 4],
    /// Texel viewport in the atlas: x, y, width, height
    pub viewport: [u32; 4],
}

impl ShadowRender {
    /// Table record for this source
    pub fn record(&self) -> ShadowSourceRecord {
        ShadowSourceRecord::new(self.slot, self.mvp, self.uv)
    }
}

/// Shadow manager contract
pub trait ShadowManager {
    /// Set the per-frame re-render budget
    fn set_max_updates(&mut self, max_updates: usize);

    /// Current budget
    fn max_updates(&self) -> usize;

    /// Requests still accepted this frame
    fn updates_remaining(&self) -> usize;

    /// Request a re-render; `false` once the budget is used up
    fn add_update(&mut self, render: ShadowRender) -> bool;

    /// Take this frame's renders and reset the budget
    fn update(&mut self) -> Vec<ShadowRender>;
}

/// Scheduler statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Renders handed out since creation
    pub scheduled: u64,
    /// Requests refused because the budget was exhausted
    pub refused: u64,
}

/// Budgeted FIFO of shadow renders
#[derive(Debug)]
pub struct ShadowScheduler {
    max_updates: usize,
    queued: Vec<ShadowRender>,
    stats: SchedulerStats,
}

impl Default for ShadowScheduler {
    fn default() -> Self {
        Self::new(MAX_SHADOW_SOURCES)
    }
}

impl ShadowScheduler {
    pub fn new(max_updates: usize) -> Self {
        Self {
            max_updates,
            queued: Vec::with_capacity(max_updates),
            stats: SchedulerStats::default(),
        }
    }

    /// Renders queued for the next `update`
    pub fn pending(&self) -> &[ShadowRender] {
        &self.queued
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

impl ShadowManager for ShadowScheduler {
    fn set_max_updates(&mut self, max_updates: usize) {
        if max_updates == 0 {
            log::warn!("Shadow update budget is 0, shadows will never refresh");
        }
        self.max_updates = max_updates;
        // Requests accepted under a larger budget are dropped
        self.queued.truncate(max_updates);
    }

    fn max_updates(&self) -> usize {
        self.max_updates
    }

    fn updates_remaining(&self) -> usize {
        self.max_updates.saturating_sub(self.queued.len())
    }

    fn add_update(&mut self, render: ShadowRender) -> bool {
        if self.updates_remaining() == 0 {
            self.stats.refused += 1;
            return false;
        }
        self.queued.push(render);
        true
    }

    fn update(&mut self) -> Vec<ShadowRender> {
        let renders = std::mem::take(&mut self.queued);
        if !renders.is_empty() {
            log::trace!("Scheduling {} shadow renders", renders.len());
        }
        self.stats.scheduled += renders.len() as u64;
        renders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(slot: u32) -> ShadowRender {
        ShadowRender {
            slot,
            mvp: [[0.0; 4]; 4],
            uv: [0.0, 0.0, 0.1, 0.1],
            viewport: [0, 0, 512, 512],
        }
    }

    #[test]
    fn test_budget_enforced() {
        let mut scheduler = ShadowScheduler::new(3);
        assert!(scheduler.add_update(render(0)));
        assert!(scheduler.add_update(render(1)));
        assert!(scheduler.add_update(render(2)));
        assert!(!scheduler.add_update(render(3)));
        assert_eq!(scheduler.updates_remaining(), 0);
        assert_eq!(scheduler.stats().refused, 1);

        let renders = scheduler.update();
        assert_eq!(renders.iter().map(|r| r.slot).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert_eq!(scheduler.updates_remaining(), 3);
    }

    #[test]
    fn test_shrinking_budget() {
        let mut scheduler = ShadowScheduler::new(4);
        for slot in 0..4 {
            scheduler.add_update(render(slot));
        }
        scheduler.set_max_updates(2);
        assert_eq!(scheduler.update().len(), 2);
        assert_eq!(scheduler.max_updates(), 2);
    }

    #[test]
    fn test_zero_budget() {
        let mut scheduler = ShadowScheduler::new(0);
        assert!(!scheduler.add_update(render(0)));
        assert!(scheduler.update().is_empty());
    }

    #[test]
    fn test_record_from_render() {
        let record = render(7).record();
        assert_eq!(record.slot, 7.0);
        assert_eq!(record.uv, [0.0, 0.0, 0.1, 0.1]);
    }
}
