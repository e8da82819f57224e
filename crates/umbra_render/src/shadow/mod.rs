//! Shadow Mapping
//!
//! All shadow maps live in a single atlas texture. Each shadow source (one
//! cube face of a point light, or one spot light) owns a fixed tile.
//!
//! - **Atlas**: atlas dimensions and slot-to-tile mapping
//! - **Scheduler**: per-frame re-render budget
//! - **Config**: serde settings
//!
//! # Usage
//!
//! ```ignore
//! use umbra_render::shadow::*;
//!
//! let mut config = ShadowConfig::default();
//! config.validate();
//!
//! let atlas = ShadowAtlas::new(96, config.tile_size);
//! let mut scheduler = ShadowScheduler::new(config.max_updates);
//!
//! // Light manager requests renders, the driver hands them to the host
//! scheduler.add_update(render);
//! for render in scheduler.update() {
//!     host.render_shadow_tile(atlas_target, &render);
//! }
//! ```

pub mod atlas;
pub mod config;
pub mod scheduler;

pub use atlas::{ShadowAtlas, BASE_ATLAS_SIZE};
pub use config::ShadowConfig;
pub use scheduler::{SchedulerStats, ShadowManager, ShadowRender, ShadowScheduler};
