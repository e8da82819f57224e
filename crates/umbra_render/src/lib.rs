//! # umbra_render - Deferred Lighting Pipeline
//!
//! Backend-agnostic lighting and pass composition:
//! - Fixed-capacity light and shadow-source table kept in sync through a
//!   bounded command queue
//! - Single shadow atlas with a per-frame re-render budget
//! - Render pass graph chaining scene, depth and post passes
//! - Resize handling that regenerates shader configuration and reloads every
//!   pass
//!
//! ## Architecture
//!
//! ```text
//! LightManager ──► CommandQueue ──► LightTable ──► light_data buffer
//!      │                                               │
//!      └──► ShadowManager ──► shadow atlas tiles       ▼
//!                                         RenderPassGraph (scene → post → post)
//! ```
//!
//! GPU objects are owned by the host and reached through [`GraphicsHost`].
//!
//! ## Example
//!
//! ```ignore
//! use umbra_render::prelude::*;
//!
//! let mut pipeline = RenderPipeline::new(host, PipelineConfig::default())?;
//! pipeline.add_render_pass(PassDesc::scene("scene"))?;
//! pipeline.add_render_pass(PassDesc::post(
//!     "lighting",
//!     ShaderSource::new("lighting.vert.glsl", "lighting.frag.glsl"),
//! ))?;
//!
//! let lamp = pipeline.add_light(Light::point([0.0, 2.0, 0.0], [1.0; 3], 8.0).with_shadows(true));
//!
//! loop {
//!     pipeline.update();
//! }
//! ```

pub mod command;
pub mod config;
pub mod error;
pub mod headless;
pub mod host;
pub mod instance;
pub mod light;
pub mod light_table;
pub mod pass;
pub mod pipeline;
pub mod record;
pub mod shadow;

pub use command::{Command, CommandBlock, CommandQueue, QueueStats, COMMAND_QUEUE_LIMIT, COMMAND_SIZE};
pub use config::{ConfigFragment, PipelineConfig, CONFIG_FRAGMENT_PATH};
pub use error::{HostError, PipelineError};
pub use headless::HeadlessHost;
pub use host::{
    AttachmentPoint, BufferId, CameraDesc, CameraId, ClearValue, FilterMode, GraphicsHost, Lens,
    NodeId, ProgramId, ShaderInputValue, TargetDesc, TargetId, TextureDesc, TextureFormat,
    TextureId,
};
pub use instance::{InstanceBuffer, MAX_INSTANCES};
pub use light::{Light, LightHandle, LightManager, SlotLightManager};
pub use light_table::{ApplyOutcome, LightTable, LightTableState, TableStats};
pub use pass::{CameraMask, PassDesc, PassKind, PassState, RenderPass, RenderPassGraph};
pub use pipeline::{FrameStats, RenderPipeline};
pub use record::{
    LightKind, LightRecord, ShadowSourceRecord, LIGHT_DATA_SIZE, MAX_LIGHTS, MAX_SHADOW_SOURCES,
};
pub use shadow::{ShadowAtlas, ShadowConfig, ShadowManager, ShadowRender, ShadowScheduler};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::PipelineConfig;
    pub use crate::error::PipelineError;
    pub use crate::host::{GraphicsHost, Lens, NodeId, TextureId};
    pub use crate::light::{Light, LightHandle};
    pub use crate::pass::{CameraMask, PassDesc, PassKind};
    pub use crate::pipeline::{FrameStats, RenderPipeline};
    pub use crate::record::LightKind;
    pub use umbra_shader::ShaderSource;
}
