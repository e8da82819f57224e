//! Render Pass Graph
//!
//! ```ignore
//! use umbra_render::pass::{PassDesc, RenderPassGraph};
//!
//! let mut graph = RenderPassGraph::new();
//! graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene"))?;
//! graph.add_pass(&mut host, &mut loader, PassDesc::post("bloom", bloom_shader))?;
//!
//! // The bloom camera renders the scene pass's result card
//! let card = graph.result_card_for("scene");
//!
//! // After a resize
//! graph.reload_all(&mut host, &mut loader);
//! ```

pub mod graph;
pub mod mask;
pub mod render_pass;

pub use graph::{RenderPassGraph, PREV_COLOR_INPUT};
pub use mask::CameraMask;
pub use render_pass::{PassDesc, PassKind, PassState, RenderPass, POST_SORT_OFFSET};
