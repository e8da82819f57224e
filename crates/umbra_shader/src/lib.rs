//! # Umbra Shader
//!
//! Shader source handling for the Umbra pipeline:
//! - Vertex/fragment source pairs resolved from disk or memory
//! - `#include` expansion
//! - `#define` headers for generated configuration fragments
//! - An in-memory virtual filesystem shared with the render pipeline
//!
//! ## Architecture
//!
//! ```text
//! ShaderSource (paths) ──► ShaderLoader ──► VirtualFs / disk ──► ShaderProgram (text + version)
//!                                               ▲
//!                    ShaderVariant ──► header ──┘
//! ```
//!
//! Compilation is the host's job; this crate only produces program text.

pub mod loader;
pub mod variants;
pub mod vfs;

pub use loader::{ShaderLoader, ShaderLoaderConfig, ShaderProgram, ShaderSource, ShaderVersion};
pub use variants::{ShaderDefine, ShaderVariant};
pub use vfs::VirtualFs;

use thiserror::Error;

/// Errors from shader source loading
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("Failed to read shader file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Shader not found: {0}")]
    NotFound(String),

    #[error("Include depth exceeded while resolving: {0}")]
    IncludeDepth(String),

    #[error("Shader source is empty: {0}")]
    EmptySource(String),
}
