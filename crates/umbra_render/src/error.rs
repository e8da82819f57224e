//! Render pipeline errors

use thiserror::Error;
use umbra_shader::ShaderError;

/// Host refused a request
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Host refused {operation}: {reason}")]
    Refused { operation: String, reason: String },

    #[error("Unknown {kind} handle {id}")]
    UnknownHandle { kind: &'static str, id: u32 },
}

impl HostError {
    pub fn refused(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Refused {
            operation: operation.into(),
            reason: reason.into(),
        }
    }
}

/// Pipeline setup errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Post pass '{0}' has no preceding pass to read from")]
    NoSourcePass(String),

    #[error("Host error: {0}")]
    Host(#[from] HostError),

    #[error("Shader error: {0}")]
    Shader(#[from] ShaderError),

    #[error("Invalid pipeline configuration: {0}")]
    Config(#[from] serde_json::Error),
}
