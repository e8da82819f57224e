//! Render Passes
//!
//! A pass owns one off-screen target, the camera rendering into it, its output
//! textures and the result card presenting its output to later passes.

use serde::{Deserialize, Serialize};
use umbra_shader::{ShaderLoader, ShaderSource};

use crate::error::PipelineError;
use crate::host::{CameraId, GraphicsHost, NodeId, ProgramId, TargetId, TextureId};
use crate::pass::CameraMask;

/// Sort offset applied to post pass targets
pub const POST_SORT_OFFSET: i32 = 10;

/// What a pass renders
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassKind {
    /// 3-D scene into color, depth, emissive and selector outputs
    Scene,
    /// 3-D scene into a depth-only output
    Depth,
    /// Full-screen pass over the previous pass's result
    Post,
}

impl PassKind {
    pub fn is_post(&self) -> bool {
        matches!(self, Self::Post)
    }

    /// Output texture suffixes, in attachment order
    pub fn outputs(&self) -> &'static [&'static str] {
        match self {
            Self::Scene => &["color", "depth", "emissive", "selector"],
            Self::Depth => &["depth"],
            Self::Post => &["color"],
        }
    }
}

/// Pass lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PassState {
    /// Registered, host objects not yet wired
    Created,
    /// Target, camera and inputs wired
    Configured,
    /// Rendered at least one frame
    Active,
    /// Shader reloaded after a reconfiguration
    Reloaded,
    /// Removed from the graph
    Retired,
}

/// Pass creation parameters
#[derive(Clone, Debug, PartialEq)]
pub struct PassDesc {
    pub name: String,
    pub kind: PassKind,
    /// Shader pair for post passes
    pub shader: Option<ShaderSource>,
    pub mask: CameraMask,
    /// Fixed size; `None` follows the window
    pub size: Option<[u32; 2]>,
}

impl PassDesc {
    pub fn scene(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: PassKind::Scene,
            shader: None,
            mask: CameraMask::ALL,
            size: None,
        }
    }

    pub fn depth(name: impl Into<String>) -> Self {
        Self {
            kind: PassKind::Depth,
            ..Self::scene(name)
        }
    }

    pub fn post(name: impl Into<String>, shader: ShaderSource) -> Self {
        Self {
            kind: PassKind::Post,
            shader: Some(shader),
            ..Self::scene(name)
        }
    }

    /// Set the camera mask
    pub fn with_mask(mut self, mask: CameraMask) -> Self {
        self.mask = mask;
        self
    }

    /// Set a fixed target size
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some([width, height]);
        self
    }
}

/// One pass in the graph
#[derive(Clone, Debug)]
pub struct RenderPass {
    pub(crate) name: String,
    pub(crate) kind: PassKind,
    pub(crate) index: u32,
    pub(crate) size: [u32; 2],
    pub(crate) target: TargetId,
    pub(crate) camera: CameraId,
    pub(crate) textures: Vec<(String, TextureId)>,
    pub(crate) source_card: Option<NodeId>,
    pub(crate) result_card: NodeId,
    pub(crate) shader: Option<ShaderSource>,
    pub(crate) program: Option<ProgramId>,
    pub(crate) state: PassState,
    pub(crate) reloads: u32,
}

impl RenderPass {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PassKind {
        self.kind
    }

    /// Sequence index
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Target render order
    pub fn sort(&self) -> i32 {
        match self.kind {
            PassKind::Post => self.index as i32 + POST_SORT_OFFSET,
            _ => self.index as i32,
        }
    }

    /// Size the target was created with
    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn target(&self) -> TargetId {
        self.target
    }

    pub fn camera(&self) -> CameraId {
        self.camera
    }

    /// Output texture by attachment order
    pub fn texture(&self, index: usize) -> Option<TextureId> {
        self.textures.get(index).map(|(_, id)| *id)
    }

    /// Output textures with their shader input names
    pub fn textures(&self) -> &[(String, TextureId)] {
        &self.textures
    }

    /// Card carrying this pass's shader and inputs (post passes only)
    pub fn source_card(&self) -> Option<NodeId> {
        self.source_card
    }

    /// Card presenting this pass's output
    pub fn result_card(&self) -> NodeId {
        self.result_card
    }

    pub fn shader(&self) -> Option<&ShaderSource> {
        self.shader.as_ref()
    }

    /// Program currently attached to the source card
    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    /// Number of `reload_shader` calls so far
    pub fn reloads(&self) -> u32 {
        self.reloads
    }

    /// Load the shader pair and attach it to the source card
    pub(crate) fn install_shader(
        &mut self,
        host: &mut dyn GraphicsHost,
        loader: &mut ShaderLoader,
    ) -> Result<Option<ProgramId>, PipelineError> {
        let (Some(source), Some(card)) = (self.shader.as_ref(), self.source_card) else {
            return Ok(None);
        };
        let program = loader.load(source)?;
        let id = host.install_shader(card, &program)?;
        self.program = Some(id);
        Ok(Some(id))
    }

    /// Re-resolve the shader pair and reattach it
    ///
    /// No shader or no source card is a no-op. On failure the previously
    /// attached program stays in place. Returns whether a new program was
    /// attached.
    pub fn reload_shader(&mut self, host: &mut dyn GraphicsHost, loader: &mut ShaderLoader) -> bool {
        self.reloads += 1;
        match self.install_shader(host, loader) {
            Ok(installed) => {
                self.state = PassState::Reloaded;
                if let Some(program) = installed {
                    log::debug!("Pass '{}' reloaded shader as {:?}", self.name, program);
                }
                installed.is_some()
            }
            Err(err) => {
                log::warn!(
                    "Pass '{}' failed to reload shader, keeping previous program: {}",
                    self.name,
                    err
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outputs() {
        assert_eq!(PassKind::Scene.outputs().len(), 4);
        assert_eq!(PassKind::Depth.outputs(), &["depth"]);
        assert!(PassKind::Post.is_post());
    }

    #[test]
    fn test_desc_builders() {
        let desc = PassDesc::depth("shadow_depth")
            .with_mask(CameraMask::SHADOW)
            .with_size(1024, 1024);
        assert_eq!(desc.kind, PassKind::Depth);
        assert_eq!(desc.mask, CameraMask::SHADOW);
        assert_eq!(desc.size, Some([1024, 1024]));
        assert!(desc.shader.is_none());

        let post = PassDesc::post("tonemap", ShaderSource::new("a.vert", "a.frag"));
        assert_eq!(post.kind, PassKind::Post);
        assert!(post.shader.is_some());
        assert_eq!(post.size, None);
    }
}
