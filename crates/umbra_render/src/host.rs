//! Host Capabilities
//!
//! The pipeline never creates GPU objects itself. Everything it needs from
//! the graphics host (targets, textures, cameras, scene nodes, buffers,
//! compiled shaders) is requested through [`GraphicsHost`] and referred to by
//! opaque `Copy` handles afterwards.

use umbra_shader::ShaderProgram;

use crate::error::HostError;
use crate::light::Light;
use crate::pass::CameraMask;
use crate::shadow::ShadowRender;

macro_rules! handle {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
            pub struct $name(pub u32);

            impl $name {
                /// Get the raw handle value
                pub fn raw(&self) -> u32 {
                    self.0
                }
            }
        )*
    };
}

handle!(
    /// Off-screen render target
    TargetId,
    /// Texture
    TextureId,
    /// Camera
    CameraId,
    /// Scene node (scene roots and result cards)
    NodeId,
    /// GPU-visible byte buffer
    BufferId,
    /// Compiled shader program
    ProgramId,
);

/// Texture format
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    R32Float,
    Depth32Float,
}

impl TextureFormat {
    /// Check if this is a depth format
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Check if this is sRGB
    pub fn is_srgb(&self) -> bool {
        matches!(self, Self::Rgba8UnormSrgb)
    }

    /// Bytes per pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgba8Unorm | Self::Rgba8UnormSrgb | Self::R32Float | Self::Depth32Float => 4,
            Self::Rgba16Float => 8,
            Self::Rgba32Float => 16,
        }
    }
}

/// Sampler filter mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
    /// Hardware depth comparison (PCF)
    Shadow,
}

/// Sampler address mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AddressMode {
    #[default]
    ClampToEdge,
    Repeat,
}

/// Texture descriptor
#[derive(Clone, Debug, PartialEq)]
pub struct TextureDesc {
    /// Name, also used as the shader input name
    pub name: String,
    pub format: TextureFormat,
    pub filter: FilterMode,
    pub address: AddressMode,
}

impl TextureDesc {
    pub fn new(name: impl Into<String>, format: TextureFormat) -> Self {
        Self {
            name: name.into(),
            format,
            filter: FilterMode::default(),
            address: AddressMode::default(),
        }
    }

    /// Set the filter mode
    pub fn with_filter(mut self, filter: FilterMode) -> Self {
        self.filter = filter;
        self
    }
}

/// Where a texture is attached on a target
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AttachmentPoint {
    Color,
    Depth,
    /// Auxiliary color output
    Aux(u8),
}

/// Clear value for a target
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClearValue {
    /// Color clear value (RGBA)
    Color([f32; 4]),
    /// Depth clear value
    Depth(f32),
}

impl Default for ClearValue {
    fn default() -> Self {
        Self::Color([0.0, 0.0, 0.0, 1.0])
    }
}

/// Render target descriptor
#[derive(Clone, Debug, PartialEq)]
pub struct TargetDesc {
    pub name: String,
    /// Size in pixels
    pub size: [u32; 2],
    /// Host resizes the target along with the window
    pub follows_window: bool,
    /// Render order; lower renders first
    pub sort: i32,
    pub clear: ClearValue,
}

/// Camera projection
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Lens {
    Perspective {
        /// Vertical field of view in radians
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        /// Film size
        film: [f32; 2],
        near: f32,
        far: f32,
    },
}

impl Default for Lens {
    fn default() -> Self {
        Self::Perspective {
            fov_y: 60f32.to_radians(),
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Lens {
    /// Full-screen orthographic lens for post passes
    ///
    /// Film spans -1..1 on both axes and depth spans -1000..1000.
    pub fn fullscreen_2d() -> Self {
        Self::Orthographic {
            film: [2.0, 2.0],
            near: -1000.0,
            far: 1000.0,
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Self::Perspective { near, .. } | Self::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Self::Perspective { far, .. } | Self::Orthographic { far, .. } => *far,
        }
    }
}

/// Camera descriptor
#[derive(Clone, Debug, PartialEq)]
pub struct CameraDesc {
    pub name: String,
    /// Target the camera renders into
    pub target: TargetId,
    pub lens: Lens,
}

/// Value bound to a named shader input
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ShaderInputValue {
    Texture(TextureId),
    Buffer(BufferId),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
}

/// Everything the pipeline asks of the graphics host
pub trait GraphicsHost {
    /// Current window size in pixels
    fn window_size(&self) -> [u32; 2];

    /// Create an off-screen target
    fn make_target(&mut self, desc: &TargetDesc) -> Result<TargetId, HostError>;

    fn make_texture(&mut self, desc: &TextureDesc) -> TextureId;

    /// Bind a texture as one of a target's outputs
    fn attach_texture(
        &mut self,
        target: TargetId,
        texture: TextureId,
        point: AttachmentPoint,
    ) -> Result<(), HostError>;

    /// Full-screen quad presenting a target's output
    fn result_card(&mut self, target: TargetId, name: &str) -> NodeId;

    fn make_camera(&mut self, desc: &CameraDesc) -> CameraId;

    /// Set what a camera renders
    fn set_camera_scene(&mut self, camera: CameraId, scene: NodeId);

    /// Restrict a camera to nodes matching `mask`
    fn set_camera_mask(&mut self, camera: CameraId, mask: CameraMask);

    /// Lens of the main scene camera
    fn main_lens(&self) -> Lens;

    /// World position of the main scene camera
    fn camera_position(&self) -> [f32; 3];

    /// Root of the 3-D scene
    fn scene_root(&self) -> NodeId;

    fn set_shader_input(&mut self, node: NodeId, name: &str, value: ShaderInputValue);

    /// Compile `program` and attach it to `node`
    ///
    /// On error the node keeps whatever program it had.
    fn install_shader(&mut self, node: NodeId, program: &ShaderProgram) -> Result<ProgramId, HostError>;

    /// Create a buffer of `size` bytes
    fn make_buffer(&mut self, name: &str, size: usize) -> BufferId;

    fn write_buffer(&mut self, buffer: BufferId, bytes: &[u8]);

    /// Render the shadow casters for one atlas tile
    fn render_shadow_tile(&mut self, atlas: TargetId, render: &ShadowRender);

    /// Whether hardware shadow filtering is available
    fn supports_shadow_filter(&self) -> bool {
        false
    }

    /// Lights present in the host scene
    fn scene_lights(&self) -> Vec<Light> {
        Vec::new()
    }
}
