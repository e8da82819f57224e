//! Headless Host
//!
//! A [`GraphicsHost`] that renders nothing and records every request. Used
//! by tests and by tools that want to inspect the pipeline's wiring without a
//! window.

use std::collections::BTreeMap;

use umbra_shader::ShaderProgram;

use crate::error::HostError;
use crate::host::{
    AttachmentPoint, BufferId, CameraDesc, CameraId, GraphicsHost, Lens, NodeId, ProgramId,
    ShaderInputValue, TargetDesc, TargetId, TextureDesc, TextureId,
};
use crate::light::Light;
use crate::pass::CameraMask;
use crate::shadow::ShadowRender;

/// Recorded camera
#[derive(Clone, Debug)]
pub struct HeadlessCamera {
    pub desc: CameraDesc,
    pub scene: Option<NodeId>,
    pub mask: CameraMask,
}

/// Recorded scene node
#[derive(Clone, Debug, Default)]
pub struct HeadlessNode {
    pub name: String,
    /// Target presented by this card, if any
    pub target: Option<TargetId>,
    pub inputs: BTreeMap<String, ShaderInputValue>,
    pub program: Option<ProgramId>,
    /// Successful `install_shader` calls
    pub installs: u32,
}

/// Recorded buffer
#[derive(Clone, Debug, Default)]
pub struct HeadlessBuffer {
    pub name: String,
    pub data: Vec<u8>,
    pub writes: u32,
}

/// Recording host
#[derive(Debug)]
pub struct HeadlessHost {
    window_size: [u32; 2],
    lens: Lens,
    camera_position: [f32; 3],
    shadow_filter: bool,
    fail_installs: bool,
    lights: Vec<Light>,
    targets: Vec<TargetDesc>,
    textures: Vec<TextureDesc>,
    attachments: Vec<(TargetId, TextureId, AttachmentPoint)>,
    cameras: Vec<HeadlessCamera>,
    nodes: Vec<HeadlessNode>,
    buffers: Vec<HeadlessBuffer>,
    programs: Vec<ShaderProgram>,
    shadow_renders: Vec<(TargetId, ShadowRender)>,
}

impl HeadlessHost {
    /// Host with a `width` x `height` window; node 0 is the scene root
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            window_size: [width, height],
            lens: Lens::default(),
            camera_position: [0.0; 3],
            shadow_filter: false,
            fail_installs: false,
            lights: Vec::new(),
            targets: Vec::new(),
            textures: Vec::new(),
            attachments: Vec::new(),
            cameras: Vec::new(),
            nodes: vec![HeadlessNode {
                name: "render".into(),
                ..Default::default()
            }],
            buffers: Vec::new(),
            programs: Vec::new(),
            shadow_renders: Vec::new(),
        }
    }

    /// Change the window size
    pub fn resize(&mut self, width: u32, height: u32) {
        self.window_size = [width, height];
    }

    pub fn set_lens(&mut self, lens: Lens) {
        self.lens = lens;
    }

    pub fn set_camera_position(&mut self, position: [f32; 3]) {
        self.camera_position = position;
    }

    /// Report hardware shadow filtering support
    pub fn set_shadow_filter(&mut self, supported: bool) {
        self.shadow_filter = supported;
    }

    /// Make every subsequent `install_shader` fail
    pub fn set_fail_installs(&mut self, fail: bool) {
        self.fail_installs = fail;
    }

    /// Place a light in the host scene
    pub fn add_scene_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn target(&self, id: TargetId) -> Option<&TargetDesc> {
        self.targets.get(id.0 as usize)
    }

    pub fn targets(&self) -> &[TargetDesc] {
        &self.targets
    }

    pub fn texture(&self, id: TextureId) -> Option<&TextureDesc> {
        self.textures.get(id.0 as usize)
    }

    /// Texture by name
    pub fn find_texture(&self, name: &str) -> Option<TextureId> {
        self.textures
            .iter()
            .position(|t| t.name == name)
            .map(|i| TextureId(i as u32))
    }

    /// Textures attached to `target`
    pub fn attachments(&self, target: TargetId) -> Vec<(TextureId, AttachmentPoint)> {
        self.attachments
            .iter()
            .filter(|(t, _, _)| *t == target)
            .map(|(_, texture, point)| (*texture, *point))
            .collect()
    }

    pub fn camera(&self, id: CameraId) -> Option<&HeadlessCamera> {
        self.cameras.get(id.0 as usize)
    }

    pub fn cameras(&self) -> &[HeadlessCamera] {
        &self.cameras
    }

    pub fn node(&self, id: NodeId) -> Option<&HeadlessNode> {
        self.nodes.get(id.0 as usize)
    }

    pub fn buffer(&self, id: BufferId) -> Option<&HeadlessBuffer> {
        self.buffers.get(id.0 as usize)
    }

    /// Buffer by name
    pub fn find_buffer(&self, name: &str) -> Option<&HeadlessBuffer> {
        self.buffers.iter().find(|b| b.name == name)
    }

    pub fn program(&self, id: ProgramId) -> Option<&ShaderProgram> {
        self.programs.get(id.0 as usize)
    }

    /// Every shadow tile rendered so far
    pub fn shadow_renders(&self) -> &[(TargetId, ShadowRender)] {
        &self.shadow_renders
    }

    fn node_mut(&mut self, id: NodeId) -> Option<&mut HeadlessNode> {
        self.nodes.get_mut(id.0 as usize)
    }
}

impl GraphicsHost for HeadlessHost {
    fn window_size(&self) -> [u32; 2] {
        self.window_size
    }

    fn make_target(&mut self, desc: &TargetDesc) -> Result<TargetId, HostError> {
        if desc.size[0] == 0 || desc.size[1] == 0 {
            return Err(HostError::refused(
                "make_target",
                format!("'{}' has zero size", desc.name),
            ));
        }
        self.targets.push(desc.clone());
        Ok(TargetId(self.targets.len() as u32 - 1))
    }

    fn make_texture(&mut self, desc: &TextureDesc) -> TextureId {
        self.textures.push(desc.clone());
        TextureId(self.textures.len() as u32 - 1)
    }

    fn attach_texture(
        &mut self,
        target: TargetId,
        texture: TextureId,
        point: AttachmentPoint,
    ) -> Result<(), HostError> {
        if self.target(target).is_none() {
            return Err(HostError::UnknownHandle {
                kind: "target",
                id: target.0,
            });
        }
        if self.texture(texture).is_none() {
            return Err(HostError::UnknownHandle {
                kind: "texture",
                id: texture.0,
            });
        }
        self.attachments.push((target, texture, point));
        Ok(())
    }

    fn result_card(&mut self, target: TargetId, name: &str) -> NodeId {
        self.nodes.push(HeadlessNode {
            name: format!("{}_card", name),
            target: Some(target),
            ..Default::default()
        });
        NodeId(self.nodes.len() as u32 - 1)
    }

    fn make_camera(&mut self, desc: &CameraDesc) -> CameraId {
        self.cameras.push(HeadlessCamera {
            desc: desc.clone(),
            scene: None,
            mask: CameraMask::ALL,
        });
        CameraId(self.cameras.len() as u32 - 1)
    }

    fn set_camera_scene(&mut self, camera: CameraId, scene: NodeId) {
        if let Some(camera) = self.cameras.get_mut(camera.0 as usize) {
            camera.scene = Some(scene);
        }
    }

    fn set_camera_mask(&mut self, camera: CameraId, mask: CameraMask) {
        if let Some(camera) = self.cameras.get_mut(camera.0 as usize) {
            camera.mask = mask;
        }
    }

    fn main_lens(&self) -> Lens {
        self.lens
    }

    fn camera_position(&self) -> [f32; 3] {
        self.camera_position
    }

    fn scene_root(&self) -> NodeId {
        NodeId(0)
    }

    fn set_shader_input(&mut self, node: NodeId, name: &str, value: ShaderInputValue) {
        if let Some(node) = self.node_mut(node) {
            node.inputs.insert(name.to_string(), value);
        }
    }

    fn install_shader(&mut self, node: NodeId, program: &ShaderProgram) -> Result<ProgramId, HostError> {
        if self.fail_installs {
            return Err(HostError::refused("install_shader", "compilation failed"));
        }
        if self.node(node).is_none() {
            return Err(HostError::UnknownHandle {
                kind: "node",
                id: node.0,
            });
        }
        self.programs.push(program.clone());
        let id = ProgramId(self.programs.len() as u32 - 1);
        if let Some(node) = self.node_mut(node) {
            node.program = Some(id);
            node.installs += 1;
        }
        Ok(id)
    }

    fn make_buffer(&mut self, name: &str, size: usize) -> BufferId {
        self.buffers.push(HeadlessBuffer {
            name: name.to_string(),
            data: vec![0; size],
            writes: 0,
        });
        BufferId(self.buffers.len() as u32 - 1)
    }

    fn write_buffer(&mut self, buffer: BufferId, bytes: &[u8]) {
        let Some(buffer) = self.buffers.get_mut(buffer.0 as usize) else {
            log::warn!("Write to unknown buffer {:?}", buffer);
            return;
        };
        let len = bytes.len().min(buffer.data.len());
        buffer.data[..len].copy_from_slice(&bytes[..len]);
        buffer.writes += 1;
    }

    fn render_shadow_tile(&mut self, atlas: TargetId, render: &ShadowRender) {
        self.shadow_renders.push((atlas, *render));
    }

    fn supports_shadow_filter(&self) -> bool {
        self.shadow_filter
    }

    fn scene_lights(&self) -> Vec<Light> {
        self.lights.clone()
    }
}
