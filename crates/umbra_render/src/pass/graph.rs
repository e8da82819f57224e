//! Render Pass Graph
//!
//! Scene and depth passes render the 3-D scene; post passes form a chain
//! where each one renders the result card of the pass before it. Every post
//! pass sees all scene-pass outputs by texture name, plus the previous pass's
//! first output as `prev_color`.
//!
//! ```text
//! scene ──► result card ──► post 0 ──► result card ──► post 1 ──► ...
//!   │                         ▲                          ▲
//!   └── scene_color, scene_depth, ... ───────────────────┘
//! ```

use umbra_shader::{ShaderLoader, ShaderProgram};

use crate::error::PipelineError;
use crate::host::{
    AttachmentPoint, CameraDesc, CameraId, ClearValue, GraphicsHost, Lens, NodeId,
    ShaderInputValue, TargetDesc, TargetId, TextureDesc, TextureFormat, TextureId,
};
use crate::pass::render_pass::{PassDesc, PassKind, PassState, RenderPass, POST_SORT_OFFSET};

/// Shader input name for the previous pass's first output
pub const PREV_COLOR_INPUT: &str = "prev_color";

/// Ordered scene passes followed by ordered post passes
#[derive(Debug, Default)]
pub struct RenderPassGraph {
    scene_passes: Vec<RenderPass>,
    post_passes: Vec<RenderPass>,
    srgb: bool,
    alpha: bool,
}

impl RenderPassGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write scene color to sRGB textures
    pub fn with_srgb(mut self, srgb: bool) -> Self {
        self.srgb = srgb;
        self
    }

    /// Clear color targets to transparent black instead of opaque black
    pub fn with_alpha(mut self, alpha: bool) -> Self {
        self.alpha = alpha;
        self
    }

    /// Create a pass and wire it into the graph
    ///
    /// Names are not checked for collisions; lookups return the first match.
    pub fn add_pass(
        &mut self,
        host: &mut dyn GraphicsHost,
        loader: &mut ShaderLoader,
        desc: PassDesc,
    ) -> Result<&RenderPass, PipelineError> {
        let pass = match desc.kind {
            PassKind::Scene | PassKind::Depth => self.build_scene_pass(host, desc)?,
            PassKind::Post => self.build_post_pass(host, loader, desc)?,
        };

        log::debug!(
            "Added {:?} pass '{}' (sort {}, {}x{})",
            pass.kind,
            pass.name,
            pass.sort(),
            pass.size[0],
            pass.size[1]
        );

        let passes = if pass.kind.is_post() {
            &mut self.post_passes
        } else {
            &mut self.scene_passes
        };
        passes.push(pass);
        let added = passes.len() - 1;
        Ok(&passes[added])
    }

    fn target_desc(&self, host: &dyn GraphicsHost, desc: &PassDesc, sort: i32) -> TargetDesc {
        TargetDesc {
            name: desc.name.clone(),
            size: desc.size.unwrap_or_else(|| host.window_size()),
            follows_window: desc.size.is_none(),
            sort,
            clear: match desc.kind {
                PassKind::Depth => ClearValue::Depth(1.0),
                _ if self.alpha => ClearValue::Color([0.0; 4]),
                _ => ClearValue::default(),
            },
        }
    }

    fn output_format(&self, kind: PassKind, output: &str) -> TextureFormat {
        match (kind, output) {
            (_, "depth") => TextureFormat::Depth32Float,
            (PassKind::Scene, "selector") => TextureFormat::Rgba8Unorm,
            (PassKind::Scene, "color") if self.srgb => TextureFormat::Rgba8UnormSrgb,
            _ => TextureFormat::Rgba16Float,
        }
    }

    /// Create and attach the outputs for `kind`
    fn make_outputs(
        &self,
        host: &mut dyn GraphicsHost,
        pass_name: &str,
        kind: PassKind,
        target: TargetId,
    ) -> Result<Vec<(String, TextureId)>, PipelineError> {
        let mut textures = Vec::with_capacity(kind.outputs().len());
        let mut aux = 0u8;
        for output in kind.outputs() {
            let name = format!("{}_{}", pass_name, output);
            let texture = host.make_texture(&TextureDesc::new(&name, self.output_format(kind, output)));
            let point = match *output {
                "color" => AttachmentPoint::Color,
                "depth" => AttachmentPoint::Depth,
                _ => {
                    aux += 1;
                    AttachmentPoint::Aux(aux - 1)
                }
            };
            host.attach_texture(target, texture, point)?;
            textures.push((name, texture));
        }
        Ok(textures)
    }

    fn build_scene_pass(
        &self,
        host: &mut dyn GraphicsHost,
        desc: PassDesc,
    ) -> Result<RenderPass, PipelineError> {
        if desc.shader.is_some() {
            log::warn!(
                "Pass '{}' is a {:?} pass, ignoring its shader",
                desc.name,
                desc.kind
            );
        }

        let index = self.scene_passes.len() as u32;
        let target_desc = self.target_desc(host, &desc, index as i32);
        let target = host.make_target(&target_desc)?;
        let textures = self.make_outputs(host, &desc.name, desc.kind, target)?;

        let lens = host.main_lens();
        let camera = host.make_camera(&CameraDesc {
            name: format!("{}_camera", desc.name),
            target,
            lens,
        });
        let scene = host.scene_root();
        host.set_camera_scene(camera, scene);
        host.set_camera_mask(camera, desc.mask);
        let result_card = host.result_card(target, &desc.name);

        Ok(RenderPass {
            name: desc.name,
            kind: desc.kind,
            index,
            size: target_desc.size,
            target,
            camera,
            textures,
            source_card: None,
            result_card,
            shader: None,
            program: None,
            state: PassState::Configured,
            reloads: 0,
        })
    }

    fn build_post_pass(
        &self,
        host: &mut dyn GraphicsHost,
        loader: &mut ShaderLoader,
        desc: PassDesc,
    ) -> Result<RenderPass, PipelineError> {
        let Some(previous) = self.post_passes.last().or(self.scene_passes.last()) else {
            return Err(PipelineError::NoSourcePass(desc.name));
        };
        let source_card = previous.result_card;
        let prev_color = previous.texture(0);

        // Resolve the program before touching the host
        let program: Option<ShaderProgram> = desc
            .shader
            .as_ref()
            .map(|shader| loader.load(shader))
            .transpose()?;

        let index = (self.scene_passes.len() + self.post_passes.len()) as u32;
        let target_desc =
            self.target_desc(host, &desc, index as i32 + POST_SORT_OFFSET);
        let target = host.make_target(&target_desc)?;
        let textures = self.make_outputs(host, &desc.name, PassKind::Post, target)?;

        let program = match &program {
            Some(program) => Some(host.install_shader(source_card, program)?),
            None => None,
        };

        let camera = host.make_camera(&CameraDesc {
            name: format!("{}_camera", desc.name),
            target,
            lens: Lens::fullscreen_2d(),
        });
        host.set_camera_scene(camera, source_card);
        host.set_camera_mask(camera, desc.mask);

        for (name, texture) in self.scene_passes.iter().flat_map(|p| p.textures.iter()) {
            host.set_shader_input(source_card, name, ShaderInputValue::Texture(*texture));
        }
        if let Some(prev_color) = prev_color {
            host.set_shader_input(source_card, PREV_COLOR_INPUT, ShaderInputValue::Texture(prev_color));
        }
        let result_card = host.result_card(target, &desc.name);

        Ok(RenderPass {
            name: desc.name,
            kind: PassKind::Post,
            index,
            size: target_desc.size,
            target,
            camera,
            textures,
            source_card: Some(source_card),
            result_card,
            shader: desc.shader,
            program,
            state: PassState::Configured,
            reloads: 0,
        })
    }

    /// Pass by name; scene passes are searched before post passes
    pub fn find(&self, name: &str) -> Option<&RenderPass> {
        self.passes().find(|p| p.name == name)
    }

    pub fn camera_for(&self, name: &str) -> Option<CameraId> {
        self.find(name).map(|p| p.camera)
    }

    pub fn source_card_for(&self, name: &str) -> Option<NodeId> {
        self.find(name).and_then(|p| p.source_card)
    }

    pub fn result_card_for(&self, name: &str) -> Option<NodeId> {
        self.find(name).map(|p| p.result_card)
    }

    pub fn texture_for(&self, name: &str, index: usize) -> Option<TextureId> {
        self.find(name).and_then(|p| p.texture(index))
    }

    /// All passes, scene passes first
    pub fn passes(&self) -> impl Iterator<Item = &RenderPass> {
        self.scene_passes.iter().chain(self.post_passes.iter())
    }

    pub fn scene_passes(&self) -> &[RenderPass] {
        &self.scene_passes
    }

    pub fn post_passes(&self) -> &[RenderPass] {
        &self.post_passes
    }

    pub fn len(&self) -> usize {
        self.scene_passes.len() + self.post_passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mark configured passes as active after their first frame
    pub fn activate(&mut self) {
        for pass in self.scene_passes.iter_mut().chain(self.post_passes.iter_mut()) {
            if pass.state == PassState::Configured {
                pass.state = PassState::Active;
            }
        }
    }

    /// Call `reload_shader` once on every pass, scene passes first
    ///
    /// Returns how many passes attached a new program.
    pub fn reload_all(&mut self, host: &mut dyn GraphicsHost, loader: &mut ShaderLoader) -> usize {
        let mut reloaded = 0;
        for pass in self.scene_passes.iter_mut().chain(self.post_passes.iter_mut()) {
            if pass.reload_shader(host, loader) {
                reloaded += 1;
            }
        }
        reloaded
    }

    /// Remove every pass
    pub fn retire(&mut self) -> Vec<RenderPass> {
        let mut passes: Vec<_> = self
            .scene_passes
            .drain(..)
            .chain(self.post_passes.drain(..))
            .collect();
        for pass in &mut passes {
            pass.state = PassState::Retired;
        }
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessHost;
    use crate::pass::CameraMask;
    use umbra_shader::{ShaderLoaderConfig, ShaderSource, VirtualFs};

    fn loader() -> ShaderLoader {
        let vfs = VirtualFs::new();
        vfs.write("/post.vert", "void main() {}\n");
        vfs.write("/post.frag", "void main() {}\n");
        ShaderLoader::new(ShaderLoaderConfig::default(), vfs)
    }

    fn post(name: &str) -> PassDesc {
        PassDesc::post(name, ShaderSource::new("/post.vert", "/post.frag"))
    }

    #[test]
    fn test_scene_pass_outputs() {
        let mut host = HeadlessHost::new(640, 480);
        let mut loader = loader();
        let mut graph = RenderPassGraph::new();

        let pass = graph
            .add_pass(&mut host, &mut loader, PassDesc::scene("scene").with_mask(CameraMask::MAIN))
            .unwrap();
        let names: Vec<_> = pass.textures().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["scene_color", "scene_depth", "scene_emissive", "scene_selector"]
        );
        assert_eq!(pass.size(), [640, 480]);
        assert_eq!(pass.state(), PassState::Configured);

        let camera = host.camera(pass.camera()).unwrap();
        assert_eq!(camera.scene, Some(host.scene_root()));
        assert_eq!(camera.mask, CameraMask::MAIN);
    }

    #[test]
    fn test_depth_pass() {
        let mut host = HeadlessHost::new(640, 480);
        let mut graph = RenderPassGraph::new();
        let pass = graph
            .add_pass(&mut host, &mut loader(), PassDesc::depth("shadow"))
            .unwrap();

        assert_eq!(pass.textures().len(), 1);
        let texture = host.texture(pass.texture(0).unwrap()).unwrap();
        assert_eq!(texture.format, TextureFormat::Depth32Float);
        assert_eq!(texture.name, "shadow_depth");
    }

    #[test]
    fn test_post_without_source_fails() {
        let mut host = HeadlessHost::new(640, 480);
        let mut graph = RenderPassGraph::new();
        let result = graph.add_pass(&mut host, &mut loader(), post("bloom"));
        assert!(matches!(result, Err(PipelineError::NoSourcePass(name)) if name == "bloom"));
        assert!(graph.is_empty());
    }

    #[test]
    fn test_post_chain_wiring() {
        let mut host = HeadlessHost::new(800, 600);
        let mut loader = loader();
        let mut graph = RenderPassGraph::new();

        graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("lighting")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("final")).unwrap();

        let scene_card = graph.result_card_for("scene").unwrap();
        let lighting_card = graph.result_card_for("lighting").unwrap();

        let lighting_cam = host.camera(graph.camera_for("lighting").unwrap()).unwrap();
        assert_eq!(lighting_cam.scene, Some(scene_card));
        assert!(matches!(lighting_cam.desc.lens, Lens::Orthographic { .. }));

        let final_cam = host.camera(graph.camera_for("final").unwrap()).unwrap();
        assert_eq!(final_cam.scene, Some(lighting_card));
        assert_eq!(graph.source_card_for("final"), Some(lighting_card));

        // Scene outputs and prev_color bound on the source card
        let node = host.node(lighting_card).unwrap();
        assert_eq!(
            node.inputs.get("scene_depth"),
            Some(&ShaderInputValue::Texture(graph.texture_for("scene", 1).unwrap()))
        );
        assert_eq!(
            node.inputs.get(PREV_COLOR_INPUT),
            Some(&ShaderInputValue::Texture(graph.texture_for("lighting", 0).unwrap()))
        );
        assert!(node.program.is_some());
    }

    #[test]
    fn test_sort_order() {
        let mut host = HeadlessHost::new(64, 64);
        let mut loader = loader();
        let mut graph = RenderPassGraph::new();
        graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("a")).unwrap();
        graph.add_pass(&mut host, &mut loader, PassDesc::depth("depth")).unwrap();

        let target = |name: &str| host.target(graph.find(name).unwrap().target()).unwrap().sort;
        assert_eq!(target("scene"), 0);
        assert_eq!(target("a"), 11);
        // Scene and depth passes count only their own kind
        assert_eq!(target("depth"), 1);

        graph.add_pass(&mut host, &mut loader, post("b")).unwrap();
        assert_eq!(host.target(graph.find("b").unwrap().target()).unwrap().sort, 13);
    }

    #[test]
    fn test_clear_values_follow_alpha() {
        let mut loader = loader();

        let mut host = HeadlessHost::new(64, 64);
        let mut graph = RenderPassGraph::new();
        graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("a")).unwrap();
        graph.add_pass(&mut host, &mut loader, PassDesc::depth("depth")).unwrap();
        let clear = |host: &HeadlessHost, graph: &RenderPassGraph, name: &str| {
            host.target(graph.find(name).unwrap().target()).unwrap().clear
        };
        assert_eq!(clear(&host, &graph, "scene"), ClearValue::Color([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(clear(&host, &graph, "a"), ClearValue::Color([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(clear(&host, &graph, "depth"), ClearValue::Depth(1.0));

        let mut host = HeadlessHost::new(64, 64);
        let mut graph = RenderPassGraph::new().with_alpha(true);
        graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("a")).unwrap();
        graph.add_pass(&mut host, &mut loader, PassDesc::depth("depth")).unwrap();
        assert_eq!(clear(&host, &graph, "scene"), ClearValue::Color([0.0; 4]));
        assert_eq!(clear(&host, &graph, "a"), ClearValue::Color([0.0; 4]));
        assert_eq!(clear(&host, &graph, "depth"), ClearValue::Depth(1.0));
    }

    #[test]
    fn test_failed_post_leaves_host_untouched() {
        let mut host = HeadlessHost::new(64, 64);
        let mut loader = loader();
        let mut graph = RenderPassGraph::new();
        graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene")).unwrap();
        let card = graph.result_card_for("scene").unwrap();
        let targets = host.targets().len();
        let cameras = host.cameras().len();

        let broken = PassDesc::post("broken", ShaderSource::new("/missing.vert", "/missing.frag"));
        let result = graph.add_pass(&mut host, &mut loader, broken);
        assert!(matches!(result, Err(PipelineError::Shader(_))));

        assert!(graph.find("broken").is_none());
        assert_eq!(host.targets().len(), targets);
        assert_eq!(host.cameras().len(), cameras);
        let node = host.node(card).unwrap();
        assert!(node.inputs.is_empty());
        assert!(node.program.is_none());
    }

    #[test]
    fn test_lookups_scene_first_and_missing() {
        let mut host = HeadlessHost::new(64, 64);
        let mut loader = loader();
        let mut graph = RenderPassGraph::new();
        graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene")).unwrap();

        assert!(graph.camera_for("nope").is_none());
        assert!(graph.result_card_for("nope").is_none());
        assert!(graph.texture_for("scene", 9).is_none());
        // Scene passes have no source card
        assert!(graph.source_card_for("scene").is_none());

        // Shared names are allowed; scene passes win, then earlier post passes
        graph.add_pass(&mut host, &mut loader, post("scene")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("twin")).unwrap();
        graph.add_pass(&mut host, &mut loader, PassDesc::depth("scene")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("twin")).unwrap();
        assert_eq!(graph.len(), 5);

        let scene = &graph.scene_passes()[0];
        assert_eq!(graph.find("scene").unwrap().kind(), PassKind::Scene);
        assert_eq!(graph.camera_for("scene"), Some(scene.camera()));
        assert_eq!(graph.result_card_for("scene"), Some(scene.result_card()));
        assert_eq!(graph.texture_for("scene", 0), scene.texture(0));
        assert_eq!(graph.find("twin").unwrap().target(), graph.post_passes()[1].target());
    }

    #[test]
    fn test_reload_all_once_each() {
        let mut host = HeadlessHost::new(64, 64);
        let mut loader = loader();
        let mut graph = RenderPassGraph::new();
        graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("a")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("b")).unwrap();
        graph.activate();

        assert_eq!(graph.reload_all(&mut host, &mut loader), 2);
        assert!(graph.passes().all(|p| p.reloads() == 1));
        assert!(graph.passes().all(|p| p.state() == PassState::Reloaded));
    }

    #[test]
    fn test_failed_reload_keeps_program() {
        let mut host = HeadlessHost::new(64, 64);
        let mut loader = loader();
        let mut graph = RenderPassGraph::new();
        graph.add_pass(&mut host, &mut loader, PassDesc::scene("scene")).unwrap();
        graph.add_pass(&mut host, &mut loader, post("a")).unwrap();
        let before = graph.find("a").unwrap().program();

        loader.vfs().remove("/post.frag");
        assert_eq!(graph.reload_all(&mut host, &mut loader), 0);
        assert_eq!(graph.find("a").unwrap().program(), before);
        assert_eq!(graph.find("a").unwrap().reloads(), 1);
    }

    #[test]
    fn test_retire() {
        let mut host = HeadlessHost::new(64, 64);
        let mut graph = RenderPassGraph::new();
        graph.add_pass(&mut host, &mut loader(), PassDesc::scene("scene")).unwrap();
        let retired = graph.retire();
        assert_eq!(retired.len(), 1);
        assert_eq!(retired[0].state(), PassState::Retired);
        assert!(graph.is_empty());
    }
}
