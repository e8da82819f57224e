//! Pipeline Driver
//!
//! Owns all pipeline state and steps it once per frame:
//!
//! 1. The light manager emits commands and requests shadow renders.
//! 2. The shadow manager hands this frame's renders to the host.
//! 3. A bounded batch of commands is drained, applied to the light table and
//!    uploaded together with the serialized table.
//! 4. If the window size changed, the configuration fragment is regenerated
//!    and every pass reloads its shader.

use umbra_shader::{ShaderLoader, ShaderLoaderConfig, VirtualFs};

use crate::command::{CommandBlock, CommandQueue, COMMAND_SIZE};
use crate::config::{ConfigFragment, PipelineConfig, CONFIG_FRAGMENT_PATH};
use crate::error::PipelineError;
use crate::host::{
    AttachmentPoint, BufferId, CameraId, ClearValue, FilterMode, GraphicsHost, NodeId,
    ShaderInputValue, TargetDesc, TargetId, TextureDesc, TextureFormat, TextureId,
};
use crate::light::{Light, LightHandle, LightManager, SlotLightManager};
use crate::light_table::LightTable;
use crate::pass::{PassDesc, RenderPass, RenderPassGraph};
use crate::shadow::{ShadowAtlas, ShadowManager, ShadowScheduler};

/// Serialized light table
pub const LIGHT_DATA_INPUT: &str = "light_data";
/// Command blocks drained this frame
pub const COMMAND_LIST_INPUT: &str = "command_list";
/// Number of valid blocks in `command_list`
pub const COMMAND_COUNT_INPUT: &str = "command_count";
/// Shadow atlas texture
pub const SHADOW_ATLAS_INPUT: &str = "shadow_atlas";

/// Render order of the shadow atlas target
const ATLAS_SORT: i32 = -10;

/// What happened during one `update`
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frame: u64,
    /// Commands drained and applied
    pub commands: usize,
    /// Shadow tiles rendered
    pub shadow_renders: usize,
    /// Window size changed and passes were reloaded
    pub resized: bool,
}

/// Deferred lighting pipeline
pub struct RenderPipeline<H: GraphicsHost> {
    host: H,
    config: PipelineConfig,
    loader: ShaderLoader,
    queue: CommandQueue,
    table: LightTable,
    staging: Vec<CommandBlock>,
    light_data: Vec<u8>,
    light_manager: Box<dyn LightManager>,
    shadows: Box<dyn ShadowManager>,
    atlas: ShadowAtlas,
    atlas_target: TargetId,
    atlas_texture: TextureId,
    command_buffer: BufferId,
    light_buffer: BufferId,
    graph: RenderPassGraph,
    window_size: [u32; 2],
    fragment: ConfigFragment,
    stats: FrameStats,
}

impl<H: GraphicsHost> RenderPipeline<H> {
    /// Create a pipeline with the built-in light and shadow managers
    pub fn new(host: H, mut config: PipelineConfig) -> Result<Self, PipelineError> {
        config.validate();
        let atlas = Self::atlas_for(&config);
        let light_manager = SlotLightManager::new(config.max_lights, atlas, &config.shadows);
        let shadows = ShadowScheduler::new(config.shadows.max_updates);
        Self::with_managers(host, config, Box::new(light_manager), Box::new(shadows))
    }

    /// Create a pipeline with custom managers
    pub fn with_managers(
        mut host: H,
        mut config: PipelineConfig,
        mut light_manager: Box<dyn LightManager>,
        mut shadows: Box<dyn ShadowManager>,
    ) -> Result<Self, PipelineError> {
        config.validate();
        light_manager.set_shadow_update_distance(config.shadows.update_distance);
        shadows.set_max_updates(config.shadows.max_updates);

        let vfs = VirtualFs::new();
        let loader = ShaderLoader::new(
            ShaderLoaderConfig {
                shader_base_path: config.shader_base_path.clone(),
                ..Default::default()
            },
            vfs,
        );

        let queue = CommandQueue::with_capacity(config.command_queue_limit);
        let table = LightTable::new(config.max_lights);
        let atlas = Self::atlas_for(&config);

        let (atlas_target, atlas_texture) = Self::make_atlas(&mut host, &config, &atlas)?;
        let command_buffer = host.make_buffer(
            COMMAND_LIST_INPUT,
            config.command_queue_limit * COMMAND_SIZE,
        );
        let light_buffer = host.make_buffer(LIGHT_DATA_INPUT, table.byte_size());
        let window_size = host.window_size();

        let fragment = ConfigFragment {
            depth_to_color: config.shadows.depth_to_color,
            has_pcf: Self::use_pcf(&host, &config),
            has_srgb: config.srgb,
            camera_near: host.main_lens().near(),
            camera_far: host.main_lens().far(),
            window_width: window_size[0],
            window_height: window_size[1],
        };

        log::info!(
            "Pipeline: {} lights, {} shadow sources, atlas {}x{}, window {}x{}",
            table.max_lights(),
            table.max_shadow_sources(),
            atlas.size(),
            atlas.size(),
            window_size[0],
            window_size[1]
        );

        let mut pipeline = Self {
            staging: vec![CommandBlock::default(); config.command_queue_limit],
            light_data: vec![0; table.byte_size()],
            graph: RenderPassGraph::new()
                .with_srgb(config.srgb)
                .with_alpha(config.alpha),
            host,
            config,
            loader,
            queue,
            table,
            light_manager,
            shadows,
            atlas,
            atlas_target,
            atlas_texture,
            command_buffer,
            light_buffer,
            window_size,
            fragment,
            stats: FrameStats::default(),
        };
        pipeline.configure();
        let root = pipeline.host.scene_root();
        pipeline.bind_pipeline_inputs(root);
        Ok(pipeline)
    }

    fn atlas_for(config: &PipelineConfig) -> ShadowAtlas {
        let max_sources = config.max_lights * crate::record::SHADOW_SOURCES_PER_LIGHT;
        ShadowAtlas::new(max_sources as u32, config.shadows.tile_size)
    }

    fn use_pcf(host: &H, config: &PipelineConfig) -> bool {
        config.shadows.hardware_pcf && !config.shadows.depth_to_color && host.supports_shadow_filter()
    }

    /// Allocate the shadow atlas target and its texture
    fn make_atlas(
        host: &mut H,
        config: &PipelineConfig,
        atlas: &ShadowAtlas,
    ) -> Result<(TargetId, TextureId), PipelineError> {
        let depth_to_color = config.shadows.depth_to_color;
        let target = host.make_target(&TargetDesc {
            name: SHADOW_ATLAS_INPUT.into(),
            size: [atlas.size(), atlas.size()],
            follows_window: false,
            sort: ATLAS_SORT,
            clear: if depth_to_color {
                ClearValue::Color([1.0; 4])
            } else {
                ClearValue::Depth(1.0)
            },
        })?;

        let (format, point) = if depth_to_color {
            (TextureFormat::Rgba32Float, AttachmentPoint::Color)
        } else {
            (TextureFormat::Depth32Float, AttachmentPoint::Depth)
        };
        let filter = if Self::use_pcf(host, config) {
            FilterMode::Shadow
        } else {
            FilterMode::Linear
        };
        let texture = host.make_texture(&TextureDesc::new(SHADOW_ATLAS_INPUT, format).with_filter(filter));
        host.attach_texture(target, texture, point)?;
        Ok((target, texture))
    }

    /// Regenerate the configuration fragment for the current window
    fn configure(&mut self) {
        let lens = self.host.main_lens();
        self.fragment.camera_near = lens.near();
        self.fragment.camera_far = lens.far();
        self.fragment.window_width = self.window_size[0];
        self.fragment.window_height = self.window_size[1];
        self.loader.vfs().write(CONFIG_FRAGMENT_PATH, self.fragment.render());
        log::debug!(
            "Wrote {} for {}x{}",
            CONFIG_FRAGMENT_PATH,
            self.window_size[0],
            self.window_size[1]
        );
    }

    /// Bind the light table, command list and atlas on `node`
    fn bind_pipeline_inputs(&mut self, node: NodeId) {
        self.host
            .set_shader_input(node, LIGHT_DATA_INPUT, ShaderInputValue::Buffer(self.light_buffer));
        self.host
            .set_shader_input(node, COMMAND_LIST_INPUT, ShaderInputValue::Buffer(self.command_buffer));
        self.host
            .set_shader_input(node, SHADOW_ATLAS_INPUT, ShaderInputValue::Texture(self.atlas_texture));
    }

    /// Add a pass to the graph
    ///
    /// Post passes also get the light table, command list and shadow atlas
    /// bound on their source card.
    pub fn add_render_pass(&mut self, desc: PassDesc) -> Result<&RenderPass, PipelineError> {
        let name = desc.name.clone();
        let is_post = desc.kind.is_post();
        let source_card = self
            .graph
            .add_pass(&mut self.host, &mut self.loader, desc)?
            .source_card();
        if let Some(card) = source_card {
            self.bind_pipeline_inputs(card);
        }
        // Names may repeat, so return the pass just added rather than a lookup
        let added = if is_post {
            self.graph.post_passes().last()
        } else {
            self.graph.scene_passes().last()
        };
        added.ok_or(PipelineError::NoSourcePass(name))
    }

    /// Step one frame
    pub fn update(&mut self) -> FrameStats {
        let frame = self.stats.frame + 1;

        // Light state
        self.light_manager
            .set_camera_position(self.host.camera_position());
        self.light_manager
            .update(&mut self.queue, self.shadows.as_mut());

        // Shadow tiles
        let renders = self.shadows.update();
        for render in &renders {
            self.host.render_shadow_tile(self.atlas_target, render);
        }

        // Commands into the table, table into the buffer
        let limit = self.config.command_queue_limit;
        let count = self.queue.write_commands_to(&mut self.staging, limit);
        let batch = &self.staging[..count];
        self.table.apply_all(batch);
        self.host
            .write_buffer(self.command_buffer, bytemuck::cast_slice(batch));
        let root = self.host.scene_root();
        self.host
            .set_shader_input(root, COMMAND_COUNT_INPUT, ShaderInputValue::Float(count as f32));
        self.table.serialize_into(&mut self.light_data);
        self.host.write_buffer(self.light_buffer, &self.light_data);

        // Resolution changes
        let window_size = self.host.window_size();
        let resized = window_size != self.window_size;
        if resized {
            log::info!(
                "Window resized {}x{} -> {}x{}, reloading {} passes",
                self.window_size[0],
                self.window_size[1],
                window_size[0],
                window_size[1],
                self.graph.len()
            );
            self.window_size = window_size;
            self.configure();
            self.graph.reload_all(&mut self.host, &mut self.loader);
        }
        self.graph.activate();

        self.stats = FrameStats {
            frame,
            commands: count,
            shadow_renders: renders.len(),
            resized,
        };
        log::trace!("{:?}", self.stats);
        self.stats
    }

    /// Start managing a light
    pub fn add_light(&mut self, light: Light) -> Option<LightHandle> {
        self.light_manager.add_light(light)
    }

    /// Stop managing a light
    pub fn remove_light(&mut self, handle: LightHandle) -> bool {
        self.light_manager.remove_light(handle)
    }

    /// Remove several lights, returning how many were live
    pub fn remove_lights(&mut self, handles: impl IntoIterator<Item = LightHandle>) -> usize {
        handles
            .into_iter()
            .filter(|handle| self.light_manager.remove_light(*handle))
            .count()
    }

    /// Replace a light's parameters
    pub fn update_light(&mut self, handle: LightHandle, light: Light) -> bool {
        self.light_manager.update_light(handle, light)
    }

    pub fn num_lights(&self) -> usize {
        self.light_manager.num_lights()
    }

    /// Commands waiting to be drained
    pub fn num_commands(&self) -> usize {
        self.queue.len()
    }

    /// Shadow renders still accepted this frame
    pub fn num_updates(&self) -> usize {
        self.shadows.updates_remaining()
    }

    pub fn set_shadow_update_distance(&mut self, distance: f32) {
        self.light_manager.set_shadow_update_distance(distance);
    }

    /// Re-render every shadow source over the coming frames
    pub fn invalidate_shadows(&mut self) {
        self.light_manager.invalidate_shadows();
    }

    /// Import the host scene's lights
    pub fn prepare_scene(&mut self) -> Vec<LightHandle> {
        if !self.config.import_scene_lights {
            return Vec::new();
        }
        let lights = self.host.scene_lights();
        let found = lights.len();
        let handles: Vec<_> = lights
            .into_iter()
            .filter_map(|light| self.light_manager.add_light(light))
            .collect();
        if handles.len() < found {
            log::warn!(
                "Imported {} of {} scene lights",
                handles.len(),
                found
            );
        } else {
            log::info!("Imported {} scene lights", found);
        }
        handles
    }

    /// Root of the 3-D scene
    pub fn scene(&self) -> NodeId {
        self.host.scene_root()
    }

    /// Serialized light table as of the last update
    pub fn light_data(&self) -> &[u8] {
        &self.light_data
    }

    pub fn config_fragment(&self) -> &ConfigFragment {
        &self.fragment
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn table(&self) -> &LightTable {
        &self.table
    }

    pub fn atlas(&self) -> &ShadowAtlas {
        &self.atlas
    }

    pub fn atlas_target(&self) -> TargetId {
        self.atlas_target
    }

    pub fn graph(&self) -> &RenderPassGraph {
        &self.graph
    }

    /// Shader loader (and the virtual filesystem behind it)
    pub fn loader(&self) -> &ShaderLoader {
        &self.loader
    }

    pub fn render_pass(&self, name: &str) -> Option<&RenderPass> {
        self.graph.find(name)
    }

    pub fn camera_for(&self, name: &str) -> Option<CameraId> {
        self.graph.camera_for(name)
    }

    pub fn source_card_for(&self, name: &str) -> Option<NodeId> {
        self.graph.source_card_for(name)
    }

    pub fn result_card_for(&self, name: &str) -> Option<NodeId> {
        self.graph.result_card_for(name)
    }

    pub fn texture_for(&self, name: &str, index: usize) -> Option<TextureId> {
        self.graph.texture_for(name, index)
    }

    /// Stats of the last update
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }
}
