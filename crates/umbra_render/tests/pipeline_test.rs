//! End-to-end tests for the pipeline driver over the headless host

use umbra_render::pipeline::{COMMAND_COUNT_INPUT, LIGHT_DATA_INPUT};
use umbra_render::prelude::*;
use umbra_render::{
    HeadlessHost, PassState, ShaderInputValue, CONFIG_FRAGMENT_PATH, LIGHT_DATA_SIZE,
};

const POST_VERT: &str = "/post.vert";
const POST_FRAG: &str = "/post.frag";

fn pipeline_with(config: PipelineConfig, width: u32, height: u32) -> RenderPipeline<HeadlessHost> {
    let _ = env_logger::builder().is_test(true).try_init();

    let pipeline = RenderPipeline::new(HeadlessHost::new(width, height), config).unwrap();
    let vfs = pipeline.loader().vfs();
    vfs.write(POST_VERT, "void main() {}\n");
    vfs.write(
        POST_FRAG,
        format!("#include \"{}\"\nvoid main() {{}}\n", CONFIG_FRAGMENT_PATH),
    );
    pipeline
}

fn post(name: &str) -> PassDesc {
    PassDesc::post(name, ShaderSource::new(POST_VERT, POST_FRAG))
}

fn chained_pipeline(width: u32, height: u32) -> RenderPipeline<HeadlessHost> {
    let mut pipeline = pipeline_with(PipelineConfig::default(), width, height);
    pipeline.add_render_pass(PassDesc::scene("scene")).unwrap();
    pipeline.add_render_pass(post("lighting")).unwrap();
    pipeline.add_render_pass(post("final")).unwrap();
    pipeline
}

#[test]
fn test_scene_and_post_chain() {
    let mut pipeline = chained_pipeline(1280, 720);
    pipeline.update();

    let scene_card = pipeline.result_card_for("scene").unwrap();
    let lighting_card = pipeline.result_card_for("lighting").unwrap();
    assert_eq!(pipeline.source_card_for("lighting"), Some(scene_card));
    assert_eq!(pipeline.source_card_for("final"), Some(lighting_card));

    let final_camera = pipeline.camera_for("final").unwrap();
    assert_eq!(
        pipeline.host().camera(final_camera).unwrap().scene,
        Some(lighting_card)
    );

    // Post passes see the light table
    let card = pipeline.host().node(lighting_card).unwrap();
    assert!(card.inputs.contains_key(LIGHT_DATA_INPUT));
    assert!(card.program.is_some());

    assert!(pipeline
        .graph()
        .passes()
        .all(|pass| pass.state() == PassState::Active));
}

#[test]
fn test_post_without_scene_is_rejected() {
    let mut pipeline = pipeline_with(PipelineConfig::default(), 64, 64);
    let result = pipeline.add_render_pass(post("lonely"));
    assert!(matches!(result, Err(PipelineError::NoSourcePass(_))));
    assert!(pipeline.render_pass("lonely").is_none());
}

#[test]
fn test_shared_names_resolve_to_first_pass() {
    let mut pipeline = pipeline_with(PipelineConfig::default(), 64, 64);
    pipeline.add_render_pass(PassDesc::scene("dup")).unwrap();
    let post_pass = pipeline.add_render_pass(post("dup")).unwrap();
    assert_eq!(post_pass.kind(), PassKind::Post);

    assert_eq!(pipeline.graph().len(), 2);
    assert_eq!(pipeline.render_pass("dup").unwrap().kind(), PassKind::Scene);
    assert!(pipeline.source_card_for("dup").is_none());
}

#[test]
fn test_resize_reloads_every_pass_once() {
    let mut pipeline = chained_pipeline(1280, 720);
    assert!(!pipeline.update().resized);

    pipeline.host_mut().resize(1920, 1080);
    let stats = pipeline.update();
    assert!(stats.resized);

    for pass in pipeline.graph().passes() {
        assert_eq!(pass.reloads(), 1, "pass {}", pass.name());
    }
    assert_eq!(pipeline.config_fragment().window_width, 1920);
    assert_eq!(pipeline.config_fragment().window_height, 1080);

    let fragment = pipeline.loader().vfs().read(CONFIG_FRAGMENT_PATH).unwrap();
    assert!(fragment.contains("#define WINDOW_WIDTH 1920"));
    assert!(fragment.contains("#define WINDOW_HEIGHT 1080"));

    // Post shaders live on their source card and picked up the new fragment
    let card = pipeline.source_card_for("final").unwrap();
    let program = pipeline.host().node(card).unwrap().program.unwrap();
    let text = &pipeline.host().program(program).unwrap().fragment;
    assert!(text.contains("#define WINDOW_WIDTH 1920"));

    // Same size again: nothing reloads
    assert!(!pipeline.update().resized);
    assert!(pipeline.graph().passes().all(|pass| pass.reloads() == 1));
}

#[test]
fn test_unknown_lookups() {
    let pipeline = chained_pipeline(64, 64);
    assert!(pipeline.render_pass("missing").is_none());
    assert!(pipeline.camera_for("missing").is_none());
    assert!(pipeline.result_card_for("missing").is_none());
    assert!(pipeline.source_card_for("missing").is_none());
    assert!(pipeline.texture_for("missing", 0).is_none());
    assert!(pipeline.texture_for("scene", 42).is_none());
}

#[test]
fn test_light_data_layout() {
    let mut pipeline = pipeline_with(PipelineConfig::default(), 64, 64);
    let handle = pipeline
        .add_light(Light::point([1.0, 2.0, 3.0], [0.5, 0.25, 1.0], 6.0))
        .unwrap();
    pipeline.update();

    assert_eq!(pipeline.light_data().len(), LIGHT_DATA_SIZE);
    let uploaded = pipeline.host().find_buffer(LIGHT_DATA_INPUT).unwrap();
    assert_eq!(uploaded.data, pipeline.light_data());

    let record = pipeline.table().light(handle.slot() as usize).unwrap();
    assert_eq!(record.light_kind(), LightKind::Point);
    assert_eq!(record.position, [1.0, 2.0, 3.0]);
    assert_eq!(record.radius, 6.0);
}

#[test]
fn test_command_count_published() {
    let mut pipeline = pipeline_with(PipelineConfig::default(), 64, 64);
    pipeline.add_light(Light::point([0.0; 3], [1.0; 3], 1.0));
    pipeline.add_light(Light::point([0.0; 3], [1.0; 3], 1.0));
    assert_eq!(pipeline.update().commands, 2);

    let root = pipeline.host().node(pipeline.scene()).unwrap();
    assert_eq!(
        root.inputs.get(COMMAND_COUNT_INPUT),
        Some(&ShaderInputValue::Float(2.0))
    );

    assert_eq!(pipeline.update().commands, 0);
}

#[test]
fn test_shadow_budget_respected() {
    let mut config = PipelineConfig::default();
    config.shadows.max_updates = 4;
    let mut pipeline = pipeline_with(config, 64, 64);

    for x in 0..3 {
        pipeline
            .add_light(Light::point([x as f32, 1.0, 0.0], [1.0; 3], 5.0).with_shadows(true))
            .unwrap();
    }

    // Three point lights need eighteen tiles
    let mut rendered = 0;
    for _ in 0..5 {
        let stats = pipeline.update();
        assert!(stats.shadow_renders <= 4);
        rendered += stats.shadow_renders;
    }
    assert_eq!(rendered, 18);
    assert_eq!(pipeline.host().shadow_renders().len(), 18);
    assert!(pipeline
        .host()
        .shadow_renders()
        .iter()
        .all(|(target, _)| *target == pipeline.atlas_target()));
}

#[test]
fn test_removing_shadowed_light_clears_its_sources() {
    let mut pipeline = pipeline_with(PipelineConfig::default(), 64, 64);
    let handle = pipeline
        .add_light(Light::point([0.0, 1.0, 0.0], [1.0; 3], 5.0).with_shadows(true))
        .unwrap();
    let other = pipeline
        .add_light(Light::spot([0.0, 3.0, 0.0], [0.0, -1.0, 0.0], [1.0; 3], 5.0, 45.0).with_shadows(true))
        .unwrap();
    pipeline.update();

    let record = *pipeline.table().light(handle.slot() as usize).unwrap();
    let first = record.shadow_source_index().unwrap();
    for slot in first..first + 6 {
        assert!(pipeline.table().shadow_source(slot).is_some(), "slot {}", slot);
    }

    assert!(pipeline.remove_light(handle));
    pipeline.update();

    assert!(pipeline.table().light(handle.slot() as usize).is_none());
    for slot in first..first + 6 {
        assert!(pipeline.table().shadow_source(slot).is_none(), "slot {}", slot);
    }

    // The spot light's source survives the range removal
    let spot = *pipeline.table().light(other.slot() as usize).unwrap();
    let spot_source = spot.shadow_source_index().unwrap();
    assert!(pipeline.table().shadow_source(spot_source).is_some());
}

#[test]
fn test_config_from_json() {
    let config = PipelineConfig::from_json(
        r#"{ "max_lights": 4, "srgb": true, "shadows": { "tile_size": 256 } }"#,
    )
    .unwrap();
    let pipeline = pipeline_with(config, 64, 64);

    assert_eq!(pipeline.table().max_lights(), 4);
    assert_eq!(pipeline.table().max_shadow_sources(), 24);
    assert_eq!(pipeline.light_data().len(), pipeline.table().byte_size());
    assert!(pipeline.config_fragment().has_srgb);
    // 24 sources in a 5x5 grid of 256 tiles
    assert_eq!(pipeline.atlas().size(), 2048);
}
