//! Headless lighting walkthrough
//!
//! Builds a scene pass with two post passes, lights a small room, steps a
//! few frames while a lamp orbits, resizes the window mid-run and prints what
//! the pipeline did each frame.
//!
//! Usage: RUST_LOG=info cargo run -p room [frames]

use glam::{Mat4, Vec3};

use umbra_render::prelude::*;
use umbra_render::{HeadlessHost, InstanceBuffer};

const LIGHTING_VERT: &str = "/room/lighting.vert";
const LIGHTING_FRAG: &str = "/room/lighting.frag";
const TONEMAP_FRAG: &str = "/room/tonemap.frag";

const FULLSCREEN_VERT: &str = "\
#version 330
in vec4 p3d_Vertex;
void main() { gl_Position = p3d_Vertex; }
";

const LIGHTING_SRC: &str = "\
#version 330
#include \"/$$umbra/config.inc\"
uniform sampler2D prev_color;
uniform samplerBuffer light_data;
out vec4 color;
void main() { color = texture(prev_color, gl_FragCoord.xy / vec2(WINDOW_WIDTH, WINDOW_HEIGHT)); }
";

const TONEMAP_SRC: &str = "\
#version 330
#include \"/$$umbra/config.inc\"
uniform sampler2D prev_color;
out vec4 color;
void main() {
    vec3 c = texture(prev_color, gl_FragCoord.xy / vec2(WINDOW_WIDTH, WINDOW_HEIGHT)).rgb;
    color = vec4(c / (c + 1.0), 1.0);
}
";

fn main() -> Result<(), PipelineError> {
    env_logger::init();

    let frames: u64 = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(8);

    let mut host = HeadlessHost::new(1280, 720);
    host.set_shadow_filter(true);
    host.add_scene_light(Light::point([0.0, 2.5, 0.0], [1.0, 0.9, 0.8], 10.0).with_shadows(true));

    let mut config = PipelineConfig::default();
    config.shadows.max_updates = 4;
    let mut pipeline = RenderPipeline::new(host, config)?;

    let vfs = pipeline.loader().vfs();
    vfs.write(LIGHTING_VERT, FULLSCREEN_VERT);
    vfs.write(LIGHTING_FRAG, LIGHTING_SRC);
    vfs.write(TONEMAP_FRAG, TONEMAP_SRC);

    pipeline.add_render_pass(PassDesc::scene("scene"))?;
    pipeline.add_render_pass(PassDesc::post(
        "lighting",
        ShaderSource::new(LIGHTING_VERT, LIGHTING_FRAG),
    ))?;
    pipeline.add_render_pass(PassDesc::post(
        "tonemap",
        ShaderSource::new(LIGHTING_VERT, TONEMAP_FRAG),
    ))?;

    let imported = pipeline.prepare_scene();
    let lamp = pipeline.add_light(
        Light::spot([2.0, 3.0, 0.0], [0.0, -1.0, 0.0], [0.4, 0.6, 1.0], 8.0, 50.0)
            .with_shadows(true)
            .with_inner_radius(1.0),
    );
    log::info!(
        "{} scene lights imported, {} lights total",
        imported.len(),
        pipeline.num_lights()
    );

    let mut crates = InstanceBuffer::new("crates", 4);
    for i in 0..crates.len() {
        let offset = Vec3::new(i as f32 * 1.5 - 2.25, 0.5, -2.0);
        crates.set_transform(i, Mat4::from_translation(offset));
    }

    for frame in 0..frames {
        if frame == frames / 2 {
            pipeline.host_mut().resize(1920, 1080);
        }

        if let Some(handle) = lamp {
            let angle = frame as f32 * 0.4;
            let position = [2.0 * angle.cos(), 3.0, 2.0 * angle.sin()];
            let moved = Light::spot(position, [0.0, -1.0, 0.0], [0.4, 0.6, 1.0], 8.0, 50.0)
                .with_shadows(true)
                .with_inner_radius(1.0);
            pipeline.update_light(handle, moved);
        }

        crates.begin_frame();
        crates.set_time(0, frame as f32 / 60.0);
        let root = pipeline.scene();
        crates.upload(pipeline.host_mut(), root);

        let stats = pipeline.update();
        println!(
            "frame {:>3}: {:>3} commands, {:>2} shadow tiles{}",
            stats.frame,
            stats.commands,
            stats.shadow_renders,
            if stats.resized { ", resized" } else { "" }
        );
    }

    println!();
    for pass in pipeline.graph().passes() {
        println!(
            "{:<10} {:?} sort {:>3} {}x{} reloads {}",
            pass.name(),
            pass.state(),
            pass.sort(),
            pass.size()[0],
            pass.size()[1],
            pass.reloads()
        );
    }
    println!(
        "\natlas {}px, {} active lights, {} bytes of light data",
        pipeline.atlas().size(),
        pipeline.table().active_lights(),
        pipeline.light_data().len()
    );
    print!("{}", pipeline.loader().vfs().read("/$$umbra/config.inc").unwrap_or_default());

    Ok(())
}
