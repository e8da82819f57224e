//! Integration tests for shader source loading
//!
//! Covers the on-disk path and the interplay between generated in-memory
//! fragments and files on disk.

use std::fs;

use umbra_shader::{
    ShaderDefine, ShaderError, ShaderLoader, ShaderLoaderConfig, ShaderSource, ShaderVariant,
    VirtualFs,
};

fn write_pair(dir: &std::path::Path) {
    fs::write(dir.join("bloom.vert.glsl"), "#version 330\nvoid main() {}\n").unwrap();
    fs::write(
        dir.join("bloom.frag.glsl"),
        "#version 330\n#include \"/$$umbra/config.inc\"\nout vec4 color;\nvoid main() {}\n",
    )
    .unwrap();
}

#[test]
fn test_load_from_disk_with_generated_include() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path());

    let vfs = VirtualFs::new();
    let header = ShaderVariant::new("config")
        .with_define(ShaderDefine::with_value("WINDOW_WIDTH", 1280))
        .with_define(ShaderDefine::with_value("WINDOW_HEIGHT", 720))
        .generate_header();
    vfs.write("/$$umbra/config.inc", header);

    let config = ShaderLoaderConfig {
        shader_base_path: dir.path().to_path_buf(),
        ..Default::default()
    };
    let mut loader = ShaderLoader::new(config, vfs.clone());

    let source = ShaderSource::new("bloom.vert.glsl", "bloom.frag.glsl");
    let program = loader.load(&source).expect("Should resolve pair");

    assert!(program.vertex.starts_with("#version 330"));
    assert!(program.fragment.contains("#define WINDOW_WIDTH 1280"));
    assert!(program.fragment.contains("#define WINDOW_HEIGHT 720"));
    assert!(program.fragment.contains("out vec4 color;"));

    // Regenerated fragment shows up on the next load
    vfs.write("/$$umbra/config.inc", "#define WINDOW_WIDTH 800\n");
    let program = loader.load(&source).expect("Should reload");
    assert!(program.fragment.contains("#define WINDOW_WIDTH 800"));
    assert_eq!(program.version.raw(), 2);
}

#[test]
fn test_missing_file_reports_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let config = ShaderLoaderConfig {
        shader_base_path: dir.path().to_path_buf(),
        ..Default::default()
    };
    let mut loader = ShaderLoader::new(config, VirtualFs::new());

    let result = loader.load(&ShaderSource::new("nope.vert", "nope.frag"));
    assert!(matches!(result, Err(ShaderError::NotFound(_))));
}

#[test]
fn test_missing_include_fails_whole_load() {
    let dir = tempfile::tempdir().unwrap();
    write_pair(dir.path());

    let config = ShaderLoaderConfig {
        shader_base_path: dir.path().to_path_buf(),
        ..Default::default()
    };
    // Generated fragment never written
    let mut loader = ShaderLoader::new(config, VirtualFs::new());
    let source = ShaderSource::new("bloom.vert.glsl", "bloom.frag.glsl");

    assert!(loader.load(&source).is_err());
    assert!(loader.version_of(&source).is_none());
}
