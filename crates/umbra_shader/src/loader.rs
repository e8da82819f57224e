//! Shader source loading
//!
//! Resolves a vertex/fragment path pair into program text. Every path is
//! looked up in the [`VirtualFs`] first and on disk (relative to the base
//! path) second. `#include "path"` lines are expanded recursively.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::vfs::VirtualFs;
use crate::ShaderError;

/// Loader configuration
#[derive(Debug, Clone)]
pub struct ShaderLoaderConfig {
    /// Base path for on-disk shader files
    pub shader_base_path: PathBuf,
    /// Maximum `#include` nesting
    pub max_include_depth: usize,
}

impl Default for ShaderLoaderConfig {
    fn default() -> Self {
        Self {
            shader_base_path: PathBuf::from("shaders"),
            max_include_depth: 16,
        }
    }
}

/// A vertex/fragment source path pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderSource {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ShaderSource {
    pub fn new(vertex: impl Into<PathBuf>, fragment: impl Into<PathBuf>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }
}

/// Shader version for tracking reloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShaderVersion(u32);

impl ShaderVersion {
    /// Initial version
    pub const INITIAL: Self = Self(1);

    /// Get the raw version number
    pub fn raw(&self) -> u32 {
        self.0
    }

    /// Get the next version
    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for ShaderVersion {
    fn default() -> Self {
        Self::INITIAL
    }
}

/// Fully resolved program text, ready for the host to compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgram {
    /// Where the text came from
    pub source: ShaderSource,
    /// Vertex stage text with includes expanded
    pub vertex: String,
    /// Fragment stage text with includes expanded
    pub fragment: String,
    /// Bumped on every successful load of the same pair
    pub version: ShaderVersion,
}

/// Resolves [`ShaderSource`] pairs into [`ShaderProgram`]s
#[derive(Debug)]
pub struct ShaderLoader {
    config: ShaderLoaderConfig,
    vfs: VirtualFs,
    versions: HashMap<ShaderSource, ShaderVersion>,
}

impl ShaderLoader {
    /// Create a loader reading through `vfs`
    pub fn new(config: ShaderLoaderConfig, vfs: VirtualFs) -> Self {
        Self {
            config,
            vfs,
            versions: HashMap::new(),
        }
    }

    /// The virtual filesystem consulted before disk
    pub fn vfs(&self) -> &VirtualFs {
        &self.vfs
    }

    /// Loader configuration
    pub fn config(&self) -> &ShaderLoaderConfig {
        &self.config
    }

    /// Load and resolve a vertex/fragment pair
    ///
    /// The version only advances when both stages resolve.
    pub fn load(&mut self, source: &ShaderSource) -> Result<ShaderProgram, ShaderError> {
        let vertex = self.resolve(&source.vertex, 0)?;
        let fragment = self.resolve(&source.fragment, 0)?;

        let version = match self.versions.get(source) {
            Some(v) => v.next(),
            None => ShaderVersion::INITIAL,
        };
        self.versions.insert(source.clone(), version);

        log::debug!(
            "Loaded shader {:?} / {:?} (v{})",
            source.vertex,
            source.fragment,
            version.raw()
        );

        Ok(ShaderProgram {
            source: source.clone(),
            vertex,
            fragment,
            version,
        })
    }

    /// Current version of a pair, if it was ever loaded
    pub fn version_of(&self, source: &ShaderSource) -> Option<ShaderVersion> {
        self.versions.get(source).copied()
    }

    fn read(&self, path: &Path) -> Result<String, ShaderError> {
        if let Some(text) = self.vfs.read(path) {
            return Ok(text);
        }

        let full_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config.shader_base_path.join(path)
        };
        if !full_path.exists() {
            return Err(ShaderError::NotFound(path.display().to_string()));
        }
        Ok(std::fs::read_to_string(&full_path)?)
    }

    fn resolve(&self, path: &Path, depth: usize) -> Result<String, ShaderError> {
        if depth > self.config.max_include_depth {
            return Err(ShaderError::IncludeDepth(path.display().to_string()));
        }

        let text = self.read(path)?;
        if depth == 0 && text.trim().is_empty() {
            return Err(ShaderError::EmptySource(path.display().to_string()));
        }

        let mut out = String::with_capacity(text.len());
        for line in text.lines() {
            match parse_include(line) {
                Some(include) => {
                    let included = self.resolve(Path::new(include), depth + 1)?;
                    out.push_str(&included);
                    if !included.ends_with('\n') {
                        out.push('\n');
                    }
                }
                None => {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
        Ok(out)
    }
}

/// Extract the quoted path from an `#include "..."` line
fn parse_include(line: &str) -> Option<&str> {
    let rest = line.trim().strip_prefix("#include")?;
    let rest = rest.trim();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(&rest[..end])
}
