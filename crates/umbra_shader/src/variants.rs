//! Preprocessor defines
//!
//! Define sets are rendered into `#define` headers that shaders pull in with
//! `#include`.

/// Shader preprocessor define
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ShaderDefine {
    /// Define name
    pub name: String,
    pub value: String,
}

impl ShaderDefine {
    /// Create a define with a value
    pub fn with_value(name: impl Into<String>, value: impl ToString) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// Create a 0/1 feature flag
    pub fn flag(name: impl Into<String>, enabled: bool) -> Self {
        Self::with_value(name, if enabled { 1 } else { 0 })
    }

    /// Convert to preprocessor directive
    pub fn to_directive(&self) -> String {
        format!("#define {} {}", self.name, self.value)
    }
}

/// A named, ordered set of defines
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ShaderVariant {
    /// Defines for this variant
    pub defines: Vec<ShaderDefine>,
    /// Variant name/identifier
    pub name: String,
}

impl ShaderVariant {
    /// Create a new variant
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defines: Vec::new(),
        }
    }

    /// Add a define
    pub fn with_define(mut self, define: ShaderDefine) -> Self {
        self.defines.push(define);
        self
    }

    /// Add multiple defines
    pub fn with_defines(mut self, defines: Vec<ShaderDefine>) -> Self {
        self.defines.extend(defines);
        self
    }

    /// Look up a define's value by name
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.defines
            .iter()
            .find(|d| d.name == name)
            .map(|d| d.value.as_str())
    }

    /// Generate preprocessor header
    pub fn generate_header(&self) -> String {
        let mut header = String::new();
        for define in &self.defines {
            header.push_str(&define.to_directive());
            header.push('\n');
        }
        header
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_define_directive() {
        assert_eq!(
            ShaderDefine::with_value("WINDOW_WIDTH", 1280).to_directive(),
            "#define WINDOW_WIDTH 1280"
        );
        assert_eq!(ShaderDefine::flag("HAS_SRGB", false).to_directive(), "#define HAS_SRGB 0");
    }

    #[test]
    fn test_variant_header() {
        let variant = ShaderVariant::new("config")
            .with_define(ShaderDefine::flag("DEPTH2COLOR", true))
            .with_define(ShaderDefine::with_value("CAMERA_FAR", 100.0));

        assert_eq!(
            variant.generate_header(),
            "#define DEPTH2COLOR 1\n#define CAMERA_FAR 100\n"
        );
        assert_eq!(variant.value_of("DEPTH2COLOR"), Some("1"));
        assert_eq!(variant.value_of("MISSING"), None);
    }
}
