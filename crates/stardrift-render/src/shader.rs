//! Shader program definitions, validation, and module caching.
//!
//! Programs are embedded WGSL strings tagged with a version. Each one is
//! parsed and validated with naga before wgpu sees it, so a bad shader shows
//! up as a [`ShaderError`] instead of a device-lost panic.

use log::{debug, info};
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use wgpu::{ShaderModuleDescriptor, ShaderSource};

/// Error types for shader loading operations.
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("shader '{name}' failed to parse: {message}")]
    ParseFailed { name: String, message: String },

    #[error("shader '{name}' failed validation: {message}")]
    ValidationFailed { name: String, message: String },

    #[error("shader '{name}' is missing entry point '{entry_point}'")]
    MissingEntryPoint { name: String, entry_point: String },
}

/// An embedded WGSL program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgram {
    /// Human-readable name, also used as the module label.
    pub name: &'static str,
    /// Bumped whenever the source changes so cached modules are never stale.
    pub version: u32,
    /// WGSL source.
    pub source: &'static str,
}

impl ShaderProgram {
    /// Cache key combining name and version, e.g. `"starfield@v1"`.
    pub fn key(&self) -> String {
        format!("{}@v{}", self.name, self.version)
    }

    /// Parse and validate the source with naga, and check that the
    /// `vs_main` and `fs_main` entry points exist.
    pub fn validate(&self) -> Result<(), ShaderError> {
        let module = naga::front::wgsl::parse_str(self.source).map_err(|e| {
            ShaderError::ParseFailed {
                name: self.name.to_string(),
                message: e.emit_to_string(self.source),
            }
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|e| ShaderError::ValidationFailed {
            name: self.name.to_string(),
            message: e.emit_to_string(self.source),
        })?;

        for entry_point in ["vs_main", "fs_main"] {
            if !module.entry_points.iter().any(|ep| ep.name == entry_point) {
                return Err(ShaderError::MissingEntryPoint {
                    name: self.name.to_string(),
                    entry_point: entry_point.to_string(),
                });
            }
        }

        Ok(())
    }
}

/// Registry of compiled shader modules, keyed by program name and version.
pub struct ShaderLibrary {
    modules: HashMap<String, Arc<wgpu::ShaderModule>>,
}

impl ShaderLibrary {
    /// Create a new empty shader library.
    pub fn new() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }

    /// Compile a program, or return the cached module if this exact
    /// version was already compiled.
    pub fn load(
        &mut self,
        device: &wgpu::Device,
        program: &ShaderProgram,
    ) -> Result<Arc<wgpu::ShaderModule>, ShaderError> {
        let key = program.key();
        if let Some(module) = self.modules.get(&key) {
            debug!("Shader '{}' served from cache", key);
            return Ok(module.clone());
        }

        program.validate()?;

        let module = Arc::new(device.create_shader_module(ShaderModuleDescriptor {
            label: Some(program.name),
            source: ShaderSource::Wgsl(program.source.into()),
        }));
        self.modules.insert(key.clone(), module.clone());
        info!("Compiled shader '{}'", key);

        Ok(module)
    }

    /// Drop every cached module.
    pub fn clear(&mut self) {
        self.modules.clear();
    }

    /// Number of compiled modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if the shader library is empty.
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ShaderLibrary {
    fn default() -> Self {
        Self::new()
    }
}
