use crate::compiler_frontend::compiler_messages::compiler_errors::CompilerError;
use serde::Deserialize;
use std::fs;
use std::path::Path;

pub const CONFIG_FILE_NAME: &str = "stencil.toml";

// Names the generated program reserves for itself.
// Template variables are plain word characters, so a leading `$` can never collide.
pub const OUTPUT_BUFFER_NAME: &str = "$out";
pub const DATA_CONTEXT_NAME: &str = "$data";
pub const SHOW_HELPER_NAME: &str = "$show";
pub const TEXT_HELPER_NAME: &str = "$text";
pub const LOOP_BODY_NAME: &str = "$body";
pub const LOOP_METADATA_NAME: &str = "foreach";

// Printed in front of an unresolved reference when undefined output is enabled
pub const UNDEFINED_OUTPUT_PREFIX: char = '$';

// Rough guess of generated program size relative to the template tree.
// Just a heuristic to avoid a few reallocations of the body buffer.
pub const NODE_TO_PROGRAM_RATIO: usize = 24;

/// Compile-time options supplied by whoever hosts the compiler.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Emit a polyfill giving arrays a `size()` method when the runtime lacks one.
    #[serde(alias = "arraySize", alias = "arraySizeHelper")]
    pub array_size_helper: bool,

    /// Render unresolved top-level references as `$expression` instead of empty text.
    #[serde(alias = "undefinedOutput")]
    pub undefined_output: bool,
}

impl Config {
    pub fn new(array_size_helper: bool, undefined_output: bool) -> Self {
        Config {
            array_size_helper,
            undefined_output,
        }
    }

    pub fn from_toml_str(source: &str) -> Result<Self, CompilerError> {
        toml::from_str(source).map_err(|error| {
            CompilerError::new_config_error(format!("Invalid {}: {}", CONFIG_FILE_NAME, error))
        })
    }

    pub fn load(path: &Path) -> Result<Self, CompilerError> {
        let source = fs::read_to_string(path).map_err(|error| {
            CompilerError::new_config_error(format!(
                "Can't read config file {}: {}",
                path.display(),
                error
            ))
        })?;

        Self::from_toml_str(&source)
    }
}
