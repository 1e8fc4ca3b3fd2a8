use std::path::PathBuf;

/// Settings for one interpreter session.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Stands in for the working directory when resolving modules.
    pub root_dir: PathBuf,
    /// Conventional subdirectory searched for modules.
    pub modules_dir: String,
    /// Source file extension, without the dot.
    pub extension: String,
    /// Deepest allowed nesting of user function calls.
    pub max_call_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            modules_dir: "modules".to_string(),
            extension: "vlb".to_string(),
            max_call_depth: 256,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    pub fn modules_dir(mut self, modules_dir: impl Into<String>) -> Self {
        self.modules_dir = modules_dir.into();
        self
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    pub fn max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }
}
