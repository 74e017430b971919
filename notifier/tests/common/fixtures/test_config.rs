//! Test configuration builder for creating config files programmatically

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Builder for a `notifier.toml` written to a temp directory
pub struct TestConfigBuilder {
    temp_dir: TempDir,
    sections: Vec<String>,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            sections: Vec::new(),
        }
    }

    /// Append raw TOML
    pub fn with_toml(mut self, toml: &str) -> Self {
        self.sections.push(toml.to_string());
        self
    }

    pub fn build(self) -> TestConfig {
        let path = self.temp_dir.path().join("notifier.toml");
        fs::write(&path, self.sections.join("\n")).expect("Failed to write notifier.toml");
        TestConfig {
            _temp_dir: self.temp_dir,
            path,
        }
    }
}

/// Keeps the temp directory alive while the test uses the file
pub struct TestConfig {
    _temp_dir: TempDir,
    pub path: PathBuf,
}
