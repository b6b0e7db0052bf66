use std::path::Path;

use crate::config::schema::ArchiveOptions;
use crate::error::{ArchiveError, Result};

/// Read archive options from a TOML file.
pub fn load_options(path: &Path) -> Result<ArchiveOptions> {
    let toml_content = std::fs::read_to_string(path).map_err(|e| {
        ArchiveError::Config(format!(
            "Failed to read options file {}: {}",
            path.display(),
            e
        ))
    })?;

    toml::from_str(&toml_content).map_err(|e| {
        ArchiveError::Config(format!(
            "Failed to parse options file {}: {}",
            path.display(),
            e
        ))
    })
}
