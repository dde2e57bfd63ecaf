//! Reads the config file from disk. The "thin shell" spec.md §1 names
//! out of scope: `std::fs::read_to_string` plus `serde_json::from_str`,
//! errors routed through [`CrawlError`] rather than a raw `io::Error`
//! so the CLI gets one uniform diagnostic type.

use std::path::Path;

use crawlforge_types::{CrawlError, Result};

use crate::document::ConfigDocument;

pub fn load_config_file(path: impl AsRef<Path>) -> Result<ConfigDocument> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|e| {
        CrawlError::configuration(format!(
            "failed to load the config file {}: {e}",
            path.display()
        ))
    })?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;
    ConfigDocument::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = load_config_file("/nonexistent/path/config.json").unwrap_err();
        assert!(matches!(err, CrawlError::Configuration(_)));
    }

    #[test]
    fn malformed_json_surfaces_as_json_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_config_file(file.path()).unwrap_err();
        assert!(matches!(err, CrawlError::Json(_)));
    }
}
