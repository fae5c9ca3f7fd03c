//! Rendering and writing manifest files
//!
//! Each document is rendered as block-style YAML with the license header
//! prepended verbatim.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::errors::ManifestError;
use crate::serializer::ManifestSet;

pub const METADATA_FILE: &str = "metadata.yaml";
pub const ACTIONS_FILE: &str = "actions.yaml";
pub const CONFIG_FILE: &str = "config.yaml";
pub const CHARMCRAFT_FILE: &str = "charmcraft.yaml";

/// Render one document, prefixed with `license`. A non-empty header that does
/// not end in a newline gets one.
pub fn render<T: Serialize>(document: &T, license: &str) -> Result<String, ManifestError> {
    let body = serde_yaml::to_string(document)?;
    let mut text = String::with_capacity(license.len() + body.len() + 1);
    text.push_str(license);
    if !license.is_empty() && !license.ends_with('\n') {
        text.push('\n');
    }
    text.push_str(&body);
    Ok(text)
}

impl ManifestSet {
    /// Render every document, paired with its file name.
    pub fn render(&self, license: &str) -> Result<Vec<(&'static str, String)>, ManifestError> {
        Ok(vec![
            (METADATA_FILE, render(&self.metadata, license)?),
            (ACTIONS_FILE, render(&self.actions, license)?),
            (CONFIG_FILE, render(&self.config, license)?),
            (CHARMCRAFT_FILE, render(&self.charmcraft, license)?),
        ])
    }
}

/// Write all four manifests into `root`, replacing existing files.
pub fn write_to_dir(
    set: &ManifestSet,
    root: &Path,
    license: &str,
) -> Result<Vec<PathBuf>, ManifestError> {
    fs::create_dir_all(root)?;

    let mut written = Vec::with_capacity(4);
    for (file_name, text) in set.render(license)? {
        let path = root.join(file_name);
        fs::write(&path, text)?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }

    info!(
        "Wrote {} manifests for {} to {}",
        written.len(),
        set.metadata.name,
        root.display()
    );
    Ok(written)
}

/// Parse a manifest file back into its typed form.
pub fn read_from_path<T: DeserializeOwned>(path: &Path) -> Result<T, ManifestError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_yaml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use crate::declarations::*;
    use crate::manifest_writer::*;
    use crate::serializer::{ConfigManifest, Metadata, Serializer};
    use crate::unit::UnitClass;
    use tempfile::TempDir;

    const LICENSE: &str = "# Copyright 2022 Example Ltd.\n# See LICENSE file for licensing details.\n\n";

    fn sample_set() -> ManifestSet {
        let class = UnitClass::builder("Writer")
            .name("writer")
            .attr("db", require("pgsql"))
            .attr("port", config(integer("listen port").with_default(8080)))
            .define()
            .unwrap();
        Serializer::new(&class).manifests().unwrap()
    }

    #[test]
    fn test_render_prepends_license() {
        let text = render(&sample_set().metadata, LICENSE).unwrap();
        assert!(text.starts_with(LICENSE));
        assert!(text.contains("name: writer"));
    }

    #[test]
    fn test_render_terminates_license_line() {
        let text = render(&sample_set().config, "# header").unwrap();
        assert!(text.starts_with("# header\noptions:"));
    }

    #[test]
    fn test_render_without_license() {
        let text = render(&sample_set().metadata, "").unwrap();
        assert!(text.starts_with("name: writer"));
    }

    #[test]
    fn test_write_and_read_back() {
        let temp = TempDir::new().unwrap();
        let set = sample_set();

        let written = write_to_dir(&set, temp.path(), LICENSE).unwrap();
        assert_eq!(written.len(), 4);
        for name in [METADATA_FILE, ACTIONS_FILE, CONFIG_FILE, CHARMCRAFT_FILE] {
            assert!(temp.path().join(name).is_file(), "{name} missing");
        }

        let metadata: Metadata = read_from_path(&temp.path().join(METADATA_FILE)).unwrap();
        assert_eq!(metadata, set.metadata);
        let config: ConfigManifest = read_from_path(&temp.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, set.config);
    }
}
