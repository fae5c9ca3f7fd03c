use anyhow::Context;
use charmkit_ast::DiscoveryOptions;
use charmkit_config::Config;
use clap::Args;
use std::path::PathBuf;

use crate::logger;
use crate::packaging::{self, PackageOutcome, PackageRequest};
use crate::GlobalOpts;

#[derive(Args, Debug, Clone)]
pub struct UnpackCommand {
    /// Path to a Python file defining a unit class
    pub source: PathBuf,

    /// Charm root folder (default: the configured root, or ./)
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// License text to prepend to all generated yaml files
    #[arg(long)]
    pub license: Option<String>,

    /// Overwrite an existing src/charm.py
    #[arg(long)]
    pub overwrite: bool,

    /// Semicolon-separated files and directories to copy into src/ (repeatable)
    #[arg(long, value_name = "PATHS")]
    pub include: Vec<String>,

    /// Name of the unit base class
    #[arg(long)]
    pub base_class: Option<String>,

    /// Module the unit base class is imported from
    #[arg(long)]
    pub base_module: Option<String>,
}

impl UnpackCommand {
    /// Resolve the request, filling unset options from `config`.
    pub fn request(self, config: &Config) -> anyhow::Result<PackageRequest> {
        let root = self.root.unwrap_or_else(|| config.get_root());
        let root = if root.is_absolute() {
            root
        } else {
            std::env::current_dir()
                .context("Failed to resolve the current directory")?
                .join(root)
        };

        Ok(PackageRequest {
            source: self.source,
            root,
            license: self
                .license
                .unwrap_or_else(|| config.get_license_header()),
            overwrite: self.overwrite,
            include: packaging::split_includes(&self.include),
            discovery: DiscoveryOptions {
                base_class: self.base_class.unwrap_or_else(|| config.get_base_class()),
                base_module: self
                    .base_module
                    .unwrap_or_else(|| config.get_base_module()),
            },
        })
    }
}

pub fn handle_unpack(cmd: UnpackCommand, _opts: &GlobalOpts) -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_else(|e| {
        logger::warn(&format!("Failed to load config, using defaults: {}", e));
        Config::default()
    });
    let request = cmd.request(&config)?;
    logger::debug(&format!(
        "Unpacking {} into {}",
        request.source.display(),
        request.root.display()
    ));

    let outcome = packaging::unpack(&request)
        .with_context(|| format!("Failed to unpack {}", request.source.display()))?;

    match outcome {
        PackageOutcome::Written {
            unit,
            manifests,
            charm,
            included,
        } => {
            for path in &manifests {
                logger::step(&format!("wrote {}", path.display()));
            }
            logger::step(&format!("wrote {}", charm.display()));
            for path in &included {
                logger::info(&format!("included {}", path.display()));
            }
            logger::success(&format!(
                "Unpacked {} into {}",
                unit,
                request.root.display()
            ));
        }
        PackageOutcome::Conflict(message) => logger::warn(&message),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::commands::unpack::*;

    fn command() -> UnpackCommand {
        UnpackCommand {
            source: PathBuf::from("charm.py"),
            root: Some(PathBuf::from("/srv/charm")),
            license: None,
            overwrite: false,
            include: vec!["a;b".to_string()],
            base_class: None,
            base_module: None,
        }
    }

    #[test]
    fn test_request_uses_config_defaults() {
        let mut config = Config::default();
        config.set("license-header", "# lic\n".to_string()).unwrap();
        config.set("base-class", "CharmUnit".to_string()).unwrap();

        let request = command().request(&config).unwrap();
        assert_eq!(request.root, PathBuf::from("/srv/charm"));
        assert_eq!(request.license, "# lic\n");
        assert_eq!(request.discovery.base_class, "CharmUnit");
        assert_eq!(request.discovery.base_module, "charmkit");
        assert_eq!(request.include, vec![PathBuf::from("a"), PathBuf::from("b")]);
    }

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.set("license-header", "# lic\n".to_string()).unwrap();
        let mut cmd = command();
        cmd.license = Some(String::new());
        cmd.base_module = Some("ops_kit".to_string());

        let request = cmd.request(&config).unwrap();
        assert_eq!(request.license, "");
        assert_eq!(request.discovery.base_module, "ops_kit");
    }

    #[test]
    fn test_relative_root_is_made_absolute() {
        let mut cmd = command();
        cmd.root = Some(PathBuf::from("out"));
        let request = cmd.request(&Config::default()).unwrap();
        assert!(request.root.is_absolute());
        assert!(request.root.ends_with("out"));
    }
}
