//! Configuration file support for ferro-gwas.
//!
//! Configuration carries external tool paths, proxy defaults and query
//! limits. It is an explicit value handed to constructors; nothing here is
//! process-global.
//!
//! # Example Configuration
//!
//! ```toml
//! [tools]
//! bcftools = "/opt/bcftools/bin/bcftools"
//! search_path = true
//!
//! [proxy]
//! mode = "yes"
//! min_r2 = 0.8
//! tie_break = "reported-order"
//! window_kb = 5000
//!
//! [query]
//! max_records = 1000000
//! timeout = 600
//! ```
//!
//! # Config File Locations
//!
//! Configuration is searched in this order (first found wins):
//! 1. `.ferro-gwas.toml` in current directory
//! 2. `~/.config/ferro-gwas/config.toml`
//!
//! CLI flags take precedence over config file settings.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::GwasError;
use crate::external::ToolPaths;
use crate::proxy::{ProxyMode, ProxyOptions, TieBreak};
use crate::query::QueryBudget;

/// File name looked up in the working directory
pub const LOCAL_CONFIG: &str = ".ferro-gwas.toml";

/// Parsed configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FerroGwasConfig {
    /// External binaries
    pub tools: ToolPaths,
    /// Proxy resolution defaults
    pub proxy: ProxySettings,
    /// Query limits
    pub query: QueryBudget,
}

/// Proxy section of the config file
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ProxySettings {
    pub mode: ProxyMode,
    pub min_r2: f64,
    pub tie_break: TieBreak,
    /// Maximum distance between a variant and its proxy, in kb
    pub window_kb: u64,
    /// Maximum number of variants between a variant and its proxy
    pub window_variants: u64,
    /// Threads for the correlation tool
    pub threads: usize,
}

impl Default for ProxySettings {
    fn default() -> Self {
        let options = ProxyOptions::default();
        Self {
            mode: options.mode,
            min_r2: options.min_r2,
            tie_break: options.tie_break,
            window_kb: 5000,
            window_variants: 5000,
            threads: 1,
        }
    }
}

impl ProxySettings {
    /// Resolver options from these settings
    pub fn options(&self) -> ProxyOptions {
        ProxyOptions::default()
            .with_mode(self.mode)
            .with_min_r2(self.min_r2)
            .with_tie_break(self.tie_break)
    }
}

impl FerroGwasConfig {
    /// Load configuration from the default locations.
    ///
    /// Returns the default configuration when no file is found. A file that
    /// exists but does not parse is reported and skipped.
    pub fn load() -> Self {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG)];
        if let Some(home) = dirs_home() {
            candidates.push(home.join(".config").join("ferro-gwas").join("config.toml"));
        }

        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from_path(&path) {
                Ok(config) => {
                    debug!("Loaded configuration from {}", path.display());
                    return config;
                }
                Err(e) => warn!("Ignoring configuration {}: {}", path.display(), e),
            }
        }
        Self::default()
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self, GwasError> {
        let content = fs::read_to_string(path).map_err(|e| {
            GwasError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML content.
    pub fn parse(content: &str) -> Result<Self, GwasError> {
        let config: FerroGwasConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), GwasError> {
        if !(0.0..=1.0).contains(&self.proxy.min_r2) {
            return Err(GwasError::configuration(format!(
                "proxy.min_r2 must be within [0, 1], got {}",
                self.proxy.min_r2
            )));
        }
        if self.proxy.window_kb == 0 || self.proxy.window_variants == 0 {
            return Err(GwasError::configuration(
                "proxy window must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize to TOML
    pub fn to_toml_string(&self) -> Result<String, GwasError> {
        toml::to_string_pretty(self)
            .map_err(|e| GwasError::configuration(format!("cannot serialize config: {}", e)))
    }

    /// Write to a file
    pub fn to_file(&self, path: &Path) -> Result<(), GwasError> {
        fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    /// Sample configuration printed by `ferro-gwas config`
    pub fn sample() -> String {
        r#"# ferro-gwas configuration
# Place in .ferro-gwas.toml or ~/.config/ferro-gwas/config.toml

[tools]
# bcftools = "/usr/local/bin/bcftools"
# plink = "/usr/local/bin/plink"
search_path = true

[proxy]
mode = "yes"            # yes | only
min_r2 = 0.6
tie_break = "reported-order"
window_kb = 5000
window_variants = 5000
threads = 1

[query]
# max_records = 1000000
# timeout = 600         # seconds
"#
        .to_string()
    }
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_parse_empty() {
        let config = FerroGwasConfig::parse("").unwrap();
        assert_eq!(config, FerroGwasConfig::default());
        assert!(config.tools.search_path);
        assert_eq!(config.proxy.min_r2, 0.6);
    }

    #[test]
    fn test_parse_sections() {
        let content = r#"
[tools]
plink = "/opt/plink"
search_path = false

[proxy]
mode = "only"
min_r2 = 0.9
tie_break = "identifier"

[query]
max_records = 10
timeout = 1.5
"#;
        let config = FerroGwasConfig::parse(content).unwrap();
        assert_eq!(config.tools.plink, Some(PathBuf::from("/opt/plink")));
        assert!(!config.tools.search_path);
        assert_eq!(config.proxy.mode, ProxyMode::Only);
        assert_eq!(config.proxy.tie_break, TieBreak::Identifier);
        assert_eq!(config.proxy.window_kb, 5000);
        assert_eq!(config.query.max_records, Some(10));
        assert_eq!(config.query.timeout, Some(Duration::from_millis(1500)));

        let options = config.proxy.options();
        assert_eq!(options.mode, ProxyMode::Only);
        assert_eq!(options.min_r2, 0.9);
    }

    #[test]
    fn test_sample_parses() {
        let config = FerroGwasConfig::parse(&FerroGwasConfig::sample()).unwrap();
        assert_eq!(config.proxy, ProxySettings::default());
        assert_eq!(config.query, QueryBudget::unlimited());
    }

    #[test]
    fn test_invalid_values() {
        let err = FerroGwasConfig::parse("[proxy]\nmin_r2 = 1.5\n").unwrap_err();
        assert!(matches!(err, GwasError::Configuration { .. }));

        let err = FerroGwasConfig::parse("[proxy]\nmode = \"maybe\"\n").unwrap_err();
        assert!(matches!(err, GwasError::Configuration { .. }));
    }

    #[test]
    fn test_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = FerroGwasConfig::default();
        config.proxy.threads = 8;
        config.query = QueryBudget::unlimited().with_max_records(5);
        config.to_file(&path).unwrap();
        assert_eq!(FerroGwasConfig::load_from_path(&path).unwrap(), config);
    }

    #[test]
    fn test_missing_file() {
        let err = FerroGwasConfig::load_from_path(Path::new("/nonexistent/ferro.toml")).unwrap_err();
        assert!(matches!(err, GwasError::Configuration { .. }));
    }
}
