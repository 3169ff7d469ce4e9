//! External tool collaborators.
//!
//! Two optional binaries can be used:
//! - `bcftools` as a range/identifier/threshold scan [`Accelerator`]
//! - `plink` as the pairwise LD [`CorrelationTool`]
//!
//! Availability is detected once into [`Capabilities`], which is passed to
//! the query planner and LD reference constructors. Running without either
//! tool is a supported configuration.

mod bcftools;
mod bim;
mod plink;

pub use bcftools::{id_match_list, Accelerator, Bcftools};
pub use bim::{bim_path, read_bim, BimRecord};
pub use plink::{parse_ld_table, CorrelationRequest, CorrelationTool, LdWindow, Plink};

use std::path::{Path, PathBuf};
use std::process::Output;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::GwasError;

/// Paths to external binaries
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolPaths {
    /// Path to bcftools
    pub bcftools: Option<PathBuf>,
    /// Path to plink (1.9)
    pub plink: Option<PathBuf>,
    /// Look tools up on `PATH` when no explicit path is given (default: true)
    pub search_path: bool,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            bcftools: None,
            plink: None,
            search_path: true,
        }
    }
}

impl ToolPaths {
    /// No external tools, pure in-process mode
    pub fn none() -> Self {
        Self {
            bcftools: None,
            plink: None,
            search_path: false,
        }
    }
}

/// Which collaborators are usable on this host
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Resolved bcftools binary
    pub bcftools: Option<PathBuf>,
    /// Resolved plink binary
    pub plink: Option<PathBuf>,
    /// Whether delegated scans may be used
    pub accelerator_available: bool,
    /// Whether pairwise LD can be computed
    pub correlation_available: bool,
}

impl Capabilities {
    /// Resolve configured tools against the filesystem and `PATH`
    pub fn detect(paths: &ToolPaths) -> Self {
        let bcftools = resolve_tool(paths.bcftools.as_deref(), "bcftools", paths.search_path);
        let plink = resolve_tool(paths.plink.as_deref(), "plink", paths.search_path);

        // bcftools is not supported on Windows
        let accelerator_available = bcftools.is_some() && !cfg!(windows);
        let correlation_available = plink.is_some();

        debug!(
            "Detected tools: bcftools={:?} (usable: {}), plink={:?}",
            bcftools, accelerator_available, plink
        );

        Self {
            bcftools,
            plink,
            accelerator_available,
            correlation_available,
        }
    }

    /// No collaborators at all
    pub fn none() -> Self {
        Self::default()
    }

    /// The accelerator, if usable
    pub fn accelerator(&self) -> Option<Bcftools> {
        if !self.accelerator_available {
            return None;
        }
        self.bcftools.clone().map(Bcftools::new)
    }

    /// The correlation tool, if usable
    pub fn correlation_tool(&self) -> Option<Plink> {
        if !self.correlation_available {
            return None;
        }
        self.plink.clone().map(Plink::new)
    }
}

/// Resolve a tool from an explicit path or by searching `PATH`
pub fn resolve_tool(explicit: Option<&Path>, name: &str, search_path: bool) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.is_file().then(|| path.to_path_buf());
    }
    if !search_path {
        return None;
    }
    let path_var = std::env::var_os("PATH")?;
    let candidates: Vec<String> = if cfg!(windows) {
        vec![format!("{}.exe", name), name.to_string()]
    } else {
        vec![name.to_string()]
    };
    std::env::split_paths(&path_var)
        .flat_map(|dir| candidates.iter().map(move |c| dir.join(c)))
        .find(|p| p.is_file())
}

/// Map a finished subprocess to its stdout or a delegation error
pub(crate) fn check_output(tool: &str, output: Output) -> Result<Vec<u8>, GwasError> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(GwasError::delegation(
            tool,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }
    Ok(output.stdout)
}
