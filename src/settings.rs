use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::errors::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    pub policies: Policies,
    pub reconcile: Reconcile,
    pub logging: Logging,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policies {
    /// Directory of `.kdl` manifests. Default: policies
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reconcile {
    /// Value of the `managed-by` annotation on every computed role
    pub managed_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Logging {
    /// Filter used when RUST_LOG is not set
    pub filter: String,
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("policies"),
        }
    }
}

impl Default for Reconcile {
    fn default() -> Self {
        Self {
            managed_by: "dynrole".to_string(),
        }
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl Settings {
    pub fn load(path: &str) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .set_default(
                "policies.dir",
                Policies::default().dir.to_string_lossy().to_string(),
            )?
            .set_default("reconcile.managed_by", Reconcile::default().managed_by)?
            .set_default("logging.filter", Logging::default().filter)?;

        // Optional file
        if Path::new(path).exists() {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Environment overrides: DYNROLE__RECONCILE__MANAGED_BY=ops, etc.
        builder = builder.add_source(config::Environment::with_prefix("DYNROLE").separator("__"));

        let cfg = builder.build()?;
        let mut s: Settings = cfg.try_deserialize()?;

        // Normalize policies dir to be relative to current dir
        if s.policies.dir.is_relative() {
            s.policies.dir = std::env::current_dir()?.join(&s.policies.dir);
        }

        Ok(s)
    }
}
