use miette::Diagnostic;
use thiserror::Error;

use crate::rbac::errors::RbacError;

#[derive(Debug, Error, Diagnostic)]
pub enum AppError {
    #[error("I/O error: {0}")]
    #[diagnostic(code(dynrole::io))]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    #[diagnostic(code(dynrole::config))]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(dynrole::serde))]
    Serde(#[from] serde_json::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rbac(#[from] RbacError),

    #[error("{0}")]
    #[diagnostic(code(dynrole::other))]
    Other(String),
}
