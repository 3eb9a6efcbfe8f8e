use crate::configuration::ControllerId;
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Certificate file missing for subordinate: {path:?}")]
    MissingCertificate { path: PathBuf },

    #[error("Invalid controller id: {value:?}")]
    InvalidControllerId { value: String },

    #[error("Subsubordinate {subsubordinate} refers to an unknown subordinate via id")]
    UnknownVia { subsubordinate: ControllerId },

    #[error("I/O error reading configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration document: {0}")]
    Toml(#[from] toml::de::Error),
}
