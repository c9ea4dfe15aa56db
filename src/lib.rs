pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::cli::LocalStorage;
pub use config::toml_config::CertConfig;

#[cfg(feature = "cli")]
pub use config::{Cli, Command};

pub use core::pipeline::{CertificatePipeline, RunInputs};
pub use utils::error::{CertError, Result};
