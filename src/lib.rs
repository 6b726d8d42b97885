pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use config::{cli::LocalStorage, PopConfig};

#[cfg(feature = "cli")]
pub use config::CliConfig;

pub use core::{
    engine::InstallEngine, install::PopsInstaller, library::Library, tools::ProcessRunner,
    tools::Toolchain, transcode::Transcoder,
};
pub use utils::error::{PopError, Result};
