pub mod art;
pub mod conf_apps;
pub mod engine;
pub mod export;
pub mod install;
pub mod library;
pub mod naming;
pub mod tools;
pub mod transcode;
pub mod usb;

pub use crate::domain::model::{GameName, GameSource, InstallReport};
pub use crate::domain::ports::{ConfigProvider, Installer, Storage, ToolRunner};
pub use crate::utils::error::Result;
