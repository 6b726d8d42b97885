pub mod cli;
pub mod toml_config;

use crate::core::install::find_bios_files;
use crate::core::ConfigProvider;
use crate::utils::error::{PopError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, Validate};
use std::path::{Path, PathBuf};
use toml_config::ToolsSection;

#[cfg(feature = "cli")]
use toml_config::Settings;
#[cfg(feature = "cli")]
use crate::core::library::ExtractFormat;
#[cfg(feature = "cli")]
use crate::domain::model::{ExportFormat, TargetFormat};
#[cfg(feature = "cli")]
use crate::utils::logger::LogFormat;
#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};

pub const DEFAULT_LOG_FILE: &str = "logs/popcraft.log";

/// 預設工具資料夾：執行檔所在目錄
pub fn default_tools_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// 合併命令列與設定檔之後的執行設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopConfig {
    pub tools_dir: PathBuf,
    pub bios: String,
    pub target: Option<PathBuf>,
}

impl PopConfig {
    /// 未指定 BIOS 時使用工具資料夾中找到的第一個
    pub fn new(tools_dir: Option<PathBuf>, bios: Option<String>, target: Option<PathBuf>) -> Self {
        let tools_dir = tools_dir.unwrap_or_else(default_tools_dir);
        let bios = bios.unwrap_or_else(|| {
            find_bios_files(&tools_dir)
                .into_iter()
                .next()
                .unwrap_or_else(|| crate::domain::model::BIOS_FILE_NAME.to_string())
        });
        Self {
            tools_dir,
            bios,
            target,
        }
    }

    pub fn from_tools_section(tools: &ToolsSection, target: Option<PathBuf>) -> Self {
        Self::new(tools.dir.clone(), tools.bios.clone(), target)
    }

    pub fn target_dir(&self) -> Result<&Path> {
        self.target
            .as_deref()
            .ok_or_else(|| PopError::MissingConfigError {
                field: "target".to_string(),
            })
    }
}

impl ConfigProvider for PopConfig {
    fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    fn bios_name(&self) -> &str {
        &self.bios
    }
}

impl Validate for PopConfig {
    fn validate(&self) -> Result<()> {
        validate_path("tools_dir", &self.tools_dir.to_string_lossy())?;
        validate_non_empty_string("bios", &self.bios)?;
        if let Some(target) = &self.target {
            validate_path("target", &target.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Parser)]
#[command(name = "popcraft")]
#[command(about = "Install and manage PS1 games for POPStarter", version)]
pub struct CliConfig {
    /// Folder with POPS.ELF, BIOS, VMC files and the conversion tools
    #[arg(long, global = true)]
    pub tools_dir: Option<PathBuf>,

    /// Target (USB/HDD root) that holds conf_apps.cfg and POPS/
    #[arg(long, global = true)]
    pub target: Option<PathBuf>,

    /// Settings file (default: ./popcraft.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// BIOS file name inside the tools folder
    #[arg(long, global = true)]
    pub bios: Option<String>,

    #[arg(long, short, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, value_enum, global = true, default_value_t = LogFormat::Compact)]
    pub log_format: LogFormat,

    /// Log file, truncated on start; pass '' to disable
    #[arg(long, global = true)]
    pub log_file: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Convert and install disc images (files or folders)
    Install {
        #[arg(required = true)]
        sources: Vec<PathBuf>,
        /// Cover image for a single game
        #[arg(long)]
        cover: Option<PathBuf>,
        /// Logo image for a single game
        #[arg(long)]
        logo: Option<PathBuf>,
        /// Folder of covers matched by file name or game code
        #[arg(long)]
        covers: Option<PathBuf>,
        /// Folder of logos matched by file name or game code
        #[arg(long)]
        logos: Option<PathBuf>,
    },
    /// List installed games
    List {
        filter: Option<String>,
        #[arg(long)]
        json: bool,
    },
    Rename {
        old: String,
        new: String,
    },
    Delete {
        title: String,
    },
    /// Remove every installed game
    DeleteAll {
        #[arg(long)]
        yes: bool,
    },
    Cover {
        title: String,
        image: PathBuf,
    },
    Logo {
        title: String,
        image: PathBuf,
    },
    /// Check launchers and VCD files of every entry
    Verify,
    Export {
        #[arg(long, value_enum, default_value_t = ExportFormat::Csv)]
        format: ExportFormat,
        #[arg(long, default_value = ".")]
        output: PathBuf,
        #[arg(long)]
        file: Option<String>,
    },
    /// Back up conf_apps.cfg now
    Backup,
    /// Convert an installed game back to CUE+BIN or ISO
    Extract {
        title: String,
        #[arg(long, value_enum)]
        format: ExtractFormat,
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// Convert between image formats
    Transcode {
        input: PathBuf,
        #[arg(long, value_enum)]
        to: TargetFormat,
        /// Output folder (default: next to the input)
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Copy usb_install/ into a drive
    UsbInstall {
        destination: PathBuf,
    },
    /// List BIOS files found in the tools folder
    Bios,
    /// Report which resources and tools are present
    Doctor,
}

#[cfg(feature = "cli")]
impl CliConfig {
    /// 命令列優先，其次設定檔
    pub fn resolve(&self, settings: &Settings) -> PopConfig {
        PopConfig::new(
            self.tools_dir.clone().or_else(|| settings.tools.dir.clone()),
            self.bios.clone().or_else(|| settings.tools.bios.clone()),
            self.target.clone().or_else(|| settings.library.target.clone()),
        )
    }

    /// 空字串代表停用日誌檔
    pub fn log_file(&self, settings: &Settings) -> Option<PathBuf> {
        let path = self
            .log_file
            .as_ref()
            .map(PathBuf::from)
            .or_else(|| settings.logging.file.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
        non_empty_path(Some(path))
    }
}

/// 空路徑視為未設定
pub fn non_empty_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty())
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.tools_dir {
            validate_path("tools_dir", &dir.to_string_lossy())?;
        }
        if let Some(bios) = &self.bios {
            validate_non_empty_string("bios", bios)?;
        }
        match &self.command {
            Command::Rename { new, .. } => {
                crate::utils::validation::validate_game_title("new", new)?;
            }
            Command::Install { sources, cover, logo, .. } => {
                if sources.len() > 1 && (cover.is_some() || logo.is_some()) {
                    return Err(PopError::ConfigValidationError {
                        field: "cover".to_string(),
                        message: "--cover/--logo need a single source; use --covers/--logos"
                            .to_string(),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }
}
