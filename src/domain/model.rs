use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

pub const POPS_ELF_NAME: &str = "POPS.ELF";
pub const POPSTARTER_ELF_NAME: &str = "POPSTARTER.ELF";
pub const BIOS_FILE_NAME: &str = "BIOS.BIN";
pub const SLOT0_VMC_NAME: &str = "SLOT0.VMC";
pub const SLOT1_VMC_NAME: &str = "SLOT1.VMC";
pub const CONF_APPS_NAME: &str = "conf_apps.cfg";

pub const POPS_DIR_NAME: &str = "POPS";
pub const ART_DIR_NAME: &str = "ART";
pub const CFG_DIR_NAME: &str = "CFG";
pub const BACKUP_DIR_NAME: &str = "backup";

pub const COPY_DIR_NAME: &str = "_copy";
pub const FIX_DIR_NAME: &str = "_pops_fix";
pub const DESCRIPTION_DIR_NAME: &str = "_description_psx";
pub const USB_INSTALL_DIR_NAME: &str = "usb_install";

/// 光碟映像副檔名（小寫，含點）
pub const IMAGE_EXTENSIONS: &[&str] = &[
    ".iso", ".bin", ".cue", ".mdf", ".ecm", ".img", ".chd", ".gdi", ".zso",
];
pub const VCD_EXTENSION: &str = ".VCD";
pub const ART_EXTENSIONS: &[&str] = &[".png", ".jpg", ".jpeg", ".bmp"];

/// 由來源檔名推導出的 POPStarter 命名
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameName {
    /// 原始檔名（不含副檔名）
    pub stem: String,
    /// 小寫副檔名，含點
    pub extension: String,
    /// 第一組方括號內的遊戲代碼，例如 SLUS_123.45
    pub code: Option<String>,
    pub base: String,
    /// conf_apps.cfg 中的鍵
    pub title: String,
}

impl GameName {
    pub fn elf_name(&self) -> String {
        format!("XX.{}.ELF", self.base)
    }

    pub fn vcd_name(&self) -> String {
        format!("{}{}", self.base, VCD_EXTENSION)
    }

    pub fn cover_name(&self, image_ext: &str) -> String {
        crate::core::art::art_file_name(&self.base, crate::core::art::ArtKind::Cover, image_ext)
    }

    pub fn logo_name(&self, image_ext: &str) -> String {
        crate::core::art::art_file_name(&self.base, crate::core::art::ArtKind::Logo, image_ext)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSource {
    pub path: PathBuf,
    #[serde(default)]
    pub cover: Option<PathBuf>,
    #[serde(default)]
    pub logo: Option<PathBuf>,
}

impl GameSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cover: None,
            logo: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstalledGame {
    pub title: String,
    pub elf_name: String,
    pub vcd_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedGame {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub total: usize,
    pub installed: Vec<InstalledGame>,
    pub failed: Vec<FailedGame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GameStatus {
    Ready,
    MissingVcd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameEntry {
    pub title: String,
    pub elf_name: String,
    pub base: String,
    pub vcd_size: Option<u64>,
    pub cover: Option<PathBuf>,
    pub logo: Option<PathBuf>,
    pub status: GameStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IssueKind {
    MissingElf,
    MissingVcd,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrityIssue {
    pub title: String,
    pub kind: IssueKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IntegrityReport {
    pub checked: usize,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn errors(&self) -> impl Iterator<Item = &IntegrityIssue> {
        self.issues.iter().filter(|i| i.kind == IssueKind::MissingElf)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsbInstallReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: Vec<FailedGame>,
}

/// 轉檔目標格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum TargetFormat {
    Chd,
    CueBin,
    Gdi,
    Iso,
    Vcd,
    Zso,
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetFormat::Chd => "chd",
            TargetFormat::CueBin => "cue-bin",
            TargetFormat::Gdi => "gdi",
            TargetFormat::Iso => "iso",
            TargetFormat::Vcd => "vcd",
            TargetFormat::Zso => "zso",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Html,
}

impl ExportFormat {
    pub fn default_file_name(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "games.csv",
            ExportFormat::Html => "games.html",
        }
    }
}
