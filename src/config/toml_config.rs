use crate::domain::model::GameSource;
use crate::utils::error::{PopError, Result};
use crate::utils::validation::{validate_non_empty_string, validate_path, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static ENV_VAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// 替換環境變數 (例如 ${PS2_USB})，未定義的變數保持原樣
pub fn substitute_env_vars(content: &str) -> String {
    ENV_VAR_PATTERN
        .replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .into_owned()
}

fn parse_toml<T: serde::de::DeserializeOwned>(content: &str, field: &str) -> Result<T> {
    let processed = substitute_env_vars(content);
    toml::from_str(&processed).map_err(|e| PopError::ConfigValidationError {
        field: field.to_string(),
        message: format!("TOML parsing error: {}", e),
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolsSection {
    pub dir: Option<PathBuf>,
    pub bios: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibrarySection {
    pub target: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSection {
    pub file: Option<PathBuf>,
    pub level: Option<String>,
}

/// `popcraft.toml`：所有欄位皆可省略，命令列參數優先
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default)]
    pub logging: LoggingSection,
}

pub const DEFAULT_SETTINGS_FILE: &str = "popcraft.toml";
const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_toml(content, "settings")
    }

    /// 指定檔案必須存在；未指定時讀取工作目錄的 popcraft.toml（若有）
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let default = Path::new(DEFAULT_SETTINGS_FILE);
                if default.is_file() {
                    tracing::debug!("Using settings from {}", default.display());
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }
}

impl Validate for Settings {
    fn validate(&self) -> Result<()> {
        if let Some(dir) = &self.tools.dir {
            validate_path("tools.dir", &dir.to_string_lossy())?;
        }
        if let Some(bios) = &self.tools.bios {
            validate_non_empty_string("tools.bios", bios)?;
        }
        if let Some(target) = &self.library.target {
            validate_path("library.target", &target.to_string_lossy())?;
        }
        if let Some(level) = &self.logging.level {
            crate::utils::validation::validate_one_of(
                "logging.level",
                &level.to_lowercase(),
                &LOG_LEVELS,
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSection {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsbSection {
    pub destination: PathBuf,
}

/// `popcraft-batch` 的工作檔
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchJob {
    pub job: JobSection,
    #[serde(default)]
    pub tools: ToolsSection,
    pub target: TargetSection,
    #[serde(default)]
    pub games: Vec<GameSource>,
    pub usb: Option<UsbSection>,
}

impl BatchJob {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        parse_toml(content, "job")
    }
}

impl Validate for BatchJob {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("job.name", &self.job.name)?;
        validate_path("target.dir", &self.target.dir.to_string_lossy())?;
        if let Some(dir) = &self.tools.dir {
            validate_path("tools.dir", &dir.to_string_lossy())?;
        }
        if self.games.is_empty() && self.usb.is_none() {
            return Err(PopError::ConfigValidationError {
                field: "games".to_string(),
                message: "Job has no [[games]] and no [usb] section".to_string(),
            });
        }
        for (i, game) in self.games.iter().enumerate() {
            validate_path(&format!("games[{}].path", i), &game.path.to_string_lossy())?;
        }
        if let Some(usb) = &self.usb {
            validate_path("usb.destination", &usb.destination.to_string_lossy())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_settings_with_defaults() {
        let settings = Settings::from_toml_str(
            r#"
[tools]
dir = "/opt/popcraft"

[logging]
level = "debug"
"#,
        )
        .unwrap();

        assert_eq!(settings.tools.dir, Some(PathBuf::from("/opt/popcraft")));
        assert_eq!(settings.tools.bios, None);
        assert_eq!(settings.library.target, None);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let settings = Settings::from_toml_str("[logging]\nlevel = \"loud\"\n").unwrap();
        assert!(matches!(
            settings.validate(),
            Err(PopError::InvalidConfigValueError { .. })
        ));
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("POPCRAFT_TEST_USB", "/media/usb");

        let job = BatchJob::from_toml_str(
            r#"
[job]
name = "weekend"

[target]
dir = "${POPCRAFT_TEST_USB}"

[[games]]
path = "/games/Spyro [SCUS_944.26].cue"
cover = "/covers/spyro.png"

[[games]]
path = "/games/Tekken 3.chd"
"#,
        )
        .unwrap();

        assert_eq!(job.target.dir, PathBuf::from("/media/usb"));
        assert_eq!(job.games.len(), 2);
        assert_eq!(job.games[0].cover, Some(PathBuf::from("/covers/spyro.png")));
        assert_eq!(job.games[1].logo, None);
        assert!(job.validate().is_ok());

        std::env::remove_var("POPCRAFT_TEST_USB");
    }

    #[test]
    fn test_unknown_env_var_is_kept() {
        assert_eq!(
            substitute_env_vars("dir = \"${POPCRAFT_SURELY_UNSET}\""),
            "dir = \"${POPCRAFT_SURELY_UNSET}\""
        );
    }

    #[test]
    fn test_job_without_work_is_rejected() {
        let job = BatchJob::from_toml_str("[job]\nname = \"empty\"\n[target]\ndir = \"/tmp/x\"\n").unwrap();
        assert!(job.validate().is_err());
    }

    #[test]
    fn test_job_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[job]\nname = \"usb only\"\n[target]\ndir = \"/t\"\n[usb]\ndestination = \"/mnt/usb\"\n")
            .unwrap();

        let job = BatchJob::from_file(temp_file.path()).unwrap();
        assert_eq!(job.job.name, "usb only");
        assert_eq!(job.usb.unwrap().destination, PathBuf::from("/mnt/usb"));
    }

    #[test]
    fn test_broken_toml() {
        assert!(matches!(
            Settings::from_toml_str("[tools\n"),
            Err(PopError::ConfigValidationError { .. })
        ));
    }
}
