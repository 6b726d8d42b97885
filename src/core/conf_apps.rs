use crate::domain::model::{BACKUP_DIR_NAME, CONF_APPS_NAME};
use crate::utils::error::{PopError, Result};
use crate::utils::fs::ensure_dir;
use crate::utils::validation::validate_game_title;
use std::fs;
use std::path::{Path, PathBuf};

const MASS_PREFIX: &str = "mass:/";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ConfLine {
    Entry { title: String, target: String },
    /// 無法解析的行原樣保留
    Other(String),
}

/// `conf_apps.cfg`：每行 `<title>=mass:/<elf>`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfApps {
    lines: Vec<ConfLine>,
    /// 原檔使用 CRLF 時寫回也用 CRLF
    crlf: bool,
}

impl ConfApps {
    pub fn path_in(target_dir: &Path) -> PathBuf {
        target_dir.join(CONF_APPS_NAME)
    }

    pub fn parse(content: &str) -> Self {
        let lines = content
            .lines()
            .map(|line| match line.split_once('=') {
                Some((title, target)) => ConfLine::Entry {
                    title: title.to_string(),
                    target: target.trim().to_string(),
                },
                None => ConfLine::Other(line.to_string()),
            })
            .collect();
        Self {
            lines,
            crlf: content.contains("\r\n"),
        }
    }

    /// 檔案不存在時回傳空清單
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    pub fn load_from_target(target_dir: &Path) -> Result<Self> {
        Self::load(&Self::path_in(target_dir))
    }

    pub fn render(&self) -> String {
        let newline = if self.crlf { "\r\n" } else { "\n" };
        let mut out = String::new();
        for line in &self.lines {
            match line {
                ConfLine::Entry { title, target } => {
                    out.push_str(title);
                    out.push('=');
                    out.push_str(target);
                }
                ConfLine::Other(raw) => out.push_str(raw),
            }
            out.push_str(newline);
        }
        out
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        fs::write(path, self.render())?;
        Ok(())
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.lines.iter().filter_map(|line| match line {
            ConfLine::Entry { title, target } => Some((title.as_str(), target.as_str())),
            ConfLine::Other(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, title: &str) -> bool {
        self.target_of(title).is_some()
    }

    pub fn target_of(&self, title: &str) -> Option<&str> {
        self.entries().find(|(t, _)| *t == title).map(|(_, target)| target)
    }

    /// 同名的每一行都改寫；沒有時附加在最後
    pub fn upsert(&mut self, title: &str, elf_name: &str) {
        let target = format!("{}{}", MASS_PREFIX, elf_name);
        let mut found = false;
        for line in &mut self.lines {
            if let ConfLine::Entry { title: t, target: existing } = line {
                if t == title {
                    existing.clone_from(&target);
                    found = true;
                }
            }
        }
        if found {
            return;
        }
        self.lines.push(ConfLine::Entry {
            title: title.to_string(),
            target,
        });
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        validate_game_title("new_name", new)?;
        if old != new && self.contains(new) {
            return Err(PopError::DuplicateGame {
                title: new.to_string(),
            });
        }
        for line in &mut self.lines {
            if let ConfLine::Entry { title, .. } = line {
                if title == old {
                    *title = new.to_string();
                    return Ok(());
                }
            }
        }
        Err(PopError::GameNotFound {
            title: old.to_string(),
        })
    }

    pub fn remove(&mut self, title: &str) -> bool {
        let before = self.lines.len();
        self.lines
            .retain(|line| !matches!(line, ConfLine::Entry { title: t, .. } if t == title));
        self.lines.len() != before
    }

    /// 遊戲的 ELF 基底名稱，例如 `XX.SLUS_123.45.ELF` → `SLUS_123.45`
    pub fn elf_base(&self, title: &str) -> Option<String> {
        self.target_of(title).map(elf_base_of_target)
    }
}

/// 從 `mass:/XX.<base>.ELF` 取出檔名
pub fn elf_file_of_target(target: &str) -> String {
    let path = target.trim().replacen(MASS_PREFIX, "", 1);
    Path::new(&path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or(path)
}

pub fn elf_base_of_target(target: &str) -> String {
    let elf_name = elf_file_of_target(target);
    match elf_name.strip_prefix("XX.") {
        // 去掉結尾四個字元（.ELF）
        Some(rest) => match rest.char_indices().rev().nth(3) {
            Some((cut, _)) => rest[..cut].to_string(),
            None => String::new(),
        },
        None => Path::new(&elf_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(elf_name),
    }
}

/// 修改前備份 conf_apps.cfg 到 `backup/conf_apps_<時間>.bak`
pub fn backup_conf_file(target_dir: &Path) -> Result<Option<PathBuf>> {
    let conf_file = ConfApps::path_in(target_dir);
    if !conf_file.exists() {
        return Ok(None);
    }
    let backup_dir = target_dir.join(BACKUP_DIR_NAME);
    ensure_dir(&backup_dir)?;

    let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let backup_path = backup_dir.join(format!("conf_apps_{}.bak", timestamp));
    fs::copy(&conf_file, &backup_path)?;
    tracing::debug!("💾 Backed up {} to {}", CONF_APPS_NAME, backup_path.display());
    Ok(Some(backup_path))
}

/// 備份後寫入一筆遊戲
pub fn update_conf_apps(target_dir: &Path, title: &str, elf_name: &str) -> Result<()> {
    backup_conf_file(target_dir)?;
    let path = ConfApps::path_in(target_dir);
    let mut conf = ConfApps::load(&path)?;
    conf.upsert(title, elf_name);
    conf.save(&path)
}
