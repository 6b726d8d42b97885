use crate::domain::model::{GameName, ART_EXTENSIONS, IMAGE_EXTENSIONS};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]").expect("valid code pattern"));

/// 小寫副檔名（含點），沒有副檔名時為空字串
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

impl GameName {
    /// 依 POPStarter 規則從檔名推導名稱：
    /// `Crash Bandicoot [SCUS_949.00].cue` → base `SCUS_949.00`, title `Crash Bandicoot`
    pub fn from_path(path: &Path) -> Self {
        Self::from_parts(&stem_of(path), &extension_of(path))
    }

    pub fn from_parts(stem: &str, extension: &str) -> Self {
        let code = CODE_PATTERN
            .captures(stem)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string());
        let base = code.clone().unwrap_or_else(|| stem.to_string());

        let stripped = CODE_PATTERN.replace_all(stem, "");
        let title = match stripped.trim() {
            "" => base.clone(),
            t => t.to_string(),
        };

        Self {
            stem: stem.to_string(),
            extension: extension.to_lowercase(),
            code,
            base,
            title,
        }
    }

    /// 描述檔查找用的代碼（去除方括號）
    pub fn description_code(&self) -> String {
        let raw = self.code.as_deref().unwrap_or(&self.base).trim();
        raw.strip_prefix('[')
            .and_then(|s| s.strip_suffix(']'))
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| raw.to_string())
    }
}

pub fn is_image_extension(ext: &str) -> bool {
    let ext = ext.to_lowercase();
    IMAGE_EXTENSIONS.contains(&ext.as_str()) || ext == ".vcd"
}

/// 找 `<stem>.<ext>` 的同名檔，小寫副檔名優先
pub fn find_sibling(path: &Path, ext: &str) -> Option<PathBuf> {
    [ext.to_lowercase(), ext.to_uppercase()]
        .iter()
        .map(|e| path.with_extension(e))
        .find(|p| p.is_file())
}

/// 把遊戲名稱轉成單一層檔名：路徑分隔與保留字元換成 `_`，去掉前後的點與空白
pub fn safe_file_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if trimmed.is_empty() {
        "game".to_string()
    } else {
        trimmed.to_string()
    }
}

pub fn is_art_extension(ext: &str) -> bool {
    ART_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}
