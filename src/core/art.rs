use crate::core::naming::{extension_of, is_art_extension};
use crate::domain::model::{ART_DIR_NAME, ART_EXTENSIONS};
use crate::utils::error::{PopError, Result};
use crate::utils::fs::ensure_dir;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtKind {
    Cover,
    Logo,
}

impl ArtKind {
    pub const ALL: [ArtKind; 2] = [ArtKind::Cover, ArtKind::Logo];

    fn suffix(&self) -> &'static str {
        match self {
            ArtKind::Cover => "ELF_COV",
            ArtKind::Logo => "ELF_LGO",
        }
    }
}

/// `XX.<base>.ELF_COV.png` / `XX.<base>.ELF_LGO.png`
pub fn art_file_name(base: &str, kind: ArtKind, image_ext: &str) -> String {
    format!("XX.{}.{}{}", base, kind.suffix(), image_ext)
}

/// 把圖片複製到 `ART/`，副檔名統一為小寫
pub fn save_art(target_dir: &Path, base: &str, kind: ArtKind, image: &Path) -> Result<PathBuf> {
    if !image.is_file() {
        return Err(PopError::FileNotFound {
            path: image.to_path_buf(),
        });
    }
    let ext = extension_of(image);
    if !is_art_extension(&ext) {
        return Err(PopError::UnsupportedFormat { extension: ext });
    }

    let art_dir = target_dir.join(ART_DIR_NAME);
    ensure_dir(&art_dir)?;
    let dest = art_dir.join(art_file_name(base, kind, &ext));
    fs::copy(image, &dest)?;
    Ok(dest)
}

/// 第一個存在的圖片（依 ART_EXTENSIONS 順序）
pub fn find_art(target_dir: &Path, base: &str, kind: ArtKind) -> Option<PathBuf> {
    let art_dir = target_dir.join(ART_DIR_NAME);
    ART_EXTENSIONS
        .iter()
        .map(|ext| art_dir.join(art_file_name(base, kind, ext)))
        .find(|p| p.is_file())
}

/// 刪除遊戲的所有封面與標誌，回傳刪除數量
pub fn remove_art(target_dir: &Path, base: &str) -> Result<usize> {
    let art_dir = target_dir.join(ART_DIR_NAME);
    let mut removed = 0;
    for kind in ArtKind::ALL {
        for ext in ART_EXTENSIONS {
            let path = art_dir.join(art_file_name(base, kind, ext));
            if path.is_file() {
                fs::remove_file(&path)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// 在資料夾中找檔名（不含副檔名）等於來源檔名或遊戲代碼的圖片，不分大小寫
pub fn match_art(dir: &Path, stem: &str, code: Option<&str>) -> Option<PathBuf> {
    let wanted: Vec<String> = std::iter::once(stem)
        .chain(code)
        .map(str::to_lowercase)
        .collect();
    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_art_extension(&extension_of(p)))
        .collect();
    candidates.sort();
    candidates.into_iter().find(|p| {
        p.file_stem()
            .map(|s| wanted.contains(&s.to_string_lossy().to_lowercase()))
            .unwrap_or(false)
    })
}
