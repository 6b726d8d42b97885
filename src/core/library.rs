use crate::core::art::{find_art, remove_art, save_art, ArtKind};
use crate::core::conf_apps::{backup_conf_file, elf_base_of_target, elf_file_of_target, ConfApps};
use crate::core::naming::{is_image_extension, safe_file_name};
use crate::core::tools::Toolchain;
use crate::domain::model::{
    GameEntry, GameStatus, IntegrityIssue, IntegrityReport, IssueKind, ART_DIR_NAME,
    IMAGE_EXTENSIONS, POPSTARTER_ELF_NAME, POPS_DIR_NAME, POPS_ELF_NAME, VCD_EXTENSION,
};
use crate::domain::ports::ToolRunner;
use crate::utils::disk::{disk_usage, DiskUsage};
use crate::utils::error::{PopError, Result};
use crate::utils::fs::{ensure_dir, is_same_file};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// 從已安裝的 VCD 匯出的格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "kebab-case")]
pub enum ExtractFormat {
    CueBin,
    Iso,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeleteAllStats {
    pub folders: usize,
    pub images: usize,
    pub art: usize,
    pub launchers: usize,
}

/// 目標資料夾中已安裝的遊戲
pub struct Library<R: ToolRunner> {
    target_dir: PathBuf,
    toolchain: Toolchain<R>,
}

impl<R: ToolRunner> Library<R> {
    pub fn new(target_dir: impl Into<PathBuf>, toolchain: Toolchain<R>) -> Self {
        Self {
            target_dir: target_dir.into(),
            toolchain,
        }
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    fn pops_dir(&self) -> PathBuf {
        self.target_dir.join(POPS_DIR_NAME)
    }

    fn vcd_path(&self, base: &str) -> PathBuf {
        self.pops_dir().join(format!("{}{}", base, VCD_EXTENSION))
    }

    fn conf(&self) -> Result<ConfApps> {
        ConfApps::load_from_target(&self.target_dir)
    }

    fn save_conf(&self, conf: &ConfApps) -> Result<()> {
        conf.save(&ConfApps::path_in(&self.target_dir))
    }

    fn base_of(&self, conf: &ConfApps, title: &str) -> Result<String> {
        conf.elf_base(title).ok_or_else(|| PopError::GameNotFound {
            title: title.to_string(),
        })
    }

    /// 列出有映像檔的遊戲，依標題排序（不分大小寫）；
    /// `filter` 同時比對標題與基底名稱
    pub fn games(&self, filter: Option<&str>) -> Result<Vec<GameEntry>> {
        let conf = self.conf()?;
        let pops_dir = self.pops_dir();
        let needle = filter.map(str::to_lowercase).filter(|f| !f.is_empty());

        let mut games = Vec::new();
        for (title, target) in conf.entries() {
            let base = elf_base_of_target(target);
            if base.is_empty() {
                continue;
            }

            let vcd = self.vcd_path(&base);
            let vcd_size = fs::metadata(&vcd).ok().filter(|m| m.is_file()).map(|m| m.len());
            let has_other_image = IMAGE_EXTENSIONS
                .iter()
                .any(|ext| pops_dir.join(format!("{}{}", base, ext)).is_file());
            if vcd_size.is_none() && !has_other_image {
                continue;
            }

            if let Some(needle) = &needle {
                if !title.to_lowercase().contains(needle) && !base.to_lowercase().contains(needle) {
                    continue;
                }
            }

            games.push(GameEntry {
                title: title.to_string(),
                elf_name: elf_file_of_target(target),
                cover: find_art(&self.target_dir, &base, ArtKind::Cover),
                logo: find_art(&self.target_dir, &base, ArtKind::Logo),
                status: if vcd_size.is_some() {
                    GameStatus::Ready
                } else {
                    GameStatus::MissingVcd
                },
                vcd_size,
                base,
            });
        }

        games.sort_by_key(|g| g.title.to_lowercase());
        Ok(games)
    }

    pub fn rename(&self, old: &str, new: &str) -> Result<()> {
        let mut conf = self.conf()?;
        if !conf.contains(old) {
            return Err(PopError::GameNotFound {
                title: old.to_string(),
            });
        }
        backup_conf_file(&self.target_dir)?;
        conf.rename(old, new)?;
        self.save_conf(&conf)?;
        tracing::info!("✏️ Renamed '{}' → '{}'", old, new);
        Ok(())
    }

    /// 刪除存檔資料夾、啟動 ELF、映像、封面與標誌，最後移除設定項目
    pub fn delete(&self, title: &str) -> Result<()> {
        let mut conf = self.conf()?;
        let target = conf
            .target_of(title)
            .map(str::to_string)
            .ok_or_else(|| PopError::GameNotFound {
                title: title.to_string(),
            })?;
        let base = elf_base_of_target(&target);
        backup_conf_file(&self.target_dir)?;

        if !base.is_empty() {
            let pops_dir = self.pops_dir();
            let save_folder = pops_dir.join(&base);
            if save_folder.is_dir() {
                fs::remove_dir_all(&save_folder)?;
            }

            let launcher = self.target_dir.join(elf_file_of_target(&target));
            if launcher.is_file() {
                fs::remove_file(&launcher)?;
            }

            for ext in IMAGE_EXTENSIONS.iter().copied().chain([VCD_EXTENSION]) {
                let image = pops_dir.join(format!("{}{}", base, ext));
                if image.is_file() {
                    fs::remove_file(&image)?;
                }
            }

            let removed_art = remove_art(&self.target_dir, &base)?;
            tracing::debug!("Removed {} art files for {}", removed_art, base);
        }

        conf.remove(title);
        self.save_conf(&conf)?;
        tracing::info!("🗑️ Deleted '{}'", title);
        Ok(())
    }

    /// 清空整個遊戲庫（保留 POPSTARTER.ELF 與 POPS.ELF）
    pub fn delete_all(&self) -> Result<DeleteAllStats> {
        backup_conf_file(&self.target_dir)?;
        let mut stats = DeleteAllStats::default();

        let pops_dir = self.pops_dir();
        if pops_dir.is_dir() {
            for entry in fs::read_dir(&pops_dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    fs::remove_dir_all(&path)?;
                    stats.folders += 1;
                } else if is_installed_image(&path) {
                    fs::remove_file(&path)?;
                    stats.images += 1;
                }
            }
        }

        let art_dir = self.target_dir.join(ART_DIR_NAME);
        if art_dir.is_dir() {
            for entry in fs::read_dir(&art_dir)? {
                let path = entry?.path();
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let is_art = name.starts_with("XX.")
                    && (name.contains(".ELF_COV") || name.contains(".ELF_LGO"));
                if is_art && path.is_file() {
                    fs::remove_file(&path)?;
                    stats.art += 1;
                }
            }
        }

        for entry in fs::read_dir(&self.target_dir)? {
            let path = entry?.path();
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if path.is_file()
                && name.ends_with(".ELF")
                && name != POPSTARTER_ELF_NAME
                && name != POPS_ELF_NAME
            {
                fs::remove_file(&path)?;
                stats.launchers += 1;
            }
        }

        let conf_path = ConfApps::path_in(&self.target_dir);
        if conf_path.exists() {
            fs::remove_file(&conf_path)?;
        }

        tracing::info!(
            "🗑️ All games removed ({} folders, {} images, {} art, {} launchers)",
            stats.folders,
            stats.images,
            stats.art,
            stats.launchers
        );
        Ok(stats)
    }

    pub fn set_cover(&self, title: &str, image: &Path) -> Result<PathBuf> {
        self.set_art(title, ArtKind::Cover, image)
    }

    pub fn set_logo(&self, title: &str, image: &Path) -> Result<PathBuf> {
        self.set_art(title, ArtKind::Logo, image)
    }

    fn set_art(&self, title: &str, kind: ArtKind, image: &Path) -> Result<PathBuf> {
        let conf = self.conf()?;
        let base = self.base_of(&conf, title)?;
        let saved = save_art(&self.target_dir, &base, kind, image)?;
        tracing::info!("🖼️ {:?} for '{}' saved to {}", kind, title, saved.display());
        Ok(saved)
    }

    /// 缺少啟動 ELF 為錯誤，缺少 VCD 為警告
    pub fn verify(&self) -> Result<IntegrityReport> {
        let conf_path = ConfApps::path_in(&self.target_dir);
        if !conf_path.exists() {
            return Err(PopError::EmptyLibrary {
                path: self.target_dir.clone(),
            });
        }
        let conf = ConfApps::load(&conf_path)?;

        let mut report = IntegrityReport::default();
        for (title, target) in conf.entries() {
            report.checked += 1;

            let launcher = self.target_dir.join(elf_file_of_target(target));
            if !launcher.is_file() {
                tracing::error!("❌ Missing ELF: {}", launcher.display());
                report.issues.push(IntegrityIssue {
                    title: title.to_string(),
                    kind: IssueKind::MissingElf,
                    path: launcher,
                });
            }

            let vcd = self.vcd_path(&elf_base_of_target(target));
            if !vcd.is_file() {
                tracing::warn!("⚠️ Missing VCD: {}", vcd.display());
                report.issues.push(IntegrityIssue {
                    title: title.to_string(),
                    kind: IssueKind::MissingVcd,
                    path: vcd,
                });
            }
        }

        tracing::info!(
            "✅ Verification finished: {} games, {} issues",
            report.checked,
            report.issues.len()
        );
        Ok(report)
    }

    /// 把已安裝的 VCD 轉回 CUE+BIN 或 ISO 放到 `out_dir`
    pub async fn extract(
        &self,
        title: &str,
        format: ExtractFormat,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let conf = self.conf()?;
        let base = self.base_of(&conf, title)?;
        let vcd = self.vcd_path(&base);
        if !vcd.is_file() {
            return Err(PopError::FileNotFound { path: vcd });
        }
        ensure_dir(out_dir)?;

        match format {
            ExtractFormat::CueBin => {
                let copy = out_dir.join(format!("{}{}", base, VCD_EXTENSION));
                // 輸出資料夾就是 POPS/ 時直接在原檔旁轉換，不複製也不刪除
                if is_same_file(&vcd, &copy) {
                    let (cue, bin) = self.toolchain.vcd_to_cue_bin(&vcd).await?;
                    return Ok(vec![cue, bin]);
                }
                fs::copy(&vcd, &copy)?;
                let result = self.toolchain.vcd_to_cue_bin(&copy).await;
                if copy.exists() {
                    fs::remove_file(&copy)?;
                }
                let (cue, bin) = result?;
                Ok(vec![cue, bin])
            }
            ExtractFormat::Iso => {
                let iso = out_dir.join(format!("{}.iso", safe_file_name(title)));
                self.toolchain.vcd_to_iso(&vcd, &iso).await?;
                Ok(vec![iso])
            }
        }
    }

    /// 目標資料夾所在磁碟的容量
    pub fn disk_usage(&self) -> Option<DiskUsage> {
        disk_usage(&self.target_dir)
    }
}

fn is_installed_image(path: &Path) -> bool {
    path.extension()
        .map(|e| is_image_extension(&format!(".{}", e.to_string_lossy())))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::tools::ProcessRunner;
    use tempfile::TempDir;

    fn library(temp: &TempDir) -> Library<ProcessRunner> {
        Library::new(temp.path(), Toolchain::new(ProcessRunner, temp.path().join("tools")))
    }

    fn seed(temp: &TempDir) {
        let root = temp.path();
        fs::write(
            root.join("conf_apps.cfg"),
            "Spyro=mass:/XX.SCUS_944.26.ELF\ncrash=mass:/XX.SCUS_949.00.ELF\nGhost=mass:/XX.GHOST.ELF\n",
        )
        .unwrap();
        fs::create_dir_all(root.join("POPS/SCUS_944.26")).unwrap();
        fs::write(root.join("POPS/SCUS_944.26.VCD"), b"vcd-data").unwrap();
        fs::write(root.join("POPS/SCUS_949.00.iso"), b"iso").unwrap();
        fs::write(root.join("XX.SCUS_944.26.ELF"), b"elf").unwrap();
        fs::write(root.join("POPSTARTER.ELF"), b"elf").unwrap();
        fs::create_dir_all(root.join("ART")).unwrap();
        fs::write(root.join("ART/XX.SCUS_944.26.ELF_COV.jpg"), b"jpg").unwrap();
    }

    #[test]
    fn test_games_sorted_and_filtered() {
        let temp = TempDir::new().unwrap();
        seed(&temp);
        let lib = library(&temp);

        let games = lib.games(None).unwrap();
        let titles: Vec<_> = games.iter().map(|g| g.title.as_str()).collect();
        assert_eq!(titles, vec!["crash", "Spyro"]);
        assert_eq!(games[0].status, GameStatus::MissingVcd);
        assert_eq!(games[1].status, GameStatus::Ready);
        assert_eq!(games[1].vcd_size, Some(8));
        assert!(games[1].cover.is_some());
        assert!(games[1].logo.is_none());

        let filtered = lib.games(Some("944")).unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].title, "Spyro");
    }

    #[test]
    fn test_delete_removes_everything_for_game() {
        let temp = TempDir::new().unwrap();
        seed(&temp);
        let lib = library(&temp);

        lib.delete("Spyro").unwrap();

        let root = temp.path();
        assert!(!root.join("POPS/SCUS_944.26").exists());
        assert!(!root.join("POPS/SCUS_944.26.VCD").exists());
        assert!(!root.join("XX.SCUS_944.26.ELF").exists());
        assert!(!root.join("ART/XX.SCUS_944.26.ELF_COV.jpg").exists());
        let conf = ConfApps::load_from_target(root).unwrap();
        assert!(!conf.contains("Spyro"));
        assert!(conf.contains("crash"));
        assert!(root.join("backup").read_dir().unwrap().next().is_some());

        assert!(matches!(lib.delete("Spyro"), Err(PopError::GameNotFound { .. })));
    }

    #[test]
    fn test_delete_all_keeps_popstarter() {
        let temp = TempDir::new().unwrap();
        seed(&temp);
        let stats = library(&temp).delete_all().unwrap();

        let root = temp.path();
        assert_eq!(stats.folders, 1);
        assert_eq!(stats.images, 2);
        assert_eq!(stats.art, 1);
        assert_eq!(stats.launchers, 1);
        assert!(root.join("POPSTARTER.ELF").exists());
        assert!(!root.join("conf_apps.cfg").exists());
    }

    #[test]
    fn test_rename_and_verify() {
        let temp = TempDir::new().unwrap();
        seed(&temp);
        let lib = library(&temp);

        lib.rename("crash", "Crash Bandicoot").unwrap();
        assert!(matches!(
            lib.rename("Spyro", "Crash Bandicoot"),
            Err(PopError::DuplicateGame { .. })
        ));

        let report = lib.verify().unwrap();
        assert_eq!(report.checked, 3);
        // crash 與 Ghost 缺 ELF；crash 與 Ghost 缺 VCD
        assert_eq!(report.errors().count(), 2);
        assert_eq!(report.issues.len(), 4);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_set_cover_for_unknown_game() {
        let temp = TempDir::new().unwrap();
        seed(&temp);
        let image = temp.path().join("cover.png");
        fs::write(&image, b"png").unwrap();

        let lib = library(&temp);
        assert!(matches!(
            lib.set_cover("Nope", &image),
            Err(PopError::GameNotFound { .. })
        ));
        let saved = lib.set_logo("Spyro", &image).unwrap();
        assert!(saved.ends_with("ART/XX.SCUS_944.26.ELF_LGO.png"));
    }
}
