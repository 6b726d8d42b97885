use crate::core::art::{save_art, ArtKind};
use crate::core::conf_apps::update_conf_apps;
use crate::core::naming::{extension_of, find_sibling, is_image_extension};
use crate::core::tools::{Tool, Toolchain};
use crate::domain::model::{
    GameName, GameSource, InstalledGame, COPY_DIR_NAME, CFG_DIR_NAME, DESCRIPTION_DIR_NAME,
    FIX_DIR_NAME, POPSTARTER_ELF_NAME, POPS_DIR_NAME, POPS_ELF_NAME, BIOS_FILE_NAME,
    SLOT0_VMC_NAME, SLOT1_VMC_NAME,
};
use crate::domain::ports::{ConfigProvider, Installer, NoProgress, ProgressReporter, ToolRunner};
use crate::utils::error::{PopError, Result};
use crate::utils::fs::{copy_file, copy_tree, ensure_dir, files_identical};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 將 PS1 映像安裝成 POPStarter 遊戲
pub struct PopsInstaller<R: ToolRunner, C: ConfigProvider> {
    toolchain: Toolchain<R>,
    config: C,
    target_dir: PathBuf,
    progress: Arc<dyn ProgressReporter>,
}

impl<R: ToolRunner, C: ConfigProvider> PopsInstaller<R, C> {
    pub fn new(runner: R, config: C, target_dir: impl Into<PathBuf>) -> Self {
        let toolchain = Toolchain::new(runner, config.tools_dir());
        Self {
            toolchain,
            config,
            target_dir: target_dir.into(),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn target_dir(&self) -> &Path {
        &self.target_dir
    }

    fn pops_dir(&self) -> PathBuf {
        self.target_dir.join(POPS_DIR_NAME)
    }

    fn resource(&self, name: &str) -> PathBuf {
        self.config.tools_dir().join(name)
    }

    /// 缺少的必要檔案（POPS.ELF、BIOS、兩張記憶卡）
    pub fn missing_resources(&self) -> Vec<String> {
        [
            POPS_ELF_NAME,
            SLOT0_VMC_NAME,
            SLOT1_VMC_NAME,
            self.config.bios_name(),
        ]
        .iter()
        .filter(|name| !self.resource(name).is_file())
        .map(|name| name.to_string())
        .collect()
    }

    /// 產生 `POPS/<base>.VCD`
    async fn build_vcd(&self, source: &Path, name: &GameName, vcd_path: &Path) -> Result<()> {
        match name.extension.as_str() {
            ".chd" => {
                self.toolchain.resolve(Tool::Chdman)?;
                self.toolchain.resolve(Tool::Cue2Pops)?;

                // 暫存資料夾在離開此區塊時自動刪除
                let temp = tempfile::Builder::new().prefix("POPSTEMP_").tempdir()?;
                let cue = temp.path().join(format!("{}.cue", name.stem));
                let bin = temp.path().join(format!("{}.bin", name.stem));
                self.toolchain
                    .chd_extract(source, &cue, &bin, self.progress.as_ref())
                    .await?;
                self.toolchain.cue_to_vcd(&cue, vcd_path).await
            }
            ".cue" => {
                let bin = find_sibling(source, "bin").ok_or_else(|| PopError::FileNotFound {
                    path: source.with_extension("bin"),
                })?;
                tracing::info!("▶️ Converting {} + {} to VCD...", source.display(), bin.display());
                self.toolchain.cue_to_vcd(source, vcd_path).await
            }
            ".bin" => {
                let cue = find_sibling(source, "cue").ok_or_else(|| PopError::FileNotFound {
                    path: source.with_extension("cue"),
                })?;
                tracing::info!("▶️ Converting {} + {} to VCD...", cue.display(), source.display());
                self.toolchain.cue_to_vcd(&cue, vcd_path).await
            }
            ext => {
                tracing::info!("📦 Copying original ({}) as VCD...", ext);
                fs::copy(source, vcd_path)?;
                tracing::info!("✅ VCD created: {}", vcd_path.display());
                Ok(())
            }
        }
    }

    /// 存檔資料夾：兩張記憶卡加上 `_pops_fix/<base>/` 的修正檔
    fn prepare_save_folder(&self, name: &GameName) -> Result<PathBuf> {
        let save_folder = self.pops_dir().join(&name.base);
        ensure_dir(&save_folder)?;
        for vmc in [SLOT0_VMC_NAME, SLOT1_VMC_NAME] {
            copy_file(&self.resource(vmc), &save_folder.join(vmc))?;
        }

        let fix_src = self.config.tools_dir().join(FIX_DIR_NAME).join(&name.base);
        if fix_src.is_dir() {
            tracing::info!("🔧 Applying fix for {}...", name.base);
            copy_tree(&fix_src, &save_folder)?;
        }
        Ok(save_folder)
    }

    /// `_description_psx/<code>.cfg` → `<target>/CFG/<code>.cfg`，找不到不算錯誤
    pub fn copy_description(&self, name: &GameName) -> Result<bool> {
        let desc_dir = self.config.tools_dir().join(DESCRIPTION_DIR_NAME);
        if !desc_dir.is_dir() {
            tracing::debug!("No {} folder in {}", DESCRIPTION_DIR_NAME, desc_dir.display());
            return Ok(false);
        }

        let cfg_name = format!("{}.cfg", name.description_code());
        let cfg_path = desc_dir.join(&cfg_name);
        if !cfg_path.is_file() {
            tracing::info!("ℹ️ No description {} in {}", cfg_name, DESCRIPTION_DIR_NAME);
            return Ok(false);
        }

        let cfg_target_dir = self.target_dir.join(CFG_DIR_NAME);
        ensure_dir(&cfg_target_dir)?;
        let dest = cfg_target_dir.join(&cfg_name);
        if dest.exists() && files_identical(&cfg_path, &dest)? {
            tracing::info!("✅ Description already present: {}", cfg_name);
            return Ok(true);
        }

        fs::copy(&cfg_path, &dest)?;
        tracing::info!("📄 Description copied: {} → {}", cfg_name, dest.display());
        Ok(true)
    }
}

#[async_trait::async_trait]
impl<R: ToolRunner, C: ConfigProvider> Installer for PopsInstaller<R, C> {
    async fn prepare(&self) -> Result<()> {
        let missing = self.missing_resources();
        if !missing.is_empty() {
            return Err(PopError::MissingResources { files: missing });
        }

        let pops_dir = self.pops_dir();
        ensure_dir(&pops_dir)?;
        copy_file(
            &self.resource(self.config.bios_name()),
            &pops_dir.join(BIOS_FILE_NAME),
        )?;
        copy_file(
            &self.resource(POPS_ELF_NAME),
            &pops_dir.join(POPSTARTER_ELF_NAME),
        )?;

        let copy_src = self.config.tools_dir().join(COPY_DIR_NAME);
        if copy_src.is_dir() {
            tracing::info!("📦 Copying {} into {}...", COPY_DIR_NAME, POPS_DIR_NAME);
            let stats = copy_tree(&copy_src, &pops_dir)?;
            tracing::debug!("Copied {} files, {} unchanged", stats.copied, stats.skipped);
        }
        Ok(())
    }

    async fn install(&self, game: &GameSource) -> Result<InstalledGame> {
        let source = game.path.as_path();
        if !source.is_file() {
            return Err(PopError::FileNotFound {
                path: source.to_path_buf(),
            });
        }

        let name = GameName::from_path(source);
        if !is_image_extension(&name.extension) {
            return Err(PopError::UnsupportedFormat {
                extension: name.extension.clone(),
            });
        }
        tracing::debug!("Derived names: {:?}", name);

        let pops_dir = self.pops_dir();
        ensure_dir(&pops_dir)?;
        let vcd_path = pops_dir.join(name.vcd_name());
        self.build_vcd(source, &name, &vcd_path).await?;

        self.prepare_save_folder(&name)?;
        self.copy_description(&name)?;

        let elf_name = name.elf_name();
        copy_file(&self.resource(POPS_ELF_NAME), &self.target_dir.join(&elf_name))?;
        update_conf_apps(&self.target_dir, &name.title, &elf_name)?;

        if let Some(cover) = &game.cover {
            let saved = save_art(&self.target_dir, &name.base, ArtKind::Cover, cover)?;
            tracing::info!("🖼️ Cover saved: {}", saved.display());
        }
        if let Some(logo) = &game.logo {
            let saved = save_art(&self.target_dir, &name.base, ArtKind::Logo, logo)?;
            tracing::info!("🔖 Logo saved: {}", saved.display());
        }

        Ok(InstalledGame {
            title: name.title,
            elf_name,
            vcd_path,
        })
    }
}

/// 工具資料夾中所有 `BIOS*.BIN`（不分大小寫），排序後回傳；沒有時回傳 `BIOS.BIN`
pub fn find_bios_files(tools_dir: &Path) -> Vec<String> {
    let mut found: Vec<String> = fs::read_dir(tools_dir)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_file())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| {
            let upper = name.to_uppercase();
            upper.starts_with("BIOS") && upper.ends_with(".BIN")
        })
        .collect();
    found.sort();
    if found.is_empty() {
        found.push(BIOS_FILE_NAME.to_string());
    }
    found
}

/// 展開資料夾（不遞迴）為映像檔清單；同名的 .cue 與 .bin 只保留 .cue
pub fn collect_game_files(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_image_extension(&extension_of(p)))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    let cue_stems: Vec<PathBuf> = files
        .iter()
        .filter(|p| extension_of(p) == ".cue")
        .map(|p| p.with_extension(""))
        .collect();
    files.retain(|p| extension_of(p) != ".bin" || !cue_stems.contains(&p.with_extension("")));
    Ok(files)
}
