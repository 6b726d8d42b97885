use crate::core::naming::{extension_of, find_sibling, stem_of};
use crate::core::tools::Toolchain;
use crate::domain::model::TargetFormat;
use crate::domain::ports::{NoProgress, ProgressReporter, ToolRunner};
use crate::utils::error::{PopError, Result};
use crate::utils::fs::{ensure_dir, human_size, is_same_file, move_file};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// 為單獨的 ISO 產生 chdman 需要的 CUE
pub fn write_iso_cue(iso: &Path) -> Result<PathBuf> {
    let cue = iso.with_extension("cue");
    let iso_name = iso
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content = format!(
        "FILE \"{}\" BINARY\n  TRACK 01 MODE2/2352\n    INDEX 01 00:00:00\n",
        iso_name
    );
    fs::write(&cue, content)?;
    tracing::info!("📝 CUE created for {}: {}", iso_name, cue.display());
    Ok(cue)
}

/// 各種映像格式之間的轉換（全部透過外部工具）
pub struct Transcoder<R: ToolRunner> {
    toolchain: Toolchain<R>,
    progress: Arc<dyn ProgressReporter>,
}

impl<R: ToolRunner> Transcoder<R> {
    pub fn new(toolchain: Toolchain<R>) -> Self {
        Self {
            toolchain,
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn toolchain(&self) -> &Toolchain<R> {
        &self.toolchain
    }

    /// 回傳產生的檔案
    pub async fn convert(
        &self,
        input: &Path,
        target: TargetFormat,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        if !input.is_file() {
            return Err(PopError::FileNotFound {
                path: input.to_path_buf(),
            });
        }
        ensure_dir(out_dir)?;

        let ext = extension_of(input);
        let stem = stem_of(input);
        let out = |ext: &str| out_dir.join(format!("{}.{}", stem, ext));
        tracing::info!("🔄 {} → {}", input.display(), target);

        match (ext.as_str(), target) {
            (".cue" | ".iso" | ".gdi", TargetFormat::Chd) => {
                let source = if ext == ".iso" {
                    let cue = input.with_extension("cue");
                    if cue.is_file() {
                        cue
                    } else {
                        write_iso_cue(input)?
                    }
                } else {
                    input.to_path_buf()
                };
                let chd = out("chd");
                self.toolchain.chd_create(&source, &chd).await?;
                Ok(vec![chd])
            }
            (".chd", TargetFormat::CueBin) => {
                let temp = tempfile::Builder::new().prefix("POPSTEMP_").tempdir()?;
                let temp_cue = temp.path().join(format!("{}.cue", stem));
                let temp_bin = temp.path().join(format!("{}.bin", stem));
                self.toolchain
                    .chd_extract(input, &temp_cue, &temp_bin, self.progress.as_ref())
                    .await?;

                let (cue, bin) = (out("cue"), out("bin"));
                move_file(&temp_cue, &cue)?;
                move_file(&temp_bin, &bin)?;
                Ok(vec![cue, bin])
            }
            (".chd", TargetFormat::Gdi) => {
                let gdi = out("gdi");
                self.toolchain.chd_extract_gdi(input, &gdi).await?;
                Ok(vec![gdi])
            }
            (".chd", TargetFormat::Iso) => self.chd_to_iso(input, &stem, out_dir).await,
            (".cue", TargetFormat::Vcd) => {
                if find_sibling(input, "bin").is_none() {
                    return Err(PopError::FileNotFound {
                        path: input.with_extension("bin"),
                    });
                }
                let vcd = out("vcd");
                self.toolchain.cue_to_vcd(input, &vcd).await?;
                Ok(vec![vcd])
            }
            (".iso" | ".bin", TargetFormat::Vcd) => {
                let vcd = out("vcd");
                fs::copy(input, &vcd)?;
                tracing::info!("✅ VCD created: {}", vcd.display());
                Ok(vec![vcd])
            }
            (".vcd", TargetFormat::CueBin) => {
                let copy = out_dir.join(input.file_name().unwrap_or_default());
                // 相對路徑或連結也可能指向同一個檔案
                let copied = !is_same_file(input, &copy);
                if copied {
                    fs::copy(input, &copy)?;
                }
                let result = self.toolchain.vcd_to_cue_bin(&copy).await;
                if copied && copy.exists() {
                    fs::remove_file(&copy)?;
                }
                let (cue, bin) = result?;
                Ok(vec![cue, bin])
            }
            (".vcd", TargetFormat::Iso) => {
                let iso = out("iso");
                self.toolchain.vcd_to_iso(input, &iso).await?;
                Ok(vec![iso])
            }
            (".iso", TargetFormat::Zso) => {
                let zso = out("zso");
                self.toolchain.iso_to_zso(input, &zso).await?;
                Ok(vec![zso])
            }
            (".zso", TargetFormat::Iso) => {
                let iso = out("iso");
                self.toolchain.zso_to_iso(input, &iso).await?;
                Ok(vec![iso])
            }
            _ => Err(PopError::UnsupportedConversion {
                from: ext,
                to: target.to_string(),
            }),
        }
    }

    /// 解出 CUE+BIN 後把 BIN 改名為 ISO
    async fn chd_to_iso(&self, chd: &Path, stem: &str, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let cue = out_dir.join(format!("{}.cue", stem));
        let bin = out_dir.join(format!("{}.bin", stem));
        let iso = out_dir.join(format!("{}.iso", stem));

        let extracted = self
            .toolchain
            .chd_extract(chd, &cue, &bin, self.progress.as_ref())
            .await;
        let result = match extracted {
            Ok(()) => match fs::metadata(&bin) {
                Ok(meta) if meta.len() > 0 => {
                    tracing::info!("   ✅ Extracted {} ({})", bin.display(), human_size(meta.len()));
                    move_file(&bin, &iso)
                }
                _ => Err(PopError::OutputMissing { path: bin.clone() }),
            },
            Err(e) => Err(e),
        };

        if cue.exists() {
            fs::remove_file(&cue)?;
        }
        if result.is_err() && bin.exists() {
            fs::remove_file(&bin)?;
        }
        result?;
        tracing::info!("🎉 ISO created: {}", iso.display());
        Ok(vec![iso])
    }
}
