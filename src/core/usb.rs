use crate::domain::model::{FailedGame, UsbInstallReport, USB_INSTALL_DIR_NAME};
use crate::utils::error::{PopError, Result};
use crate::utils::fs::{copy_tree, ensure_dir, files_identical};
use std::fs;
use std::path::Path;

enum ItemOutcome {
    Copied,
    Skipped,
}

fn install_item(src: &Path, dst: &Path) -> Result<ItemOutcome> {
    if src.is_dir() {
        if dst.exists() {
            tracing::info!("📁 Merging folder: {}", dst.display());
        }
        copy_tree(src, dst)?;
        return Ok(ItemOutcome::Copied);
    }

    if dst.is_file() && files_identical(src, dst)? {
        tracing::info!("✅ Unchanged: {}", dst.display());
        return Ok(ItemOutcome::Skipped);
    }
    fs::copy(src, dst)?;
    tracing::info!("📄 Copied: {}", dst.display());
    Ok(ItemOutcome::Copied)
}

#[cfg(windows)]
async fn hide_item(path: &Path) -> Result<()> {
    let status = tokio::process::Command::new("attrib")
        .arg("+h")
        .arg(path)
        .status()
        .await?;
    if !status.success() {
        tracing::warn!("⚠️ Could not hide {}", path.display());
    }
    Ok(())
}

// 只有 Windows 需要隱藏屬性
#[cfg(not(windows))]
async fn hide_item(_path: &Path) -> Result<()> {
    Ok(())
}

/// 把 `<tools_dir>/usb_install/` 的內容合併到 `destination`
pub async fn install_usb_files(tools_dir: &Path, destination: &Path) -> Result<UsbInstallReport> {
    let source = tools_dir.join(USB_INSTALL_DIR_NAME);
    if !source.is_dir() {
        return Err(PopError::ConfigError {
            message: format!("'{}' folder not found in {}", USB_INSTALL_DIR_NAME, tools_dir.display()),
        });
    }

    let mut items = fs::read_dir(&source)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    items.sort();

    let mut report = UsbInstallReport::default();
    if items.is_empty() {
        tracing::warn!("⚠️ '{}' is empty, nothing to copy", USB_INSTALL_DIR_NAME);
        return Ok(report);
    }

    ensure_dir(destination)?;
    tracing::info!("🚀 Installing {} USB items into {}...", items.len(), destination.display());

    for src in items {
        let Some(name) = src.file_name() else {
            continue;
        };
        let dst = destination.join(name);

        match install_item(&src, &dst) {
            Ok(outcome) => {
                match outcome {
                    ItemOutcome::Copied => report.copied += 1,
                    ItemOutcome::Skipped => report.skipped += 1,
                }
                if let Err(e) = hide_item(&dst).await {
                    tracing::warn!("⚠️ Could not hide {}: {}", dst.display(), e);
                }
            }
            Err(e) => {
                tracing::error!("❌ {}: {}", src.display(), e);
                report.failed.push(FailedGame {
                    path: src.clone(),
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "✅ USB install finished: {} copied, {} unchanged, {} failed",
        report.copied,
        report.skipped,
        report.failed.len()
    );
    Ok(report)
}
