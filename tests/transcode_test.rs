mod common;

use anyhow::Result;
use common::{tools_dir, touch, FakeRunner};
use popcraft::core::tools::Tool;
use popcraft::domain::model::TargetFormat;
use popcraft::{PopError, Toolchain, Transcoder};
use std::fs;
use tempfile::TempDir;

fn transcoder(runner: &FakeRunner, temp: &TempDir) -> Transcoder<FakeRunner> {
    let tools = tools_dir(temp.path());
    Transcoder::new(Toolchain::new(runner.clone(), tools))
}

#[tokio::test]
async fn test_chd_to_iso_renames_bin() -> Result<()> {
    let temp = TempDir::new()?;
    let runner = FakeRunner::new();
    let chd = touch(&temp.path().join("in/Vagrant Story.chd"), b"CHD");
    let out = temp.path().join("out");

    let produced = transcoder(&runner, &temp)
        .convert(&chd, TargetFormat::Iso, &out)
        .await?;

    assert_eq!(produced, vec![out.join("Vagrant Story.iso")]);
    assert_eq!(fs::read(out.join("Vagrant Story.iso"))?, b"BIN-DATA");
    assert!(!out.join("Vagrant Story.cue").exists());
    assert!(!out.join("Vagrant Story.bin").exists());
    Ok(())
}

#[tokio::test]
async fn test_chd_to_cue_bin_leaves_no_temp_dir() -> Result<()> {
    let temp = TempDir::new()?;
    let runner = FakeRunner::new();
    let chd = touch(&temp.path().join("Tekken 3.chd"), b"CHD");
    let out = temp.path().join("out");

    let produced = transcoder(&runner, &temp)
        .convert(&chd, TargetFormat::CueBin, &out)
        .await?;

    assert_eq!(produced, vec![out.join("Tekken 3.cue"), out.join("Tekken 3.bin")]);
    assert!(produced.iter().all(|p| p.is_file()));

    let calls = runner.calls();
    let temp_cue = std::path::PathBuf::from(&calls[0].args[4]);
    assert!(!temp_cue.parent().map(|p| p.exists()).unwrap_or(true));
    Ok(())
}

#[tokio::test]
async fn test_iso_to_chd_writes_cue_first() -> Result<()> {
    let temp = TempDir::new()?;
    let runner = FakeRunner::new();
    let iso = touch(&temp.path().join("Ape Escape.iso"), b"ISO");
    let out = temp.path().join("out");

    let produced = transcoder(&runner, &temp)
        .convert(&iso, TargetFormat::Chd, &out)
        .await?;

    assert_eq!(produced, vec![out.join("Ape Escape.chd")]);
    let cue = temp.path().join("Ape Escape.cue");
    assert!(fs::read_to_string(&cue)?.contains("FILE \"Ape Escape.iso\" BINARY"));
    let calls = runner.calls();
    assert_eq!(calls[0].args[0], "createcd");
    assert_eq!(calls[0].args[2].as_os_str(), cue.as_os_str());
    Ok(())
}

#[tokio::test]
async fn test_vcd_to_cue_bin_removes_copied_vcd() -> Result<()> {
    let temp = TempDir::new()?;
    let runner = FakeRunner::new();
    let vcd = touch(&temp.path().join("SLUS_007.71.VCD"), b"VCD");
    let out = temp.path().join("out");

    let produced = transcoder(&runner, &temp)
        .convert(&vcd, TargetFormat::CueBin, &out)
        .await?;

    assert_eq!(
        produced,
        vec![out.join("SLUS_007.71.cue"), out.join("SLUS_007.71.bin")]
    );
    assert!(!out.join("SLUS_007.71.VCD").exists());
    assert!(vcd.exists());
    Ok(())
}

#[tokio::test]
async fn test_vcd_to_cue_bin_in_place_keeps_source() -> Result<()> {
    let temp = TempDir::new()?;
    let runner = FakeRunner::new();
    let work = temp.path().join("work");
    let vcd = touch(&work.join("Game.VCD"), b"VCD");

    // 同一個檔案：一邊是 `sub/..` 別名，一邊是絕對路徑
    fs::create_dir_all(work.join("sub"))?;
    let alias = work.join("sub/../Game.VCD");
    let produced = transcoder(&runner, &temp)
        .convert(&alias, TargetFormat::CueBin, &work)
        .await?;

    assert_eq!(produced, vec![work.join("Game.cue"), work.join("Game.bin")]);
    assert_eq!(fs::read(&vcd)?, b"VCD");
    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn test_relative_input_with_absolute_output_keeps_source() -> Result<()> {
    let temp = TempDir::new()?;
    let runner = FakeRunner::new();
    let work = temp.path().join("work");
    let vcd = touch(&work.join("Game.VCD"), b"VCD");

    // 從目前工作目錄往上走到根目錄，再接上檔案的絕對路徑
    let cwd = fs::canonicalize(std::env::current_dir()?)?;
    let mut relative = std::path::PathBuf::new();
    for _ in 0..cwd.components().count() + 1 {
        relative.push("..");
    }
    relative.push(vcd.strip_prefix("/")?);
    assert!(relative.is_relative());

    transcoder(&runner, &temp)
        .convert(&relative, TargetFormat::CueBin, &work)
        .await?;

    assert_eq!(fs::read(&vcd)?, b"VCD");
    assert!(work.join("Game.cue").is_file());
    Ok(())
}

#[tokio::test]
async fn test_iso_to_zso_restores_input_and_cleans_up() -> Result<()> {
    let temp = TempDir::new()?;
    let runner = FakeRunner::new();
    let work = temp.path().join("work");
    let iso = touch(&work.join("Game.iso"), b"ISO");
    let out = temp.path().join("out");

    let produced = transcoder(&runner, &temp)
        .convert(&iso, TargetFormat::Zso, &out)
        .await?;

    assert_eq!(produced, vec![out.join("Game.zso")]);
    assert_eq!(fs::read(out.join("Game.zso"))?, b"ZISO-OUT");
    assert_eq!(fs::read(&iso)?, b"ISO");
    assert!(!work.join("ISO").exists());
    assert!(!work.join("ZSO").exists());

    let calls = runner.calls();
    assert_eq!(calls[0].cwd.as_deref(), Some(work.join("ISO").as_path()));
    assert_eq!(calls[0].args[0], "-c9");
    Ok(())
}

#[tokio::test]
async fn test_failed_ziso_still_restores_input() -> Result<()> {
    let temp = TempDir::new()?;
    let runner = FakeRunner::new();
    runner.fail(Tool::Ziso);
    let work = temp.path().join("work");
    let zso = touch(&work.join("Game.zso"), b"ZSO");

    let result = transcoder(&runner, &temp)
        .convert(&zso, TargetFormat::Iso, &work)
        .await;

    assert!(matches!(result, Err(PopError::ToolFailed { .. })));
    assert_eq!(fs::read(&zso)?, b"ZSO");
    assert!(!work.join("ISO").exists());
    assert!(!work.join("ZSO").exists());
    assert!(!work.join("Game.iso").exists());
    Ok(())
}

#[tokio::test]
async fn test_missing_tool_is_reported() -> Result<()> {
    let temp = TempDir::new()?;
    let tools = temp.path().join("empty-tools");
    fs::create_dir_all(&tools)?;
    let vcd = touch(&temp.path().join("Game.VCD"), b"VCD");

    let transcoder = Transcoder::new(Toolchain::new(FakeRunner::new(), tools));
    let result = transcoder
        .convert(&vcd, TargetFormat::Iso, temp.path())
        .await;
    assert!(matches!(result, Err(PopError::ToolNotFound { .. })));
    Ok(())
}
