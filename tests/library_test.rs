mod common;

use anyhow::Result;
use common::{config, tools_dir, touch, FakeRunner};
use popcraft::core::export::export_games;
use popcraft::core::library::ExtractFormat;
use popcraft::domain::model::{ExportFormat, GameSource, GameStatus, IssueKind};
use popcraft::{InstallEngine, Library, LocalStorage, PopError, PopsInstaller, Toolchain};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 安裝兩款遊戲後回傳 (tools, target)
async fn installed_library(root: &Path) -> Result<(PathBuf, PathBuf)> {
    let tools = tools_dir(root);
    let target = root.join("usb");
    let games = vec![
        GameSource::new(touch(&root.join("Spyro [SCUS_944.26].iso"), b"SPYRO")),
        GameSource {
            path: touch(&root.join("Crash [SCUS_949.00].img"), b"CRASH"),
            cover: Some(touch(&root.join("crash.jpg"), b"jpg")),
            logo: Some(touch(&root.join("crash-logo.png"), b"png")),
        },
    ];
    let installer = PopsInstaller::new(FakeRunner::new(), config(&tools, &target), &target);
    let report = InstallEngine::new(installer).run(&games).await?;
    assert_eq!(report.installed.len(), 2);
    Ok((tools, target))
}

#[tokio::test]
async fn test_list_after_install() -> Result<()> {
    let temp = TempDir::new()?;
    let (tools, target) = installed_library(temp.path()).await?;
    let library = Library::new(&target, Toolchain::new(FakeRunner::new(), &tools));

    let games = library.games(None)?;
    assert_eq!(games.len(), 2);
    assert_eq!(games[0].title, "Crash");
    assert_eq!(games[0].vcd_size, Some(5));
    assert_eq!(games[0].status, GameStatus::Ready);
    assert!(games[0].cover.as_ref().unwrap().ends_with("XX.SCUS_949.00.ELF_COV.jpg"));
    assert!(games[0].logo.as_ref().unwrap().ends_with("XX.SCUS_949.00.ELF_LGO.png"));
    assert_eq!(games[1].title, "Spyro");
    assert!(games[1].cover.is_none());

    assert_eq!(library.games(Some("SPY"))?.len(), 1);
    assert!(library.games(Some("zelda"))?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_verify_flags_missing_files() -> Result<()> {
    let temp = TempDir::new()?;
    let (tools, target) = installed_library(temp.path()).await?;
    let library = Library::new(&target, Toolchain::new(FakeRunner::new(), &tools));
    assert!(library.verify()?.is_clean());

    fs::remove_file(target.join("XX.SCUS_944.26.ELF"))?;
    fs::remove_file(target.join("POPS/SCUS_949.00.VCD"))?;

    let report = library.verify()?;
    assert_eq!(report.checked, 2);
    assert_eq!(report.issues.len(), 2);
    assert_eq!(report.errors().count(), 1);
    assert!(report
        .issues
        .iter()
        .any(|i| i.kind == IssueKind::MissingVcd && i.title == "Crash"));
    Ok(())
}

#[tokio::test]
async fn test_extract_to_cue_bin_and_iso() -> Result<()> {
    let temp = TempDir::new()?;
    let (tools, target) = installed_library(temp.path()).await?;
    let runner = FakeRunner::new();
    let library = Library::new(&target, Toolchain::new(runner.clone(), &tools));
    let out = temp.path().join("extracted");

    let produced = library.extract("Spyro", ExtractFormat::CueBin, &out).await?;
    assert_eq!(
        produced,
        vec![out.join("SCUS_944.26.cue"), out.join("SCUS_944.26.bin")]
    );
    // 複製過去的 VCD 在轉換後刪除
    assert!(!out.join("SCUS_944.26.VCD").exists());
    assert_eq!(runner.calls()[0].cwd.as_deref(), Some(out.as_path()));

    let produced = library.extract("Spyro", ExtractFormat::Iso, &out).await?;
    assert_eq!(produced, vec![out.join("Spyro.iso")]);
    assert_eq!(runner.tools_called(), vec!["POPS2CUE.EXE", "vcd2iso.exe"]);

    assert!(matches!(
        library.extract("Nope", ExtractFormat::Iso, &out).await,
        Err(PopError::GameNotFound { .. })
    ));
    Ok(())
}

#[tokio::test]
async fn test_extract_into_pops_keeps_installed_vcd() -> Result<()> {
    let temp = TempDir::new()?;
    let (tools, target) = installed_library(temp.path()).await?;
    let runner = FakeRunner::new();
    let library = Library::new(&target, Toolchain::new(runner.clone(), &tools));
    let pops = target.join("POPS");

    let produced = library.extract("Spyro", ExtractFormat::CueBin, &pops).await?;

    assert_eq!(
        produced,
        vec![pops.join("SCUS_944.26.cue"), pops.join("SCUS_944.26.bin")]
    );
    assert_eq!(fs::read(pops.join("SCUS_944.26.VCD"))?, b"SPYRO");
    assert_eq!(
        runner.calls()[0].args[0].as_os_str(),
        pops.join("SCUS_944.26.VCD").as_os_str()
    );
    assert_eq!(library.games(Some("Spyro"))?[0].status, GameStatus::Ready);
    Ok(())
}

#[tokio::test]
async fn test_extract_iso_name_stays_inside_output_dir() -> Result<()> {
    let temp = TempDir::new()?;
    let (tools, target) = installed_library(temp.path()).await?;
    let library = Library::new(&target, Toolchain::new(FakeRunner::new(), &tools));
    let out = temp.path().join("extracted");

    library.rename("Spyro", "../Spyro")?;
    let produced = library.extract("../Spyro", ExtractFormat::Iso, &out).await?;

    assert_eq!(produced, vec![out.join("_Spyro.iso")]);
    assert!(!temp.path().join("Spyro.iso").exists());
    Ok(())
}

#[tokio::test]
async fn test_rename_delete_and_art() -> Result<()> {
    let temp = TempDir::new()?;
    let (tools, target) = installed_library(temp.path()).await?;
    let library = Library::new(&target, Toolchain::new(FakeRunner::new(), &tools));

    library.rename("Spyro", "Spyro the Dragon")?;
    let logo = touch(&temp.path().join("spyro.bmp"), b"bmp");
    library.set_logo("Spyro the Dragon", &logo)?;
    assert!(target.join("ART/XX.SCUS_944.26.ELF_LGO.bmp").exists());

    library.delete("Crash")?;
    assert!(!target.join("ART/XX.SCUS_949.00.ELF_COV.jpg").exists());
    assert!(!target.join("POPS/SCUS_949.00").exists());

    let titles: Vec<_> = library.games(None)?.into_iter().map(|g| g.title).collect();
    assert_eq!(titles, vec!["Spyro the Dragon"]);

    library.delete_all()?;
    assert!(library.games(None)?.is_empty());
    assert!(target.join("POPS/POPSTARTER.ELF").exists());
    assert!(!target.join("POPS/SCUS_944.26.VCD").exists());
    assert!(!target.join("XX.SCUS_944.26.ELF").exists());
    Ok(())
}

#[tokio::test]
async fn test_export_csv_and_html() -> Result<()> {
    let temp = TempDir::new()?;
    let (_tools, target) = installed_library(temp.path()).await?;
    let storage = LocalStorage::new(temp.path().join("exports"));

    let csv_path = export_games(&storage, &target, ExportFormat::Csv, None).await?;
    assert_eq!(csv_path, temp.path().join("exports/games.csv"));
    assert_eq!(
        fs::read_to_string(&csv_path)?,
        "Game Name,ELF File\nSpyro,XX.SCUS_944.26.ELF\nCrash,XX.SCUS_949.00.ELF\n"
    );

    let html_path = export_games(&storage, &target, ExportFormat::Html, Some("list.html")).await?;
    let html = fs::read_to_string(html_path)?;
    assert!(html.contains("<tr><td>Crash</td><td>XX.SCUS_949.00.ELF</td></tr>"));

    let empty = temp.path().join("empty");
    fs::create_dir_all(&empty)?;
    assert!(matches!(
        export_games(&storage, &empty, ExportFormat::Csv, None).await,
        Err(PopError::EmptyLibrary { .. })
    ));
    Ok(())
}
