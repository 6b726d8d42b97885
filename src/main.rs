use clap::Parser;
use popcraft::config::toml_config::Settings;
use popcraft::config::{Command, PopConfig};
use popcraft::core::art::match_art;
use popcraft::core::conf_apps::backup_conf_file;
use popcraft::core::export::export_games;
use popcraft::core::install::{collect_game_files, find_bios_files};
use popcraft::core::tools::Tool;
use popcraft::core::usb::install_usb_files;
use popcraft::domain::model::{
    GameName, GameSource, GameStatus, COPY_DIR_NAME, DESCRIPTION_DIR_NAME, FIX_DIR_NAME,
    POPS_ELF_NAME, SLOT0_VMC_NAME, SLOT1_VMC_NAME, USB_INSTALL_DIR_NAME,
};
use popcraft::utils::error::{ErrorSeverity, PopError};
use popcraft::utils::fs::human_size;
use popcraft::utils::logger::{self, LogProgress};
use popcraft::utils::validation::Validate;
use popcraft::{
    CliConfig, InstallEngine, Library, LocalStorage, PopsInstaller, ProcessRunner, Toolchain,
    Transcoder,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = CliConfig::parse();

    // 載入設定檔（失敗時日誌尚未初始化，直接輸出）
    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("❌ Failed to load settings: {}", e);
            eprintln!("💡 {}", e.recovery_suggestion());
            std::process::exit(1);
        }
    };

    // 初始化日誌
    let log_file = cli.log_file(&settings);
    logger::init_cli_logger(
        cli.verbose,
        settings.logging.level.as_deref(),
        cli.log_format,
        log_file.as_deref(),
    );
    tracing::info!("🚀 Starting popcraft v{}", env!("CARGO_PKG_VERSION"));
    tracing::debug!("CLI config: {:?}", cli);

    // 驗證配置
    if let Err(e) = cli.validate().and_then(|_| settings.validate()) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let config = cli.resolve(&settings);
    tracing::debug!("Resolved config: {:?}", config);

    if let Err(e) = run(cli.command, config).await {
        // 記錄詳細錯誤信息
        tracing::error!(
            "❌ {} (Category: {:?}, Severity: {:?})",
            e,
            e.category(),
            e.severity()
        );
        tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

        eprintln!("❌ {}", e.user_friendly_message());
        eprintln!("💡 {}", e.recovery_suggestion());

        // 根據錯誤嚴重程度決定退出碼
        let exit_code = match e.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        };
        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn library(config: &PopConfig) -> popcraft::Result<Library<ProcessRunner>> {
    let target = config.target_dir()?;
    Ok(Library::new(
        target,
        Toolchain::new(ProcessRunner, &config.tools_dir),
    ))
}

/// 單一遊戲用 --cover/--logo，多個遊戲用 --covers/--logos 資料夾比對
fn game_sources(
    files: Vec<PathBuf>,
    cover: Option<PathBuf>,
    logo: Option<PathBuf>,
    covers: Option<&Path>,
    logos: Option<&Path>,
) -> Vec<GameSource> {
    files
        .into_iter()
        .map(|path| {
            let name = GameName::from_path(&path);
            let find = |dir: Option<&Path>| {
                dir.and_then(|d| match_art(d, &name.stem, name.code.as_deref()))
            };
            GameSource {
                cover: cover.clone().or_else(|| find(covers)),
                logo: logo.clone().or_else(|| find(logos)),
                path,
            }
        })
        .collect()
}

async fn run(command: Command, config: PopConfig) -> popcraft::Result<()> {
    match command {
        Command::Install {
            sources,
            cover,
            logo,
            covers,
            logos,
        } => {
            let target = config.target_dir()?.to_path_buf();
            let files = collect_game_files(&sources)?;
            if files.is_empty() {
                return Err(PopError::ValidationError {
                    message: "No disc images found in the given sources".to_string(),
                });
            }
            let games = game_sources(files, cover, logo, covers.as_deref(), logos.as_deref());

            let installer = PopsInstaller::new(ProcessRunner, config, &target)
                .with_progress(Arc::new(LogProgress::default()));
            let report = InstallEngine::new(installer).run(&games).await?;

            println!("✅ Installed {}/{} games into {}", report.installed.len(), report.total, target.display());
            for game in &report.installed {
                println!("  🎮 {} → {}", game.title, game.elf_name);
            }
            for failed in &report.failed {
                println!("  ❌ {}: {}", failed.path.display(), failed.error);
            }
            if report.installed.is_empty() {
                return Err(PopError::ProcessingError {
                    message: format!("All {} games failed", report.failed.len()),
                });
            }
        }
        Command::List { filter, json } => {
            let library = library(&config)?;
            let games = library.games(filter.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&games)?);
                return Ok(());
            }

            println!("🎮 {} games in {}", games.len(), library.target_dir().display());
            for game in &games {
                let size = game.vcd_size.map(human_size).unwrap_or_else(|| "-".to_string());
                let status = match game.status {
                    GameStatus::Ready => "✅",
                    GameStatus::MissingVcd => "⚠️",
                };
                let art = match (&game.cover, &game.logo) {
                    (Some(_), Some(_)) => "cover+logo",
                    (Some(_), None) => "cover",
                    (None, Some(_)) => "logo",
                    (None, None) => "",
                };
                println!("  {} {:<40} {:<24} {:>10} {}", status, game.title, game.elf_name, size, art);
            }
            if let Some(usage) = library.disk_usage() {
                println!(
                    "💾 {} used of {} ({:.1}%), {} free",
                    human_size(usage.used),
                    human_size(usage.total),
                    usage.percent_used(),
                    human_size(usage.free)
                );
            }
        }
        Command::Rename { old, new } => {
            library(&config)?.rename(&old, &new)?;
            println!("✏️ '{}' → '{}'", old, new);
        }
        Command::Delete { title } => {
            library(&config)?.delete(&title)?;
            println!("🗑️ Deleted '{}'", title);
        }
        Command::DeleteAll { yes } => {
            if !yes {
                return Err(PopError::ValidationError {
                    message: "delete-all removes every game; pass --yes to confirm".to_string(),
                });
            }
            let stats = library(&config)?.delete_all()?;
            println!(
                "🗑️ Removed {} save folders, {} images, {} art files, {} launchers",
                stats.folders, stats.images, stats.art, stats.launchers
            );
        }
        Command::Cover { title, image } => {
            let saved = library(&config)?.set_cover(&title, &image)?;
            println!("🖼️ {}", saved.display());
        }
        Command::Logo { title, image } => {
            let saved = library(&config)?.set_logo(&title, &image)?;
            println!("🔖 {}", saved.display());
        }
        Command::Verify => {
            let report = library(&config)?.verify()?;
            for issue in &report.issues {
                println!("  {:?}: {} ({})", issue.kind, issue.title, issue.path.display());
            }
            let errors = report.errors().count();
            println!("🔍 {} games checked, {} issues", report.checked, report.issues.len());
            if errors > 0 {
                return Err(PopError::ValidationError {
                    message: format!("{} games are missing their launcher ELF", errors),
                });
            }
        }
        Command::Export {
            format,
            output,
            file,
        } => {
            let target = config.target_dir()?;
            let storage = LocalStorage::new(output);
            let path = export_games(&storage, target, format, file.as_deref()).await?;
            println!("📊 {}", path.display());
        }
        Command::Backup => match backup_conf_file(config.target_dir()?)? {
            Some(path) => println!("💾 {}", path.display()),
            None => println!("ℹ️ No conf_apps.cfg to back up"),
        },
        Command::Extract {
            title,
            format,
            output,
        } => {
            let produced = library(&config)?.extract(&title, format, &output).await?;
            for path in produced {
                println!("📀 {}", path.display());
            }
        }
        Command::Transcode { input, to, output } => {
            let out_dir = output.unwrap_or_else(|| {
                input
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| PathBuf::from("."))
            });
            let transcoder = Transcoder::new(Toolchain::new(ProcessRunner, &config.tools_dir))
                .with_progress(Arc::new(LogProgress::default()));
            for path in transcoder.convert(&input, to, &out_dir).await? {
                println!("📀 {}", path.display());
            }
        }
        Command::UsbInstall { destination } => {
            let report = install_usb_files(&config.tools_dir, &destination).await?;
            println!(
                "🚀 {} copied, {} unchanged, {} failed",
                report.copied,
                report.skipped,
                report.failed.len()
            );
        }
        Command::Bios => {
            for name in find_bios_files(&config.tools_dir) {
                let marker = if name == config.bios { "*" } else { " " };
                let present = config.tools_dir.join(&name).is_file();
                println!("{} {} {}", marker, name, if present { "" } else { "(missing)" });
            }
        }
        Command::Doctor => doctor(&config),
    }
    Ok(())
}

fn doctor(config: &PopConfig) {
    let dir = &config.tools_dir;
    println!("🩺 Tools folder: {}", dir.display());

    for name in [POPS_ELF_NAME, SLOT0_VMC_NAME, SLOT1_VMC_NAME, config.bios.as_str()] {
        let mark = if dir.join(name).is_file() { "✅" } else { "❌" };
        println!("  {} {}", mark, name);
    }

    let toolchain = Toolchain::new(ProcessRunner, dir);
    for tool in Tool::ALL {
        match toolchain.resolve(tool) {
            Ok(path) => println!("  ✅ {} ({})", tool, path.display()),
            Err(_) => println!("  ❌ {}", tool),
        }
    }

    for optional in [COPY_DIR_NAME, FIX_DIR_NAME, DESCRIPTION_DIR_NAME, USB_INSTALL_DIR_NAME] {
        let mark = if dir.join(optional).is_dir() { "✅" } else { "➖" };
        println!("  {} {}/", mark, optional);
    }

    if let Some(target) = &config.target {
        println!("🎯 Target: {}", target.display());
    }
}
