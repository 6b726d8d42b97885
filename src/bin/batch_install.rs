use clap::Parser;
use popcraft::config::toml_config::BatchJob;
use popcraft::config::{PopConfig, DEFAULT_LOG_FILE};
use popcraft::core::naming::{extension_of, is_image_extension};
use popcraft::core::tools::Tool;
use popcraft::core::usb::install_usb_files;
use popcraft::domain::model::GameName;
use popcraft::utils::error::ErrorSeverity;
use popcraft::utils::logger::{self, LogFormat, LogProgress};
use popcraft::utils::validation::Validate;
use popcraft::{InstallEngine, PopsInstaller, ProcessRunner, Toolchain};
use std::path::Path;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "popcraft-batch")]
#[command(about = "Install a list of PS1 games described in a TOML job file")]
struct Args {
    /// Path to the TOML job file
    #[arg(short, long, default_value = "popcraft-job.toml")]
    job: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override the tools folder from the job file
    #[arg(long)]
    tools_dir: Option<std::path::PathBuf>,

    /// Dry run - show what would be installed without touching any file
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 初始化日誌（dry run 不寫日誌檔）
    let log_file = (!args.dry_run).then(|| Path::new(DEFAULT_LOG_FILE));
    logger::init_cli_logger(args.verbose, None, LogFormat::Compact, log_file);

    tracing::info!("🚀 Starting popcraft batch install");
    tracing::info!("📁 Loading job from: {}", args.job);

    let mut job = match BatchJob::from_file(&args.job) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("❌ Failed to load job file '{}': {}", args.job, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 應用命令列覆蓋設定
    if let Some(dir) = &args.tools_dir {
        job.tools.dir = Some(dir.clone());
        tracing::info!("🔧 Tools folder overridden to: {}", dir.display());
    }

    if let Err(e) = job.validate() {
        tracing::error!("❌ Job validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let config = PopConfig::from_tools_section(&job.tools, Some(job.target.dir.clone()));
    tracing::info!("✅ Job loaded and validated successfully");
    display_job_summary(&job, &config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No files will be written");
        perform_dry_run(&job, &config);
        return Ok(());
    }

    let result = async {
        let mut failed = 0;
        if !job.games.is_empty() {
            let installer = PopsInstaller::new(ProcessRunner, config.clone(), &job.target.dir)
                .with_progress(Arc::new(LogProgress::default()));
            let report = InstallEngine::new(installer).run(&job.games).await?;
            println!("✅ Installed {}/{} games", report.installed.len(), report.total);
            for failure in &report.failed {
                println!("  ❌ {}: {}", failure.path.display(), failure.error);
            }
            failed += report.failed.len();
        }

        if let Some(usb) = &job.usb {
            let report = install_usb_files(&config.tools_dir, &usb.destination).await?;
            println!(
                "🚀 USB files: {} copied, {} unchanged, {} failed",
                report.copied,
                report.skipped,
                report.failed.len()
            );
            failed += report.failed.len();
        }
        Ok::<usize, popcraft::PopError>(failed)
    }
    .await;

    match result {
        Ok(0) => {
            tracing::info!("🎉 Job '{}' completed successfully!", job.job.name);
        }
        Ok(failed) => {
            tracing::warn!("⚠️ Job '{}' finished with {} failures", job.job.name, failed);
            std::process::exit(2);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Job failed: {} (Category: {:?}, Severity: {:?})",
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
    }

    Ok(())
}

fn display_job_summary(job: &BatchJob, config: &PopConfig, args: &Args) {
    println!("📋 Job Summary:");
    println!("  Job: {}", job.job.name);
    if let Some(description) = &job.job.description {
        println!("  Description: {}", description);
    }
    println!("  Tools: {}", config.tools_dir.display());
    println!("  BIOS: {}", config.bios);
    println!("  Target: {}", job.target.dir.display());
    println!("  Games: {}", job.games.len());
    if let Some(usb) = &job.usb {
        println!("  USB destination: {}", usb.destination.display());
    }
    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }
    println!();
}

fn planned_conversion(extension: &str) -> &'static str {
    match extension {
        ".chd" => "chdman extractcd → cue2pops",
        ".cue" | ".bin" => "cue2pops",
        ext if is_image_extension(ext) => "copy as VCD",
        _ => "unsupported",
    }
}

fn perform_dry_run(job: &BatchJob, config: &PopConfig) {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("🎮 Games:");
    for game in &job.games {
        let name = GameName::from_path(&game.path);
        println!("  {}", game.path.display());
        println!("    Title: {}", name.title);
        println!("    Launcher: {}", name.elf_name());
        println!("    Image: POPS/{}", name.vcd_name());
        println!("    Conversion: {}", planned_conversion(&name.extension));
        if let Some(cover) = &game.cover {
            let art = name.cover_name(&extension_of(cover));
            println!("    Cover: {} → ART/{}", cover.display(), art);
        }
        if let Some(logo) = &game.logo {
            let art = name.logo_name(&extension_of(logo));
            println!("    Logo: {} → ART/{}", logo.display(), art);
        }
        if !game.path.is_file() {
            println!("    ⚠️ Source file not found");
        }
    }

    println!();
    println!("🛠️ Tools:");
    let toolchain = Toolchain::new(ProcessRunner, &config.tools_dir);
    for tool in Tool::ALL {
        let mark = if toolchain.is_available(tool) { "✅" } else { "❌" };
        println!("  {} {}", mark, tool);
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");
}
