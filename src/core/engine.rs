use crate::domain::model::{FailedGame, GameSource, InstallReport};
use crate::domain::ports::Installer;
use crate::utils::error::Result;

pub struct InstallEngine<I: Installer> {
    installer: I,
}

impl<I: Installer> InstallEngine<I> {
    pub fn new(installer: I) -> Self {
        Self { installer }
    }

    pub fn installer(&self) -> &I {
        &self.installer
    }

    /// 先準備共用檔案，再逐一安裝；單一遊戲失敗不中斷整批
    pub async fn run(&self, games: &[GameSource]) -> Result<InstallReport> {
        let mut report = InstallReport {
            total: games.len(),
            ..Default::default()
        };

        tracing::info!("▶️ Processing {} games...", games.len());
        self.installer.prepare().await?;

        for (index, game) in games.iter().enumerate() {
            tracing::info!("🎮 Game {}/{}: {}", index + 1, games.len(), game.path.display());
            match self.installer.install(game).await {
                Ok(installed) => {
                    tracing::info!("✅ Installed '{}' as {}", installed.title, installed.elf_name);
                    report.installed.push(installed);
                }
                Err(e) => {
                    tracing::error!("❌ {}: {}", game.path.display(), e);
                    report.failed.push(FailedGame {
                        path: game.path.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "🎉 {}/{} games processed!",
            report.installed.len(),
            report.total
        );
        Ok(report)
    }
}
