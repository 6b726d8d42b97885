use crate::domain::model::{GameSource, InstalledGame};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<PathBuf>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    /// 外部工具與 POPS.ELF / BIOS / VMC 所在的資料夾
    fn tools_dir(&self) -> &Path;
    fn bios_name(&self) -> &str;
}

/// 一次外部程式呼叫
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// 顯示用名稱，例如 chdman.exe
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    pub code: Option<i32>,
    pub success: bool,
    pub stdout_lines: Vec<String>,
    pub stderr: String,
}

pub type LineCallback<'a> = &'a (dyn Fn(&str) + Send + Sync);

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// 執行工具並把每一行非空輸出交給 `on_line`
    async fn run(
        &self,
        invocation: &ToolInvocation,
        on_line: Option<LineCallback<'_>>,
    ) -> Result<ToolOutput>;
}

pub trait ProgressReporter: Send + Sync {
    fn progress(&self, label: &str, percent: u8);
}

/// 不回報進度
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn progress(&self, _label: &str, _percent: u8) {}
}

#[async_trait]
pub trait Installer: Send + Sync {
    /// 批次開始前的檢查與共用檔案
    async fn prepare(&self) -> Result<()>;
    async fn install(&self, game: &GameSource) -> Result<InstalledGame>;
}
