use crate::domain::ports::{
    LineCallback, ProgressReporter, ToolInvocation, ToolOutput, ToolRunner,
};
use crate::utils::error::{PopError, Result};
use crate::utils::fs::{ensure_dir, move_file, remove_dir_if_empty};
use async_trait::async_trait;
use regex::Regex;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::LazyLock;
use tokio::io::{AsyncRead, AsyncReadExt};

static PERCENT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(?:\.\d+)?%").expect("valid percent pattern"));

/// 外部轉檔工具
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Chdman,
    Cue2Pops,
    Pops2Cue,
    Vcd2Iso,
    Ziso,
}

impl Tool {
    pub const ALL: [Tool; 5] = [
        Tool::Chdman,
        Tool::Cue2Pops,
        Tool::Pops2Cue,
        Tool::Vcd2Iso,
        Tool::Ziso,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            Tool::Chdman => "chdman.exe",
            Tool::Cue2Pops => "cue2pops.exe",
            Tool::Pops2Cue => "POPS2CUE.EXE",
            Tool::Vcd2Iso => "vcd2iso.exe",
            Tool::Ziso => "ziso.exe",
        }
    }

    /// 非 Windows 原生版本的檔名（去掉 .exe）
    fn native_name(&self) -> &'static str {
        let name = self.file_name();
        name.strip_suffix(".exe")
            .or_else(|| name.strip_suffix(".EXE"))
            .unwrap_or(name)
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// 以 tokio::process 執行外部工具
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

/// 以 `\r` 或 `\n` 分行讀取（chdman 用 `\r` 更新進度）
async fn read_lines<R: AsyncRead + Unpin>(
    mut reader: R,
    mut on_line: impl FnMut(String),
) -> std::io::Result<()> {
    let mut pending: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        for &byte in &chunk[..n] {
            if byte == b'\n' || byte == b'\r' {
                let line = String::from_utf8_lossy(&pending).trim().to_string();
                if !line.is_empty() {
                    on_line(line);
                }
                pending.clear();
            } else {
                pending.push(byte);
            }
        }
    }
    let line = String::from_utf8_lossy(&pending).trim().to_string();
    if !line.is_empty() {
        on_line(line);
    }
    Ok(())
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        on_line: Option<LineCallback<'_>>,
    ) -> Result<ToolOutput> {
        tracing::debug!(
            "▶️ Executing: {} {}",
            invocation.program.display(),
            invocation
                .args
                .iter()
                .map(|a| a.to_string_lossy())
                .collect::<Vec<_>>()
                .join(" ")
        );

        let mut command = tokio::process::Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &invocation.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn()?;
        let stdout = child.stdout.take().ok_or_else(|| PopError::ProcessingError {
            message: format!("{}: stdout not captured", invocation.tool),
        })?;
        let stderr = child.stderr.take().ok_or_else(|| PopError::ProcessingError {
            message: format!("{}: stderr not captured", invocation.tool),
        })?;

        // stderr 另起任務讀取，避免管線塞滿
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            let mut reader = stderr;
            reader.read_to_end(&mut buf).await.map(|_| buf)
        });

        let mut stdout_lines = Vec::new();
        read_lines(stdout, |line| {
            if let Some(callback) = on_line {
                callback(&line);
            }
            stdout_lines.push(line);
        })
        .await?;

        let status = child.wait().await?;
        let stderr_bytes = stderr_task
            .await
            .map_err(|e| PopError::ProcessingError {
                message: format!("{}: stderr reader failed: {}", invocation.tool, e),
            })??;

        Ok(ToolOutput {
            code: status.code(),
            success: status.success(),
            stdout_lines,
            stderr: String::from_utf8_lossy(&stderr_bytes).trim().to_string(),
        })
    }
}

/// 從一行輸出中取出百分比
pub fn parse_percent(line: &str) -> Option<u8> {
    PERCENT_PATTERN
        .captures(line)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .map(|pct| pct.min(100) as u8)
}

#[derive(Debug, Clone, Copy)]
enum ZisoMode {
    Compress,
    Decompress,
}

/// 工具路徑解析與各種轉檔指令
#[derive(Debug, Clone)]
pub struct Toolchain<R: ToolRunner> {
    runner: R,
    tools_dir: PathBuf,
}

impl<R: ToolRunner> Toolchain<R> {
    pub fn new(runner: R, tools_dir: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            tools_dir: tools_dir.into(),
        }
    }

    pub fn tools_dir(&self) -> &Path {
        &self.tools_dir
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    fn candidate_paths(&self, tool: Tool) -> [PathBuf; 2] {
        [
            self.tools_dir.join(tool.file_name()),
            self.tools_dir.join(tool.native_name()),
        ]
    }

    pub fn is_available(&self, tool: Tool) -> bool {
        self.candidate_paths(tool).iter().any(|p| p.is_file())
    }

    pub fn resolve(&self, tool: Tool) -> Result<PathBuf> {
        let [primary, native] = self.candidate_paths(tool);
        if primary.is_file() {
            Ok(primary)
        } else if native.is_file() {
            Ok(native)
        } else {
            Err(PopError::ToolNotFound {
                tool: tool.file_name().to_string(),
                path: primary,
            })
        }
    }

    async fn invoke(
        &self,
        tool: Tool,
        program: PathBuf,
        args: Vec<OsString>,
        cwd: Option<PathBuf>,
        on_line: Option<LineCallback<'_>>,
    ) -> Result<ToolOutput> {
        let invocation = ToolInvocation {
            tool: tool.file_name().to_string(),
            program,
            args,
            cwd,
        };
        self.runner.run(&invocation, on_line).await
    }

    /// 執行工具，非零結束碼視為失敗
    async fn run_checked(
        &self,
        tool: Tool,
        args: Vec<OsString>,
        cwd: Option<PathBuf>,
        on_line: Option<LineCallback<'_>>,
    ) -> Result<ToolOutput> {
        let program = self.resolve(tool)?;
        let output = self.invoke(tool, program, args, cwd, on_line).await?;
        if !output.success {
            return Err(PopError::ToolFailed {
                tool: tool.file_name().to_string(),
                code: output.code,
                stderr: output.stderr,
            });
        }
        Ok(output)
    }

    /// `chdman extractcd -i <chd> -o <cue> -ob <bin>`，並回報進度
    pub async fn chd_extract(
        &self,
        chd: &Path,
        cue: &Path,
        bin: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<()> {
        let label = format!(
            "Extracting {}",
            chd.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
        );
        tracing::info!("▶️ {}...", label);
        progress.progress(&label, 0);

        let last_pct = AtomicU8::new(0);
        let on_line = |line: &str| {
            if let Some(pct) = parse_percent(line) {
                if last_pct.swap(pct, Ordering::Relaxed) != pct {
                    progress.progress(&label, pct);
                    tracing::debug!("   {}", line);
                }
            } else if line.contains("Extracting") || line.contains("Writing") || line.contains("Creating") {
                tracing::info!("   {}", line);
            }
        };

        let args = vec![
            "extractcd".into(),
            "-i".into(),
            chd.into(),
            "-o".into(),
            cue.into(),
            "-ob".into(),
            bin.into(),
        ];
        self.run_checked(Tool::Chdman, args, None, Some(&on_line)).await?;
        progress.progress(&label, 100);
        tracing::info!("✅ Extraction finished: {}", chd.display());
        Ok(())
    }

    /// `chdman extractcd -i <chd> -o <gdi>`
    pub async fn chd_extract_gdi(&self, chd: &Path, gdi: &Path) -> Result<()> {
        tracing::info!("▶️ Converting {} → GDI...", chd.display());
        let args = vec!["extractcd".into(), "-i".into(), chd.into(), "-o".into(), gdi.into()];
        self.run_checked(Tool::Chdman, args, None, None).await?;
        tracing::info!("✅ GDI created: {}", gdi.display());
        Ok(())
    }

    /// `chdman createcd -i <cue|gdi> -o <chd>`
    pub async fn chd_create(&self, input: &Path, chd: &Path) -> Result<()> {
        tracing::info!("▶️ Converting {} → {}...", input.display(), chd.display());
        let args = vec!["createcd".into(), "-i".into(), input.into(), "-o".into(), chd.into()];
        self.run_checked(Tool::Chdman, args, None, None).await?;
        tracing::info!("✅ CHD created: {}", chd.display());
        Ok(())
    }

    /// `cue2pops <cue> <vcd>`
    pub async fn cue_to_vcd(&self, cue: &Path, vcd: &Path) -> Result<()> {
        tracing::info!("▶️ Converting {} → VCD...", cue.display());
        let args = vec![cue.into(), vcd.into()];
        self.run_checked(Tool::Cue2Pops, args, None, None).await?;
        tracing::info!("✅ VCD created: {}", vcd.display());
        Ok(())
    }

    /// `POPS2CUE <vcd>`：結束碼不可靠，只檢查旁邊是否產生了 .cue 與 .bin
    pub async fn vcd_to_cue_bin(&self, vcd: &Path) -> Result<(PathBuf, PathBuf)> {
        let program = self.resolve(Tool::Pops2Cue)?;
        let cwd = vcd.parent().map(Path::to_path_buf);
        tracing::info!("▶️ Converting {} → CUE+BIN...", vcd.display());

        let on_line = |line: &str| tracing::debug!("   {}", line);
        let output = self
            .invoke(Tool::Pops2Cue, program, vec![vcd.into()], cwd, Some(&on_line))
            .await?;

        let cue = vcd.with_extension("cue");
        let bin = vcd.with_extension("bin");
        if cue.is_file() && bin.is_file() {
            tracing::info!("✅ Generated: {} + {}", cue.display(), bin.display());
            return Ok((cue, bin));
        }

        tracing::error!(
            "❌ {} did not produce {} + {} (output: {})",
            Tool::Pops2Cue,
            cue.display(),
            bin.display(),
            output.stdout_lines.join(" | ")
        );
        let missing = if cue.is_file() { bin } else { cue };
        Err(PopError::OutputMissing { path: missing })
    }

    /// `vcd2iso <vcd> <iso>`
    pub async fn vcd_to_iso(&self, vcd: &Path, iso: &Path) -> Result<()> {
        tracing::info!("▶️ Converting {} → ISO...", vcd.display());
        let args = vec![vcd.into(), iso.into()];
        self.run_checked(Tool::Vcd2Iso, args, None, None).await?;
        tracing::info!("✅ ISO created: {}", iso.display());
        Ok(())
    }

    pub async fn iso_to_zso(&self, iso: &Path, zso: &Path) -> Result<()> {
        self.run_ziso_isolated(ZisoMode::Compress, iso, zso).await
    }

    pub async fn zso_to_iso(&self, zso: &Path, iso: &Path) -> Result<()> {
        self.run_ziso_isolated(ZisoMode::Decompress, zso, iso).await
    }

    /// ziso 在輸入檔旁的 ISO/、ZSO/ 暫存資料夾中執行；
    /// 不論成敗都會把輸入檔搬回原處
    async fn run_ziso_isolated(&self, mode: ZisoMode, input: &Path, output: &Path) -> Result<()> {
        let ziso = self.resolve(Tool::Ziso)?;
        if !input.is_file() {
            return Err(PopError::FileNotFound {
                path: input.to_path_buf(),
            });
        }
        if let Some(parent) = output.parent() {
            ensure_dir(parent)?;
        }

        let work_root = input.parent().unwrap_or_else(|| Path::new("."));
        let iso_dir = work_root.join("ISO");
        let zso_dir = work_root.join("ZSO");
        let (input_dir, output_dir, output_ext) = match mode {
            ZisoMode::Compress => (&iso_dir, &zso_dir, "zso"),
            ZisoMode::Decompress => (&zso_dir, &iso_dir, "iso"),
        };
        ensure_dir(&iso_dir)?;
        ensure_dir(&zso_dir)?;

        let file_name = input.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        let temp_input = input_dir.join(&file_name);
        let temp_tool = input_dir.join(ziso.file_name().map(|n| n.to_os_string()).unwrap_or_default());
        let temp_output = output_dir
            .join(Path::new(&file_name).with_extension(output_ext));

        tracing::info!("📁 Moving {} into isolated work dir", input.display());
        move_file(input, &temp_input)?;

        let result = async {
            std::fs::copy(&ziso, &temp_tool)?;
            let args: Vec<OsString> = match mode {
                ZisoMode::Compress => vec!["-c9".into(), temp_input.clone().into(), temp_output.clone().into()],
                ZisoMode::Decompress => vec![
                    "-c".into(),
                    "0".into(),
                    temp_input.clone().into(),
                    temp_output.clone().into(),
                ],
            };
            let on_line = |line: &str| tracing::debug!("   {}", line);
            let out = self
                .invoke(Tool::Ziso, temp_tool.clone(), args, Some(input_dir.clone()), Some(&on_line))
                .await?;
            if !out.success {
                return Err(PopError::ToolFailed {
                    tool: Tool::Ziso.file_name().to_string(),
                    code: out.code,
                    stderr: out.stderr,
                });
            }
            if !temp_output.is_file() {
                return Err(PopError::OutputMissing {
                    path: temp_output.clone(),
                });
            }
            move_file(&temp_output, output)
        }
        .await;

        // 還原輸入檔並清理暫存環境
        if temp_input.exists() && !input.exists() {
            move_file(&temp_input, input)?;
        }
        if temp_tool.exists() {
            std::fs::remove_file(&temp_tool)?;
        }
        match &result {
            Ok(()) => {
                remove_dir_if_empty(&iso_dir)?;
                remove_dir_if_empty(&zso_dir)?;
                tracing::info!("✅ {} created", output.display());
            }
            Err(e) => {
                tracing::error!("❌ ziso conversion failed: {}", e);
                let _ = std::fs::remove_dir_all(&iso_dir);
                let _ = std::fs::remove_dir_all(&zso_dir);
            }
        }
        result
    }
}
