#![allow(dead_code)]

use async_trait::async_trait;
use popcraft::core::tools::Tool;
use popcraft::domain::ports::{LineCallback, ToolInvocation, ToolOutput, ToolRunner};
use popcraft::PopConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 模擬外部工具：記錄每次呼叫並產生真實工具會寫出的檔案
#[derive(Clone, Default)]
pub struct FakeRunner {
    calls: Arc<Mutex<Vec<ToolInvocation>>>,
    failing: Arc<Mutex<Vec<String>>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// 讓指定工具回傳非零結束碼且不產生檔案
    pub fn fail(&self, tool: Tool) {
        self.failing.lock().unwrap().push(tool.file_name().to_string());
    }

    pub fn calls(&self) -> Vec<ToolInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub fn tools_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.tool).collect()
    }
}

fn arg(invocation: &ToolInvocation, index: usize) -> PathBuf {
    PathBuf::from(&invocation.args[index])
}

fn write(path: &Path, data: &[u8]) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, data).unwrap();
}

#[async_trait]
impl ToolRunner for FakeRunner {
    async fn run(
        &self,
        invocation: &ToolInvocation,
        on_line: Option<LineCallback<'_>>,
    ) -> popcraft::Result<ToolOutput> {
        self.calls.lock().unwrap().push(invocation.clone());

        if self.failing.lock().unwrap().contains(&invocation.tool) {
            return Ok(ToolOutput {
                code: Some(1),
                success: false,
                stdout_lines: vec![],
                stderr: "simulated failure".to_string(),
            });
        }

        let args: Vec<String> = invocation
            .args
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        match invocation.tool.as_str() {
            "chdman.exe" if args[0] == "extractcd" && args.len() == 7 => {
                if let Some(cb) = on_line {
                    cb("Extracting, 50.0% complete...");
                    cb("Extracting, 100.0% complete...");
                }
                write(&arg(invocation, 4), b"FILE \"game.bin\" BINARY\n");
                write(&arg(invocation, 6), b"BIN-DATA");
            }
            "chdman.exe" if args[0] == "extractcd" => write(&arg(invocation, 4), b"GDI"),
            "chdman.exe" => write(&arg(invocation, 4), b"CHD"),
            "cue2pops.exe" => write(&arg(invocation, 1), b"VCD-DATA"),
            "POPS2CUE.EXE" => {
                let vcd = arg(invocation, 0);
                write(&vcd.with_extension("cue"), b"CUE");
                write(&vcd.with_extension("bin"), b"BIN");
            }
            "vcd2iso.exe" => write(&arg(invocation, 1), b"ISO-DATA"),
            "ziso.exe" => {
                let output = PathBuf::from(args.last().unwrap());
                write(&output, b"ZISO-OUT");
            }
            other => panic!("unexpected tool {}", other),
        }

        Ok(ToolOutput {
            code: Some(0),
            success: true,
            stdout_lines: vec![],
            stderr: String::new(),
        })
    }
}

/// 建立含 POPS.ELF、BIOS、VMC 與所有工具的資料夾
pub fn tools_dir(root: &Path) -> PathBuf {
    let dir = root.join("tools");
    write(&dir.join("POPS.ELF"), b"POPS-ELF");
    write(&dir.join("BIOS.BIN"), b"BIOS");
    write(&dir.join("SLOT0.VMC"), b"VMC0");
    write(&dir.join("SLOT1.VMC"), b"VMC1");
    for tool in Tool::ALL {
        write(&dir.join(tool.file_name()), b"");
    }
    dir
}

pub fn config(tools: &Path, target: &Path) -> PopConfig {
    PopConfig::new(
        Some(tools.to_path_buf()),
        Some("BIOS.BIN".to_string()),
        Some(target.to_path_buf()),
    )
}

pub fn touch(path: &Path, data: &[u8]) -> PathBuf {
    write(path, data);
    path.to_path_buf()
}
