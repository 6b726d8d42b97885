use crate::core::conf_apps::{elf_file_of_target, ConfApps};
use crate::domain::model::ExportFormat;
use crate::domain::ports::Storage;
use crate::utils::error::{PopError, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Game Name")]
    pub name: String,
    #[serde(rename = "ELF File")]
    pub elf: String,
}

/// conf_apps.cfg 的所有項目，依檔案順序
pub fn collect_rows(target_dir: &Path) -> Result<Vec<ExportRow>> {
    let conf_path = ConfApps::path_in(target_dir);
    if !conf_path.exists() {
        return Err(PopError::EmptyLibrary {
            path: target_dir.to_path_buf(),
        });
    }
    let conf = ConfApps::load(&conf_path)?;
    Ok(conf
        .entries()
        .map(|(title, target)| ExportRow {
            name: title.to_string(),
            elf: elf_file_of_target(target),
        })
        .collect())
}

pub fn render_csv(rows: &[ExportRow]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        writer.write_record(["Game Name", "ELF File"])?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .into_inner()
        .map_err(|e| PopError::ProcessingError {
            message: format!("CSV writer flush failed: {}", e),
        })
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

const STYLE: &str = "body{font-family:Arial,sans-serif;background:#222;color:#eee;margin:40px;}\
h1{color:#4a90e2;}\
table{width:100%;border-collapse:collapse;margin-top:20px;}\
th,td{padding:12px;border:1px solid #444;text-align:left;}\
th{background:#333;}\
tr:nth-child(even){background:#2a2a2a;}";

pub fn render_html(rows: &[ExportRow], generated_at: &str) -> String {
    let mut html = format!(
        "<!DOCTYPE html><html><head><title>POPStarter Games</title><meta charset=\"UTF-8\">\
<style>{}</style></head><body><h1>🎮 Game List</h1><p>Generated: {}</p>\
<table><tr><th>Game Name</th><th>ELF File</th></tr>",
        STYLE,
        escape_html(generated_at)
    );
    for row in rows {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td></tr>",
            escape_html(&row.name),
            escape_html(&row.elf)
        ));
    }
    html.push_str("</table></body></html>");
    html
}

/// 匯出遊戲清單，`file_name` 為空時使用格式預設檔名
pub async fn export_games<S: Storage>(
    storage: &S,
    target_dir: &Path,
    format: ExportFormat,
    file_name: Option<&str>,
) -> Result<PathBuf> {
    let rows = collect_rows(target_dir)?;
    let data = match format {
        ExportFormat::Csv => render_csv(&rows)?,
        ExportFormat::Html => {
            let now = chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string();
            render_html(&rows, &now).into_bytes()
        }
    };

    let name = file_name.unwrap_or_else(|| format.default_file_name());
    let path = storage.write_file(name, &data).await?;
    tracing::info!("📊 Exported {} games to {}", rows.len(), path.display());
    Ok(path)
}
