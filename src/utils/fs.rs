use crate::utils::error::Result;
use std::fs;
use std::io::Read;
use std::path::Path;

pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// 複製單一檔案，來源不存在時視為無事可做
pub fn copy_file(src: &Path, dest: &Path) -> Result<bool> {
    if !src.is_file() {
        tracing::debug!("Skipping copy, source missing: {}", src.display());
        return Ok(false);
    }
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    fs::copy(src, dest)?;
    Ok(true)
}

/// 搬移檔案；跨磁碟時改為複製後刪除
pub fn move_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        ensure_dir(parent)?;
    }
    if fs::rename(src, dest).is_err() {
        fs::copy(src, dest)?;
        fs::remove_file(src)?;
    }
    Ok(())
}

/// 兩個路徑是否指向同一個檔案（解析相對路徑與連結）；任一方不存在時為 false
pub fn is_same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(ca), Ok(cb)) => ca == cb,
        _ => false,
    }
}

/// 資料夾存在且為空時刪除
pub fn remove_dir_if_empty(path: &Path) -> Result<()> {
    if path.is_dir() && fs::read_dir(path)?.next().is_none() {
        fs::remove_dir(path)?;
    }
    Ok(())
}

/// 先比大小，再逐塊比對內容
pub fn files_identical(a: &Path, b: &Path) -> Result<bool> {
    let (meta_a, meta_b) = match (fs::metadata(a), fs::metadata(b)) {
        (Ok(ma), Ok(mb)) => (ma, mb),
        _ => return Ok(false),
    };
    if !meta_a.is_file() || !meta_b.is_file() || meta_a.len() != meta_b.len() {
        return Ok(false);
    }

    let mut fa = fs::File::open(a)?;
    let mut fb = fs::File::open(b)?;
    let mut buf_a = vec![0u8; 64 * 1024];
    let mut buf_b = vec![0u8; 64 * 1024];
    loop {
        let n = fa.read(&mut buf_a)?;
        if n == 0 {
            return Ok(true);
        }
        fb.read_exact(&mut buf_b[..n])?;
        if buf_a[..n] != buf_b[..n] {
            return Ok(false);
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyStats {
    pub copied: usize,
    pub skipped: usize,
}

impl CopyStats {
    fn absorb(&mut self, other: CopyStats) {
        self.copied += other.copied;
        self.skipped += other.skipped;
    }
}

/// 遞迴合併資料夾：已存在的目錄會合併，內容相同的檔案會略過
pub fn copy_tree(src: &Path, dst: &Path) -> Result<CopyStats> {
    let mut stats = CopyStats::default();
    ensure_dir(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dst.join(entry.file_name());

        if from.is_dir() {
            stats.absorb(copy_tree(&from, &to)?);
        } else if to.exists() && files_identical(&from, &to)? {
            tracing::debug!("Skipped (identical): {}", to.display());
            stats.skipped += 1;
        } else {
            fs::copy(&from, &to)?;
            stats.copied += 1;
        }
    }

    Ok(stats)
}

/// 檔案大小的易讀格式（KB / MB / GB）
pub fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    const MIB: u64 = 1024 * 1024;
    const GIB: u64 = 1024 * 1024 * 1024;

    let b = bytes as f64;
    if bytes < MIB {
        format!("{:.1} KB", b / KIB)
    } else if bytes < GIB {
        format!("{:.1} MB", b / MIB as f64)
    } else {
        format!("{:.1} GB", b / GIB as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_copy_tree_merges_and_skips_identical() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("src");
        let dst = temp.path().join("dst");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("same.txt"), b"same").unwrap();
        fs::write(src.join("changed.txt"), b"new").unwrap();
        fs::write(src.join("nested/inner.bin"), b"inner").unwrap();

        fs::create_dir_all(&dst).unwrap();
        fs::write(dst.join("same.txt"), b"same").unwrap();
        fs::write(dst.join("changed.txt"), b"old").unwrap();
        fs::write(dst.join("keep.txt"), b"untouched").unwrap();

        let stats = copy_tree(&src, &dst).unwrap();

        assert_eq!(stats, CopyStats { copied: 2, skipped: 1 });
        assert_eq!(fs::read(dst.join("changed.txt")).unwrap(), b"new");
        assert_eq!(fs::read(dst.join("nested/inner.bin")).unwrap(), b"inner");
        assert_eq!(fs::read(dst.join("keep.txt")).unwrap(), b"untouched");
    }

    #[test]
    fn test_files_identical_detects_same_size_difference() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::write(&a, b"abcd").unwrap();
        fs::write(&b, b"abce").unwrap();
        assert!(!files_identical(&a, &b).unwrap());
        fs::write(&b, b"abcd").unwrap();
        assert!(files_identical(&a, &b).unwrap());
        assert!(!files_identical(&a, &temp.path().join("missing")).unwrap());
    }

    #[test]
    fn test_is_same_file_resolves_aliases() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("game.VCD");
        fs::write(&file, b"vcd").unwrap();
        fs::create_dir_all(temp.path().join("sub")).unwrap();

        assert!(is_same_file(&file, &temp.path().join("sub/../game.VCD")));
        assert!(!is_same_file(&file, &temp.path().join("sub/game.VCD")));
        assert!(!is_same_file(&temp.path().join("a"), &temp.path().join("a")));
    }

    #[test]
    fn test_copy_file_missing_source_is_noop() {
        let temp = TempDir::new().unwrap();
        let copied = copy_file(&temp.path().join("nope"), &temp.path().join("out/x")).unwrap();
        assert!(!copied);
        assert!(!temp.path().join("out").exists());
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(512), "0.5 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(human_size(3 * 1024 * 1024 * 1024 / 2), "1.5 GB");
    }
}
