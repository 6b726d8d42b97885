use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiskUsage {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

impl DiskUsage {
    pub fn percent_used(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.used as f64 / self.total as f64 * 100.0
        }
    }
}

/// 找出包含 `path` 的磁碟（掛載點前綴最長者）並回報容量
#[cfg(feature = "cli")]
pub fn disk_usage(path: &Path) -> Option<DiskUsage> {
    use sysinfo::Disks;

    let canonical = path.canonicalize().ok()?;
    let disks = Disks::new_with_refreshed_list();

    let disk = disks
        .list()
        .iter()
        .filter(|d| canonical.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())?;

    let total = disk.total_space();
    let free = disk.available_space();
    Some(DiskUsage {
        total,
        used: total.saturating_sub(free),
        free,
    })
}

// 非 CLI 建置不查詢磁碟
#[cfg(not(feature = "cli"))]
pub fn disk_usage(_path: &Path) -> Option<DiskUsage> {
    None
}
