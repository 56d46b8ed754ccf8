//! Volume capacity statistics.

use std::io;
use std::path::Path;

use protocol::DriveStats;

use super::format::format_size;

/// Capacity of the filesystem holding a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskUsage {
    /// Total capacity in bytes.
    pub total: u64,
    /// Bytes in use.
    pub used: u64,
    /// Bytes available to unprivileged users.
    pub free: u64,
}

impl DiskUsage {
    /// Used share of the volume in percent, rounded to one decimal.
    pub fn used_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.used as f64 / self.total as f64 * 1000.0).round() / 10.0
    }
}

/// Capacity of a volume, or the fact that it could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeStats {
    /// Statistics were read successfully.
    Known(DiskUsage),
    /// Statistics are unavailable for this volume.
    Unknown,
}

impl VolumeStats {
    /// Read statistics for `path`, degrading to [`VolumeStats::Unknown`].
    pub fn for_path(path: &Path) -> Self {
        match disk_usage(path) {
            Ok(usage) => Self::Known(usage),
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "Volume statistics unavailable"
                );
                Self::Unknown
            }
        }
    }

    /// Convert to the wire representation.
    pub fn to_protocol(&self) -> DriveStats {
        match self {
            Self::Known(usage) => DriveStats::Known {
                total_bytes: usage.total,
                free_bytes: usage.free,
                used_percent: usage.used_percent(),
                total_fmt: format_size(usage.total),
                free_fmt: format_size(usage.free),
            },
            Self::Unknown => DriveStats::Unknown,
        }
    }
}

/// Query the capacity of the filesystem holding `path`.
#[cfg(unix)]
pub fn disk_usage(path: &Path) -> io::Result<DiskUsage> {
    let stat = nix::sys::statvfs::statvfs(path).map_err(io::Error::from)?;

    let fragment = stat.fragment_size() as u64;
    let total = stat.blocks() as u64 * fragment;
    let free = stat.blocks_available() as u64 * fragment;
    let used = total.saturating_sub(stat.blocks_free() as u64 * fragment);

    Ok(DiskUsage { total, used, free })
}

/// Capacity queries are only implemented for Unix-like systems.
#[cfg(not(unix))]
pub fn disk_usage(_path: &Path) -> io::Result<DiskUsage> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "disk usage is not available on this platform",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_used_percent() {
        let usage = DiskUsage {
            total: 1000,
            used: 333,
            free: 667,
        };
        assert_eq!(usage.used_percent(), 33.3);

        let empty = DiskUsage {
            total: 0,
            used: 0,
            free: 0,
        };
        assert_eq!(empty.used_percent(), 0.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_disk_usage_of_temp_dir() {
        let temp_dir = TempDir::new().unwrap();
        let usage = disk_usage(temp_dir.path()).unwrap();
        assert!(usage.total > 0);
        assert!(usage.free <= usage.total);
    }

    #[test]
    fn test_missing_path_is_unknown() {
        let temp_dir = TempDir::new().unwrap();
        let stats = VolumeStats::for_path(&temp_dir.path().join("no-such-volume"));
        assert_eq!(stats, VolumeStats::Unknown);
        assert_eq!(stats.to_protocol(), DriveStats::Unknown);
    }

    #[test]
    fn test_known_stats_to_protocol() {
        let stats = VolumeStats::Known(DiskUsage {
            total: 2048,
            used: 1024,
            free: 1024,
        });

        match stats.to_protocol() {
            DriveStats::Known {
                used_percent,
                total_fmt,
                free_fmt,
                ..
            } => {
                assert_eq!(used_percent, 50.0);
                assert_eq!(total_fmt, "2.00 KB");
                assert_eq!(free_fmt, "1.00 KB");
            }
            DriveStats::Unknown => panic!("expected known stats"),
        }
    }
}
