use std::path::{Component, Path};
use std::time::SystemTime;

use arcfs_core::Record;

pub fn format_time(time: SystemTime) -> String {
    let datetime: chrono::DateTime<chrono::Utc> = time.into();
    datetime.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
}

pub fn format_size(bytes: u64) -> String {
    use humansize::{file_size_opts as options, FileSize};
    bytes
        .file_size(options::BINARY)
        .unwrap_or_else(|_| bytes.to_string())
}

/// Directories get a trailing separator.
pub fn format_path(record: &Record) -> String {
    match record {
        Record::Directory(_) => format!("{}/", record.path()),
        Record::File(_) => record.path().to_string(),
    }
}

/// Turns a path on disk into an entry name: relative, `/`-separated, with
/// leading `.`/`..`/root components dropped.
pub fn entry_name(path: &Path) -> Option<String> {
    let parts = path
        .components()
        .filter_map(|x| match x {
            Component::Normal(x) => Some(x.to_str()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn entry_names() {
        assert_eq!(entry_name(Path::new("a/b/c.txt")).as_deref(), Some("a/b/c.txt"));
        assert_eq!(entry_name(Path::new("./a")).as_deref(), Some("a"));
        assert_eq!(entry_name(Path::new("/abs/path")).as_deref(), Some("abs/path"));
        assert_eq!(entry_name(Path::new("../up")).as_deref(), Some("up"));
        assert_eq!(entry_name(Path::new(".")), None);
    }

    #[test]
    fn times() {
        let t = UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        assert_eq!(format_time(t), "2020-09-13T12:26:40Z");
    }

    #[test]
    fn sizes() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(2048), "2 KiB");
    }
}
