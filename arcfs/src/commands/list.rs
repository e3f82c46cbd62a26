use arcfs_core::{ArchiveFs, HashType, Record};

use super::ViewArgs;
use crate::error::{Error, Result};
use crate::util::{format_path, format_size, format_time};

pub fn list(view: ViewArgs, dir: String, recursive: bool, json: bool) -> Result<()> {
    let fs = view.open()?;

    if !json {
        println!(
            "{:8}  {:>12}  {:20}  {:8}  Path",
            "Method", "Size", "Modified", "CRC32"
        );
        println!("{}", "-".repeat(64));
    }

    let mut pending = vec![dir];
    while let Some(dir) = pending.pop() {
        let records = fs.list(&dir).map_err(|source| Error::List {
            dir: dir.clone(),
            source,
        })?;

        for record in records {
            if json {
                println!("{}", json_line(&fs, record));
            } else {
                println!("{}", table_line(record));
            }
        }

        if recursive {
            // Reversed so that popping visits children in name order.
            pending.extend(
                records
                    .iter()
                    .rev()
                    .filter_map(Record::as_directory)
                    .map(|x| x.path.to_string()),
            );
        }
    }

    Ok(())
}

fn table_line(record: &Record) -> String {
    let time = format_time(record.modified());
    let path = format_path(record);
    match record {
        Record::Directory(_) => {
            format!("{:8}  {:>12}  {:20}  {:8}  {}", "<dir>", "-", time, "-", path)
        }
        Record::File(file) => format!(
            "{:8}  {:>12}  {:20}  {:8}  {}",
            file.compression.to_string(),
            format_size(file.size),
            time,
            file.hash(HashType::Crc32).unwrap_or_else(|| "-".into()),
            path
        ),
    }
}

fn json_line(fs: &ArchiveFs, record: &Record) -> serde_json::Value {
    match record {
        Record::Directory(dir) => serde_json::json!({
            "path": dir.path.as_str(),
            "type": "directory",
            "modified": format_time(dir.modified),
            "synthesized": dir.synthesized,
        }),
        Record::File(file) => {
            let hashes = fs
                .hashes()
                .iter()
                .filter_map(|ty| file.hash(*ty).map(|x| (ty.to_string(), serde_json::Value::from(x))))
                .collect::<serde_json::Map<_, _>>();
            serde_json::json!({
                "path": file.path.as_str(),
                "type": "file",
                "size": file.size,
                "modified": format_time(file.modified),
                "compression": file.compression.to_string(),
                "hashes": hashes,
            })
        }
    }
}
