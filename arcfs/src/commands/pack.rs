use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use arcfs_core::fs::LocalFs;
use arcfs_core::{ArchiveFormat, ArchiveFs, ArchiveOptions, EntryInfo};
use jwalk::WalkDir;

use crate::error::{Error, Result};
use crate::util::entry_name;

pub fn pack(archive: PathBuf, files: Vec<PathBuf>, force: bool) -> Result<()> {
    if files.contains(&archive) {
        return Err(Error::ArchiveSelf { path: archive });
    }

    if archive.exists() {
        if !force {
            return Err(Error::ArchiveExists { path: archive });
        }
        std::fs::remove_file(&archive).map_err(|source| Error::RemoveArchive {
            path: archive.clone(),
            source,
        })?;
    }

    let options = ArchiveOptions {
        format: Some(ArchiveFormat::Zip),
        ..Default::default()
    };
    let fs = ArchiveFs::new(Arc::new(LocalFs), &archive, &options).map_err(|source| {
        Error::OpenArchive {
            path: archive.clone(),
            source,
        }
    })?;

    for path in files {
        if path.is_dir() {
            for entry in WalkDir::new(&path).sort(true).skip_hidden(false) {
                let entry = entry.map_err(|source| Error::ProcessDirEntry { source })?;
                let file_type = entry.file_type();
                if file_type.is_dir() {
                    continue;
                }
                if !file_type.is_file() {
                    tracing::warn!(path = %entry.path().display(), "skipping non-regular file");
                    continue;
                }
                add_file(&fs, &entry.path())?;
            }
        } else {
            add_file(&fs, &path)?;
        }
    }

    let written = fs.finish().map_err(|source| Error::FinishArchive {
        path: archive.clone(),
        source,
    })?;

    match written {
        Some(count) => println!("Wrote {} files to {}", count, archive.display()),
        None => println!("Nothing to write; {} was not created", archive.display()),
    }
    Ok(())
}

fn add_file(fs: &ArchiveFs, path: &Path) -> Result<()> {
    let open_error = |source: std::io::Error| Error::OpenFile {
        path: path.to_path_buf(),
        source,
    };

    let name = match entry_name(path) {
        Some(name) => name,
        None => {
            tracing::warn!(path = %path.display(), "no usable entry name; skipping");
            return Ok(());
        }
    };

    let file = File::open(path).map_err(open_error)?;
    let meta = file.metadata().map_err(open_error)?;
    let info = EntryInfo::new(name, meta.len(), meta.modified().unwrap_or(UNIX_EPOCH));

    let written = fs.put(&info, file).map_err(|source| Error::AddFile {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %written.path, size = written.size, compression = %written.compression, "added");
    Ok(())
}
