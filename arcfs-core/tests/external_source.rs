//! Views over entry lists decoded outside this crate.

use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use arcfs_core::fs::LocalFs;
use arcfs_core::{
    ArchiveFormat, ArchiveFs, ArchiveOptions, Compression, EntryId, EntryKind, EntrySource, Error,
    RawEntry,
};
use tempfile::TempDir;

/// A squashfs-like image whose entries are decoded by the host.
#[derive(Debug)]
struct Image {
    entries: Vec<RawEntry>,
    contents: Vec<Vec<u8>>,
}

impl Image {
    fn new(items: &[(&str, Option<&[u8]>)]) -> Image {
        let mut entries = vec![];
        let mut contents = vec![];
        for (i, (name, content)) in items.iter().enumerate() {
            let data = content.map(|x| x.to_vec()).unwrap_or_default();
            entries.push(RawEntry {
                name: name.to_string(),
                kind: if content.is_some() {
                    EntryKind::File
                } else {
                    EntryKind::Directory
                },
                size: data.len() as u64,
                modified: UNIX_EPOCH + Duration::from_secs(1_500_000_000),
                compression: Compression::Stored,
                crc32: None,
                id: EntryId(i),
            });
            contents.push(data);
        }
        Image { entries, contents }
    }
}

impl EntrySource for Image {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Squashfs
    }

    fn entries(&self) -> &[RawEntry] {
        &self.entries
    }

    fn open_entry(&self, id: EntryId) -> io::Result<Box<dyn Read + Send>> {
        let content = self
            .contents
            .get(id.0)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no such inode"))?;
        Ok(Box::new(Cursor::new(content)))
    }
}

fn image() -> Arc<dyn EntrySource> {
    Arc::new(Image::new(&[
        ("/", None),
        ("/etc", None),
        ("/etc/hostname", Some(b"box\n")),
        ("/usr/share/doc/readme", Some(b"read me first")),
    ]))
}

#[test]
fn squashfs_like_listing() {
    let fs = ArchiveFs::from_source("image.sqfs", image(), &ArchiveOptions::default()).unwrap();
    println!("{}", fs);

    assert_eq!(fs.format(), ArchiveFormat::Squashfs);
    assert!(fs.hashes().is_empty());

    let top: Vec<_> = fs.list("").unwrap().iter().map(|x| x.name()).collect();
    assert_eq!(top, vec!["etc", "usr"]);

    let record = fs.resolve("etc/hostname").unwrap();
    assert_eq!(record.size, 4);
    assert_eq!(record.hash(arcfs_core::HashType::Crc32), None);

    let mut out = String::new();
    fs.open("usr/share/doc/readme", 5, None)
        .unwrap()
        .read_to_string(&mut out)
        .unwrap();
    assert_eq!(out, "me first");
}

#[test]
fn squashfs_like_rooted() {
    let options = ArchiveOptions {
        root: "usr/share".into(),
        ..Default::default()
    };
    let fs = ArchiveFs::from_source("image.sqfs", image(), &options).unwrap();
    let top: Vec<_> = fs.list("").unwrap().iter().map(|x| x.name()).collect();
    assert_eq!(top, vec!["doc"]);
    assert!(matches!(fs.resolve("etc/hostname"), Err(Error::NotFound(_))));
}

#[test]
fn rejects_truncated_squashfs() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("image.sqfs");
    std::fs::write(&path, b"hsqs").unwrap();

    let result = ArchiveFs::new(Arc::new(LocalFs), &path, &ArchiveOptions::default());
    assert!(matches!(
        result,
        Err(Error::UnsupportedFormat {
            format: ArchiveFormat::Squashfs,
            ..
        })
    ));
}
