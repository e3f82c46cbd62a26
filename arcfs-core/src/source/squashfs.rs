use std::io::{self, Cursor, Read};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, UNIX_EPOCH};

use backhand::{FilesystemReader, InnerNode, SquashfsFileReader};

use super::{entry_not_found, ArchiveFormat, EntryId, EntryKind, EntrySource, RawEntry, SharedBytes};
use crate::compression::Compression;
use crate::{Error, Result};

/// Chunks buffered between a pump thread and its reader.
const PUMP_DEPTH: usize = 4;
const CHUNK_SIZE: usize = 64 * 1024;

/// A squashfs image held in shared memory.
///
/// Squashfs carries no per-file checksum, and its file readers borrow the
/// filesystem, so every opened stream is fed by its own pump thread.
pub struct SquashfsSource {
    filesystem: Arc<FilesystemReader<'static>>,
    entries: Vec<RawEntry>,
    files: Vec<Option<SquashfsFileReader>>,
}

impl std::fmt::Debug for SquashfsSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SquashfsSource")
            .field("entries", &self.entries)
            .finish()
    }
}

impl SquashfsSource {
    pub fn new(bytes: SharedBytes) -> Result<SquashfsSource> {
        let filesystem =
            FilesystemReader::from_reader(Cursor::new(bytes)).map_err(|e| Error::UnsupportedFormat {
                format: ArchiveFormat::Squashfs,
                source: Box::new(e),
            })?;

        let mut entries = vec![];
        let mut files = vec![];

        for node in filesystem.files() {
            let name = node.fullpath.to_string_lossy().into_owned();
            let modified = UNIX_EPOCH + Duration::from_secs(node.header.mtime as u64);

            let (kind, size, file) = match &node.inner {
                InnerNode::File(file) => (EntryKind::File, file.basic.file_size as u64, Some(file.clone())),
                InnerNode::Dir(_) => (EntryKind::Directory, 0, None),
                _ => {
                    tracing::debug!(%name, "skipping squashfs node that is neither file nor directory");
                    continue;
                }
            };

            entries.push(RawEntry {
                name,
                kind,
                size,
                modified,
                compression: Compression::Stored,
                crc32: None,
                id: EntryId(entries.len()),
            });
            files.push(file);
        }

        tracing::debug!(entries = entries.len(), "read squashfs image");

        Ok(SquashfsSource {
            filesystem: Arc::new(filesystem),
            entries,
            files,
        })
    }
}

impl EntrySource for SquashfsSource {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Squashfs
    }

    fn entries(&self) -> &[RawEntry] {
        &self.entries
    }

    fn open_entry(&self, id: EntryId) -> io::Result<Box<dyn Read + Send>> {
        let file = self
            .files
            .get(id.0)
            .cloned()
            .flatten()
            .ok_or_else(|| entry_not_found(id))?;
        let filesystem = Arc::clone(&self.filesystem);
        let (tx, rx) = flume::bounded(PUMP_DEPTH);

        thread::Builder::new()
            .name("arcfs-squashfs".into())
            .spawn(move || {
                let handle = filesystem.file(&file.basic);
                let mut reader = handle.reader();
                loop {
                    let mut chunk = vec![0u8; CHUNK_SIZE];
                    match reader.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            chunk.truncate(n);
                            if tx.send(Ok(chunk)).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                        Err(e) => {
                            let _ = tx.send(Err(e));
                            break;
                        }
                    }
                }
            })?;

        Ok(Box::new(ChannelReader::new(rx)))
    }
}

/// Reads the chunks a pump thread sends. Dropping it disconnects the channel,
/// which stops the pump at its next send.
struct ChannelReader {
    rx: flume::Receiver<io::Result<Vec<u8>>>,
    chunk: Vec<u8>,
    pos: usize,
}

impl ChannelReader {
    fn new(rx: flume::Receiver<io::Result<Vec<u8>>>) -> Self {
        ChannelReader {
            rx,
            chunk: vec![],
            pos: 0,
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos == self.chunk.len() {
            match self.rx.recv() {
                Ok(Ok(chunk)) => {
                    self.chunk = chunk;
                    self.pos = 0;
                }
                Ok(Err(e)) => return Err(e),
                // Pump finished.
                Err(flume::RecvError::Disconnected) => return Ok(0),
            }
        }

        let n = buf.len().min(self.chunk.len() - self.pos);
        buf[..n].copy_from_slice(&self.chunk[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_reader_reassembles_chunks() {
        let (tx, rx) = flume::bounded(2);
        let pump = thread::spawn(move || {
            for part in [&b"hello "[..], b"squash", b"fs"] {
                tx.send(Ok(part.to_vec())).unwrap();
            }
        });

        let mut out = String::new();
        ChannelReader::new(rx).read_to_string(&mut out).unwrap();
        pump.join().unwrap();
        assert_eq!(out, "hello squashfs");
    }

    #[test]
    fn channel_reader_forwards_errors() {
        let (tx, rx) = flume::bounded(2);
        tx.send(Ok(b"ab".to_vec())).unwrap();
        tx.send(Err(io::Error::new(io::ErrorKind::Other, "bad block"))).unwrap();
        drop(tx);

        let mut out = vec![];
        let err = ChannelReader::new(rx).read_to_end(&mut out).unwrap_err();
        assert_eq!(err.to_string(), "bad block");
        assert_eq!(out, b"ab");
    }

    #[test]
    fn dropping_reader_stops_pump() {
        let (tx, rx) = flume::bounded::<io::Result<Vec<u8>>>(1);
        let pump = thread::spawn(move || {
            let mut sent = 0;
            while tx.send(Ok(vec![0u8; 8])).is_ok() {
                sent += 1;
            }
            sent
        });

        let mut reader = ChannelReader::new(rx);
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf).unwrap();
        drop(reader);
        assert!(pump.join().unwrap() >= 1);
    }
}
