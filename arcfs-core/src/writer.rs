//! Append-only zip writing with an explicit finish.

use std::collections::HashSet;
use std::io::{self, Read, Seek, Write};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Datelike, Timelike, Utc};
use zip::result::ZipError;
use zip::write::FullFileOptions;
use zip::ZipWriter;

use crate::checksum::Crc32Reader;
use crate::compression::Compression;
use crate::path::ArchivePath;
use crate::{Error, Result};

/// What the caller knows about an entry before its content is streamed.
#[derive(Debug, Clone)]
pub struct EntryInfo {
    pub name: String,
    /// `None` when the length is not known up front, which cannot be written.
    pub size: Option<u64>,
    pub modified: SystemTime,
}

impl EntryInfo {
    pub fn new(name: impl Into<String>, size: u64, modified: SystemTime) -> Self {
        EntryInfo {
            name: name.into(),
            size: Some(size),
            modified,
        }
    }
}

/// Header id of the extended timestamp extra field.
const EXTENDED_TIMESTAMP: u16 = 0x5455;

/// An entry as recorded in the archive. `modified` is the time as stored,
/// truncated to whole seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenEntry {
    pub path: ArchivePath,
    pub size: u64,
    pub modified: SystemTime,
    pub compression: Compression,
    pub crc32: u32,
}

/// The result of finalizing a session.
#[derive(Debug)]
pub struct Finished<W> {
    pub entries: usize,
    pub sink: W,
}

/// Produces the output sink, called once when the first entry is accepted.
pub trait SinkFactory: Send {
    type Sink: Write + Seek + Send;

    fn create(&mut self) -> io::Result<Self::Sink>;
}

impl<F, W> SinkFactory for F
where
    F: FnMut() -> io::Result<W> + Send,
    W: Write + Seek + Send,
{
    type Sink = W;

    fn create(&mut self) -> io::Result<W> {
        self()
    }
}

/// An open zip stream. Entries can only be appended, and the archive is only
/// readable once `finish` has written the central directory.
pub struct OpenSession<W: Write + Seek> {
    zip: ZipWriter<W>,
    names: HashSet<ArchivePath>,
}

/// A validated entry, ready to be appended.
struct Prepared {
    path: ArchivePath,
    size: u64,
}

fn prepare(info: &EntryInfo) -> Result<Prepared> {
    let size = info.size.ok_or_else(|| Error::UnknownSize(info.name.clone()))?;
    let path = ArchivePath::new_entry(&info.name).map_err(|e| Error::invalid_path(&info.name, e))?;
    Ok(Prepared { path, size })
}

/// Whether a failed append left the session usable (`Rejected`) or not.
enum AppendError {
    Rejected(Error),
    Aborted(Error),
}

impl<W: Write + Seek> OpenSession<W> {
    pub fn new(sink: W) -> Self {
        OpenSession {
            zip: ZipWriter::new(sink),
            names: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Streams exactly `info.size` bytes of `content` into a new entry.
    pub fn append<R: Read>(&mut self, info: &EntryInfo, content: R) -> Result<WrittenEntry> {
        let prepared = prepare(info)?;
        self.append_prepared(prepared, info.modified, content)
            .map_err(|e| match e {
                AppendError::Rejected(e) | AppendError::Aborted(e) => e,
            })
    }

    fn append_prepared<R: Read>(
        &mut self,
        prepared: Prepared,
        modified: SystemTime,
        content: R,
    ) -> std::result::Result<WrittenEntry, AppendError> {
        let Prepared { path, size } = prepared;

        if self.names.contains(&path) {
            return Err(AppendError::Rejected(Error::PathConflict { path }));
        }

        let compression = Compression::for_size(size);
        let method = compression
            .to_zip()
            .ok_or(AppendError::Rejected(Error::WriteNotSupported("this compression method")))?;
        let secs = stored_secs(modified);
        let mut options = FullFileOptions::default()
            .compression_method(method)
            .last_modified_time(zip_datetime(secs))
            .large_file(size >= u32::MAX as u64);
        options
            .add_extra_data(EXTENDED_TIMESTAMP, extended_timestamp(secs), false)
            .map_err(|e| AppendError::Rejected(e.into()))?;

        if let Err(e) = self.zip.start_file(path.as_str(), options) {
            let e = match e {
                ZipError::Io(e) => write_error(&path, size, 0, e),
                e => e.into(),
            };
            return Err(AppendError::Aborted(e));
        }

        let mut hashing = Crc32Reader::new(content.take(size));
        let copied = match io::copy(&mut hashing, &mut self.zip) {
            Ok(copied) => copied,
            Err(e) => {
                self.abort_entry(&path);
                let actual = hashing.bytes_read();
                return Err(AppendError::Aborted(write_error(&path, size, actual, e)));
            }
        };

        if copied < size {
            self.abort_entry(&path);
            return Err(AppendError::Aborted(Error::ShortRead {
                path: path.to_string(),
                expected: size,
                actual: copied,
            }));
        }

        tracing::debug!(%path, size, %compression, "appended entry");

        self.names.insert(path.clone());
        Ok(WrittenEntry {
            path,
            size,
            modified: UNIX_EPOCH + Duration::from_secs(secs as u64),
            compression,
            crc32: hashing.crc32(),
        })
    }

    fn abort_entry(&mut self, path: &ArchivePath) {
        if let Err(e) = self.zip.abort_file() {
            tracing::warn!(%path, error = %e, "could not discard partial entry");
        }
    }

    /// Writes the central directory and flushes the sink.
    pub fn finish(self) -> Result<Finished<W>> {
        let entries = self.names.len();
        let mut sink = self.zip.finish()?;
        sink.flush()?;
        tracing::debug!(entries, "finished archive");
        Ok(Finished { entries, sink })
    }
}

/// A sink that stops accepting bytes is a short write; other failures are
/// passed through.
fn write_error(path: &ArchivePath, expected: u64, actual: u64, e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::WriteZero {
        Error::ShortWrite {
            path: path.to_string(),
            expected,
            actual,
        }
    } else {
        e.into()
    }
}

/// Seconds since the epoch as an extended timestamp holds them: unsigned 32
/// bits, so earlier times become the epoch and later ones the last second
/// representable.
fn stored_secs(time: SystemTime) -> u32 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => u32::try_from(elapsed.as_secs()).unwrap_or(u32::MAX),
        Err(_) => 0,
    }
}

/// Extended timestamp field data carrying only the modification time.
fn extended_timestamp(secs: u32) -> Box<[u8]> {
    let mut data = Vec::with_capacity(5);
    data.push(1);
    data.extend_from_slice(&secs.to_le_bytes());
    data.into_boxed_slice()
}

/// The DOS date and time stored alongside the extended timestamp. It has
/// two-second resolution and starts in 1980; earlier times are clamped to
/// that. Every `u32` second falls before the end of its range in 2107.
fn zip_datetime(secs: u32) -> zip::DateTime {
    let time: DateTime<Utc> = (UNIX_EPOCH + Duration::from_secs(secs as u64)).into();
    let year = match u16::try_from(time.year()) {
        Ok(year) if year >= 1980 => year,
        _ => return zip::DateTime::default(),
    };
    zip::DateTime::from_date_and_time(
        year,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    )
    .unwrap_or_default()
}

enum Session<F: SinkFactory> {
    Idle(F),
    Open(OpenSession<F::Sink>),
    Failed(OpenSession<F::Sink>),
    Closed,
}

/// Lifecycle of an `ArchiveWriter`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Nothing written yet; no sink has been created.
    Idle,
    Open,
    /// An entry failed mid-stream. No further entries are accepted.
    Failed,
    Closed,
}

/// A zip session shared between writers.
///
/// The sink is created lazily when the first entry is accepted. Entries are
/// appended one at a time in the order their `put` calls take the lock.
///
/// `finish` must be called to produce a readable archive. Dropping an
/// unfinished writer logs a warning; the archive is then not guaranteed to be
/// complete and any error while closing it is lost.
pub struct ArchiveWriter<F: SinkFactory> {
    session: Mutex<Session<F>>,
}

impl<F: SinkFactory> ArchiveWriter<F> {
    pub fn new(factory: F) -> Self {
        ArchiveWriter {
            session: Mutex::new(Session::Idle(factory)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session<F>>> {
        // A panic mid-entry leaves the archive in an unknown state.
        self.session.lock().map_err(|_| Error::SessionFailed)
    }

    pub fn state(&self) -> SessionState {
        match self.lock().as_deref() {
            Ok(Session::Idle(_)) => SessionState::Idle,
            Ok(Session::Open(_)) => SessionState::Open,
            Ok(Session::Failed(_)) | Err(_) => SessionState::Failed,
            Ok(Session::Closed) => SessionState::Closed,
        }
    }

    /// Appends one entry, opening the session first if needed.
    ///
    /// The entry's size must be known. If `content` ends early or the sink
    /// fails, the partial entry is discarded and the session stops accepting
    /// entries.
    pub fn put<R: Read>(&self, info: &EntryInfo, content: R) -> Result<WrittenEntry> {
        let prepared = prepare(info)?;
        let mut session = self.lock()?;

        let mut open = match std::mem::replace(&mut *session, Session::Closed) {
            Session::Idle(mut factory) => match factory.create() {
                Ok(sink) => {
                    tracing::debug!("opened write session");
                    OpenSession::new(sink)
                }
                Err(e) => {
                    *session = Session::Idle(factory);
                    return Err(e.into());
                }
            },
            Session::Open(open) => open,
            Session::Failed(open) => {
                *session = Session::Failed(open);
                return Err(Error::SessionFailed);
            }
            Session::Closed => return Err(Error::WriteNotSupported("writing after finish")),
        };

        match open.append_prepared(prepared, info.modified, content) {
            Ok(entry) => {
                *session = Session::Open(open);
                Ok(entry)
            }
            Err(AppendError::Rejected(e)) => {
                *session = Session::Open(open);
                Err(e)
            }
            Err(AppendError::Aborted(e)) => {
                tracing::warn!(name = %info.name, error = %e, "write session failed");
                *session = Session::Failed(open);
                Err(e)
            }
        }
    }

    /// Finalizes the archive. Entries that completed before a failure are kept.
    ///
    /// Returns `None` if nothing was ever written or the session was already
    /// finished; calling this repeatedly is harmless.
    pub fn finish(&self) -> Result<Option<Finished<F::Sink>>> {
        let mut session = self.lock()?;
        match std::mem::replace(&mut *session, Session::Closed) {
            Session::Open(open) | Session::Failed(open) => open.finish().map(Some),
            Session::Idle(_) => {
                tracing::debug!("finish with no entries written");
                Ok(None)
            }
            Session::Closed => {
                tracing::debug!("write session already finished");
                Ok(None)
            }
        }
    }
}

impl<F: SinkFactory> Drop for ArchiveWriter<F> {
    fn drop(&mut self) {
        let unfinished = match self.session.get_mut() {
            Ok(session) => matches!(session, Session::Open(_) | Session::Failed(_)),
            Err(_) => true,
        };
        if unfinished {
            tracing::warn!("archive writer dropped without finish; archive may be incomplete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::namespace::Namespace;
    use crate::path::RootConfig;
    use crate::source::{EntrySource, SharedBytes, ZipSource};

    fn memory_writer() -> ArchiveWriter<impl SinkFactory<Sink = Cursor<Vec<u8>>>> {
        ArchiveWriter::new(|| Ok::<_, io::Error>(Cursor::new(Vec::<u8>::new())))
    }

    fn time(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn reopen(bytes: Vec<u8>) -> Namespace {
        let source: Arc<dyn EntrySource> =
            Arc::new(ZipSource::new(SharedBytes::from_vec(bytes), true).unwrap());
        Namespace::build(&source, &RootConfig::default()).unwrap()
    }

    fn read(ns: &Namespace, path: &str) -> Vec<u8> {
        let mut out = vec![];
        crate::reader::open(ns.resolve(path).unwrap(), 0, None)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn round_trip() {
        let writer = memory_writer();
        assert_eq!(writer.state(), SessionState::Idle);

        let files: Vec<(String, Vec<u8>)> = (0..5)
            .map(|i| (format!("dir{}/file{}.txt", i % 2, i), vec![b'a' + i as u8; i * 7]))
            .collect();

        for (name, content) in &files {
            let info = EntryInfo::new(name.clone(), content.len() as u64, time(1_600_000_000));
            let written = writer.put(&info, &content[..]).unwrap();
            assert_eq!(written.crc32, crc32fast::hash(content));
            assert_eq!(written.compression, Compression::for_size(content.len() as u64));
        }
        assert_eq!(writer.state(), SessionState::Open);

        let finished = writer.finish().unwrap().unwrap();
        assert_eq!(finished.entries, 5);
        assert_eq!(writer.state(), SessionState::Closed);

        let ns = reopen(finished.sink.into_inner());
        for (name, content) in &files {
            let record = ns.resolve(name).unwrap();
            assert_eq!(record.size, content.len() as u64);
            assert_eq!(record.modified, time(1_600_000_000));
            assert_eq!(&read(&ns, name), content);
        }
    }

    #[test]
    fn unknown_size() {
        let writer = memory_writer();
        let info = EntryInfo {
            name: "x".into(),
            size: None,
            modified: UNIX_EPOCH,
        };
        assert!(matches!(writer.put(&info, &b"abc"[..]), Err(Error::UnknownSize(_))));
        assert_eq!(writer.state(), SessionState::Idle);
        assert!(writer.finish().unwrap().is_none());
    }

    #[test]
    fn short_read_fails_session() {
        let writer = memory_writer();
        writer
            .put(&EntryInfo::new("ok.txt", 3, UNIX_EPOCH), &b"abc"[..])
            .unwrap();

        let err = writer
            .put(&EntryInfo::new("short.bin", 100, UNIX_EPOCH), &[7u8; 50][..])
            .unwrap_err();
        println!("{}", err);
        assert!(matches!(
            err,
            Error::ShortRead {
                expected: 100,
                actual: 50,
                ..
            }
        ));
        assert_eq!(writer.state(), SessionState::Failed);

        let again = writer.put(&EntryInfo::new("later", 1, UNIX_EPOCH), &b"z"[..]);
        assert!(matches!(again, Err(Error::SessionFailed)));

        let finished = writer.finish().unwrap().unwrap();
        assert_eq!(finished.entries, 1);
    }

    #[test]
    fn surplus_content_is_not_written() {
        let writer = memory_writer();
        writer
            .put(&EntryInfo::new("f", 4, UNIX_EPOCH), &b"abcdefgh"[..])
            .unwrap();
        let ns = reopen(writer.finish().unwrap().unwrap().sink.into_inner());
        assert_eq!(read(&ns, "f"), b"abcd");
    }

    #[test]
    fn rejected_names_keep_session_usable() {
        let writer = memory_writer();
        writer.put(&EntryInfo::new("a", 1, UNIX_EPOCH), &b"1"[..]).unwrap();

        let dup = writer.put(&EntryInfo::new("./a", 1, UNIX_EPOCH), &b"2"[..]);
        assert!(matches!(dup, Err(Error::PathConflict { .. })));
        let root = writer.put(&EntryInfo::new("/", 0, UNIX_EPOCH), &b""[..]);
        assert!(matches!(root, Err(Error::InvalidPath { .. })));

        assert_eq!(writer.state(), SessionState::Open);
        writer.put(&EntryInfo::new("b", 1, UNIX_EPOCH), &b"3"[..]).unwrap();
        assert_eq!(writer.finish().unwrap().unwrap().entries, 2);
    }

    #[test]
    fn finish_is_idempotent() {
        let writer = memory_writer();
        writer.put(&EntryInfo::new("a", 1, UNIX_EPOCH), &b"1"[..]).unwrap();

        let first = writer.finish().unwrap();
        assert!(first.is_some());
        assert!(writer.finish().unwrap().is_none());

        let late = writer.put(&EntryInfo::new("b", 1, UNIX_EPOCH), &b"2"[..]);
        assert!(matches!(late, Err(Error::WriteNotSupported(_))));

        let ns = reopen(first.unwrap().sink.into_inner());
        assert_eq!(ns.files().count(), 1);
    }

    #[test]
    fn concurrent_puts() {
        let writer = Arc::new(memory_writer());

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let writer = Arc::clone(&writer);
                thread::spawn(move || {
                    let content = format!("content of entry number {}", i).into_bytes();
                    let info = EntryInfo::new(format!("t/{}", i), content.len() as u64, UNIX_EPOCH);
                    writer.put(&info, &content[..]).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let finished = writer.finish().unwrap().unwrap();
        assert_eq!(finished.entries, 8);
        let ns = reopen(finished.sink.into_inner());
        assert_eq!(ns.list("t").unwrap().len(), 8);
        assert_eq!(read(&ns, "t/3"), b"content of entry number 3");
    }

    #[test]
    fn typestate_session() {
        let mut session = OpenSession::new(Cursor::new(vec![]));
        session
            .append(&EntryInfo::new("x/y.txt", 12, time(1_600_000_002)), &b"hello, world"[..])
            .unwrap();
        assert_eq!(session.len(), 1);
        let finished = session.finish().unwrap();
        let ns = reopen(finished.sink.into_inner());
        assert_eq!(read(&ns, "x/y.txt"), b"hello, world");
    }

    #[test]
    fn clamps_old_timestamps() {
        let dt = zip_datetime(0);
        assert_eq!(dt.year(), 1980);
        let dt = zip_datetime(1_600_000_000);
        assert_eq!((dt.year(), dt.month(), dt.day()), (2020, 9, 13));
    }

    #[test]
    fn clamps_late_timestamps() {
        let late = time(5_000_000_000);
        assert_eq!(stored_secs(late), u32::MAX);
        let dt = zip_datetime(stored_secs(late));
        assert_eq!((dt.year(), dt.month(), dt.day()), (2106, 2, 7));

        let writer = memory_writer();
        let written = writer.put(&EntryInfo::new("late", 1, late), &b"z"[..]).unwrap();
        assert_eq!(written.modified, time(u32::MAX as u64));

        let ns = reopen(writer.finish().unwrap().unwrap().sink.into_inner());
        assert_eq!(ns.resolve("late").unwrap().modified, time(u32::MAX as u64));
    }

    #[test]
    fn keeps_odd_seconds() {
        let writer = memory_writer();
        let odd = time(1_600_000_001) + Duration::from_millis(700);
        let written = writer.put(&EntryInfo::new("odd", 2, odd), &b"hi"[..]).unwrap();
        assert_eq!(written.modified, time(1_600_000_001));

        let early = UNIX_EPOCH + Duration::from_secs(86_400 * 365);
        writer.put(&EntryInfo::new("1971", 1, early), &b"x"[..]).unwrap();

        let ns = reopen(writer.finish().unwrap().unwrap().sink.into_inner());
        assert_eq!(ns.resolve("odd").unwrap().modified, written.modified);
        assert_eq!(ns.resolve("1971").unwrap().modified, early);
    }

    /// Accepts `room` bytes, then reports that nothing more fits.
    struct FullSink {
        inner: Cursor<Vec<u8>>,
        room: u64,
    }

    impl Write for FullSink {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let left = self.room.saturating_sub(self.inner.position()) as usize;
            let n = buf.len().min(left);
            self.inner.write(&buf[..n])
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for FullSink {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn full_sink_is_a_short_write() {
        for room in [0, 45] {
            let writer = ArchiveWriter::new(move || {
                Ok::<_, io::Error>(FullSink {
                    inner: Cursor::new(vec![]),
                    room,
                })
            });
            let err = writer
                .put(&EntryInfo::new("f", 9, UNIX_EPOCH), &b"123456789"[..])
                .unwrap_err();
            println!("{}", err);
            assert!(matches!(err, Error::ShortWrite { expected: 9, .. }));
            assert_eq!(writer.state(), SessionState::Failed);
        }
    }
}
