use std::io::{self, Cursor, Read};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use chrono::{NaiveDate, TimeZone, Utc};
use zip::{ExtraField, ZipArchive};

use super::{entry_not_found, ArchiveFormat, EntryId, EntryKind, EntrySource, RawEntry, SharedBytes};
use crate::checksum::Crc32Reader;
use crate::compression::Compression;
use crate::path::is_directory_name;
use crate::{Error, Result};

/// Where an entry's raw (possibly compressed) bytes live in the archive.
#[derive(Debug, Clone, Copy)]
struct DataSpan {
    start: u64,
    len: u64,
}

/// A zip archive held in shared memory.
///
/// The central directory is read once at construction. Each opened entry
/// decodes its own span of the shared bytes, so any number of entries can be
/// streamed at once.
#[derive(Debug)]
pub struct ZipSource {
    bytes: SharedBytes,
    entries: Vec<RawEntry>,
    spans: Vec<DataSpan>,
    verify_checksums: bool,
}

impl ZipSource {
    pub fn new(bytes: SharedBytes, verify_checksums: bool) -> Result<ZipSource> {
        let mut archive =
            ZipArchive::new(Cursor::new(bytes.clone())).map_err(|e| Error::UnsupportedFormat {
                format: ArchiveFormat::Zip,
                source: Box::new(e),
            })?;

        let mut entries = Vec::with_capacity(archive.len());
        let mut spans = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let file = match archive.by_index_raw(index) {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(index, error = %e, "skipping unreadable zip entry");
                    continue;
                }
            };

            let name = file.name().to_string();
            let start = file.data_start();
            let compressed_size = file.compressed_size();
            let size = file.size();
            let crc32 = file.crc32();
            let compression = Compression::from_zip(file.compression());
            let modified = extended_mod_time(file.extra_data_fields())
                .or_else(|| file.last_modified().and_then(zip_datetime_to_system_time))
                .unwrap_or(UNIX_EPOCH);
            drop(file);

            if start.saturating_add(compressed_size) > bytes.len() as u64 {
                tracing::warn!(%name, start, compressed_size, "skipping zip entry extending past end of archive");
                continue;
            }

            let kind = if is_directory_name(&name) {
                EntryKind::Directory
            } else {
                EntryKind::File
            };

            tracing::trace!(%name, size, %compression, "zip entry");

            entries.push(RawEntry {
                name,
                kind,
                size,
                modified,
                compression,
                crc32: Some(crc32),
                id: EntryId(entries.len()),
            });
            spans.push(DataSpan {
                start,
                len: compressed_size,
            });
        }

        tracing::debug!(entries = entries.len(), bytes = bytes.len(), "read zip central directory");

        Ok(ZipSource {
            bytes,
            entries,
            spans,
            verify_checksums,
        })
    }
}

impl EntrySource for ZipSource {
    fn format(&self) -> ArchiveFormat {
        ArchiveFormat::Zip
    }

    fn entries(&self) -> &[RawEntry] {
        &self.entries
    }

    fn open_entry(&self, id: EntryId) -> io::Result<Box<dyn Read + Send>> {
        let entry = self.entries.get(id.0).ok_or_else(|| entry_not_found(id))?;
        let span = self.spans.get(id.0).ok_or_else(|| entry_not_found(id))?;

        let mut cursor = Cursor::new(self.bytes.clone());
        cursor.set_position(span.start);
        let stream = entry.compression.decompress(cursor.take(span.len))?;

        match entry.crc32.filter(|_| self.verify_checksums) {
            Some(crc32) => Ok(Box::new(Crc32Reader::verifying(stream, crc32))),
            None => Ok(stream),
        }
    }
}

/// The whole-second modification time from an extended timestamp field.
fn extended_mod_time<'a>(mut fields: impl Iterator<Item = &'a ExtraField>) -> Option<SystemTime> {
    let secs = fields.find_map(|field| match field {
        ExtraField::ExtendedTimestamp(ts) => ts.mod_time(),
        _ => None,
    })?;
    Some(UNIX_EPOCH + Duration::from_secs(secs as u64))
}

/// Zip timestamps carry no zone; they are read as UTC.
fn zip_datetime_to_system_time(value: zip::DateTime) -> Option<SystemTime> {
    let naive = NaiveDate::from_ymd_opt(value.year() as i32, value.month() as u32, value.day() as u32)?
        .and_hms_opt(value.hour() as u32, value.minute() as u32, value.second() as u32)?;
    Some(Utc.from_utc_datetime(&naive).into())
}
