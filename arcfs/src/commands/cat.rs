use std::io::{self, Read, Write};

use super::ViewArgs;
use crate::error::{Error, Result};

pub fn cat(view: ViewArgs, path: String, offset: u64, count: Option<u64>) -> Result<()> {
    let fs = view.open()?;
    let read_error = |source: arcfs_core::Error| Error::ReadEntry {
        path: path.clone(),
        source,
    };

    let mut reader = fs.open(&path, offset, count).map_err(read_error)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut buf = vec![0u8; 64 * 1024];
    let mut copied = 0u64;

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(e.into())),
        };
        out.write_all(&buf[..n])
            .map_err(|source| Error::WriteOutput { source })?;
        copied += n as u64;
    }
    out.flush().map_err(|source| Error::WriteOutput { source })?;

    tracing::debug!(%path, copied, "done");
    Ok(())
}
