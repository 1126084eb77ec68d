//! Diagnostic tail of a worker's stderr log.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::error::MediaResult;

/// Bytes read from the end of the log; worker logs are append-only and grow unbounded.
const TAIL_WINDOW_BYTES: u64 = 64 * 1024;

/// Read the last `lines` non-empty lines of a log file.
///
/// A missing log yields an empty tail. Invalid UTF-8 is replaced.
pub async fn read_log_tail(path: impl AsRef<Path>, lines: usize) -> MediaResult<Vec<String>> {
    if lines == 0 {
        return Ok(Vec::new());
    }

    let mut file = match File::open(path.as_ref()).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata().await?.len();
    let start = len.saturating_sub(TAIL_WINDOW_BYTES);
    file.seek(SeekFrom::Start(start)).await?;

    let mut buf = Vec::with_capacity((len - start) as usize);
    file.read_to_end(&mut buf).await?;
    let text = String::from_utf8_lossy(&buf);

    let mut all: Vec<&str> = text.lines().collect();
    // The window may start mid-line
    if start > 0 && !all.is_empty() {
        all.remove(0);
    }

    let tail: Vec<String> = all
        .into_iter()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect();

    let skip = tail.len().saturating_sub(lines);
    Ok(tail.into_iter().skip(skip).collect())
}
