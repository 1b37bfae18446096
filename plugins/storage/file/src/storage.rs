use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::future::Future;
use std::io::{BufRead, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tokio::sync::Mutex;

use logsink_api::{Collection, LogRecord, StoreError};

use crate::format::{complete_prefix_len, encode_batch, parse_line};

/// Newest documents kept in memory to answer `find_latest` without a scan.
pub(crate) const RECENT_CAPACITY: usize = 1024;

// ════════════════════════════════════════════════════════════════
//  FileCollection
// ════════════════════════════════════════════════════════════════

struct FileState {
    next_seq: u64,
    count: u64,
    /// End of the last acknowledged insert. Bytes past it are not documents.
    len: u64,
    /// Newest documents, oldest first.
    recent: VecDeque<LogRecord>,
}

impl FileState {
    fn remember(&mut self, docs: impl IntoIterator<Item = LogRecord>) {
        for doc in docs {
            if self.recent.len() == RECENT_CAPACITY {
                self.recent.pop_front();
            }
            self.recent.push_back(doc);
        }
    }

    /// Newest first, or `None` when the cache cannot answer `limit`.
    fn latest_cached(&self, limit: usize) -> Option<Vec<LogRecord>> {
        let holds_all = self.recent.len() as u64 == self.count;
        if limit <= self.recent.len() || holds_all {
            Some(self.recent.iter().rev().take(limit).cloned().collect())
        } else {
            None
        }
    }
}

/// Append-only JSON-lines collection: `{dir}/{name}.jsonl`.
///
/// Every bulk insert is encoded into one buffer, written at the end of the
/// last acknowledged insert and synced before the call returns. A failed
/// write is cut back off the file, so a batch lands whole or not at all.
///
/// Readers hold the state mutex only long enough to snapshot the
/// acknowledged length. File scans then run without it, bounded to that
/// length, and never observe a batch still being written.
pub struct FileCollection {
    name: String,
    path: PathBuf,
    state: Mutex<FileState>,
}

impl FileCollection {
    /// Open (or create) the collection file and recover the sequence counter.
    pub(crate) async fn open(name: &str, dir: &Path) -> Result<Self, StoreError> {
        let path = dir.join(format!("{name}.jsonl"));
        let replay_path = path.clone();
        let replayed = blocking("open", move || replay(&replay_path)).await?;

        tracing::debug!(
            collection = %name,
            path = %path.display(),
            count = replayed.count,
            bytes = replayed.len,
            "opened file collection"
        );
        Ok(Self {
            name: name.to_string(),
            path,
            state: Mutex::new(FileState {
                next_seq: replayed.last_seq + 1,
                count: replayed.count,
                len: replayed.len,
                recent: replayed.recent,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Collection for FileCollection {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert_many(
        &self,
        docs: Vec<LogRecord>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move {
            if docs.is_empty() {
                return Ok(());
            }

            let mut state = self.state.lock().await;
            let buf = encode_batch(state.next_seq, &docs)?;
            let written = buf.len() as u64;
            let at = state.len;
            let path = self.path.clone();
            blocking("insert_many", move || append_at(&path, at, &buf))
                .await
                .map_err(|e| e.with_context(&self.name))?;

            state.len = at + written;
            state.next_seq += docs.len() as u64;
            state.count += docs.len() as u64;
            state.remember(docs);
            Ok(())
        })
    }

    fn find_latest(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>, StoreError>> + Send + '_>> {
        Box::pin(async move {
            let len = {
                let state = self.state.lock().await;
                if let Some(hit) = state.latest_cached(limit) {
                    return Ok(hit);
                }
                state.len
            };

            let path = self.path.clone();
            blocking("find_latest", move || {
                let mut tail: VecDeque<LogRecord> = VecDeque::with_capacity(limit.min(RECENT_CAPACITY));
                scan(&path, len, |doc| {
                    if tail.len() == limit {
                        tail.pop_front();
                    }
                    tail.push_back(doc);
                    true
                })?;
                Ok(tail.into_iter().rev().collect())
            })
            .await
            .map_err(|e| e.with_context(&self.name))
        })
    }

    fn exists_by<'a>(
        &'a self,
        field: &'a str,
        value: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<bool, StoreError>> + Send + 'a>> {
        Box::pin(async move {
            let len = self.state.lock().await.len;
            let path = self.path.clone();
            let field = field.to_string();
            let value = value.to_string();
            blocking("exists_by", move || {
                let mut found = false;
                scan(&path, len, |doc| {
                    found = doc.field_equals(&field, &value);
                    !found
                })?;
                Ok(found)
            })
            .await
            .map_err(|e| e.with_context(&self.name))
        })
    }

    fn count(&self) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(async move { Ok(self.state.lock().await.count) })
    }
}

// ════════════════════════════════════════════════════════════════
//  Helpers
// ════════════════════════════════════════════════════════════════

/// Run blocking file I/O off the async workers.
pub(crate) async fn blocking<T, F>(op: &'static str, f: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StoreError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| StoreError::new(format!("{op}: blocking task failed: {e}")))?
}

/// Write `buf` at offset `at` and sync. Anything already past `at` is
/// leftover from a write that was never acknowledged and gets replaced.
/// On failure the file is cut back to `at`.
pub(crate) fn append_at(path: &Path, at: u64, buf: &[u8]) -> Result<(), StoreError> {
    let mut f = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(path)
        .map_err(|e| StoreError::io(format!("open {}: {e}", path.display())))?;

    let on_disk = f
        .metadata()
        .map_err(|e| StoreError::io(format!("stat {}: {e}", path.display())))?
        .len();
    if on_disk < at {
        return Err(StoreError::format(format!(
            "{}: file is {on_disk} bytes, expected at least {at}",
            path.display()
        )));
    }
    if on_disk > at {
        tracing::warn!(
            path = %path.display(),
            dropped_bytes = on_disk - at,
            "discarding unacknowledged bytes at end of collection file"
        );
    }

    if let Err(e) = write_synced(&mut f, at, buf) {
        if let Err(undo) = f.set_len(at).and_then(|()| f.sync_data()) {
            tracing::error!(path = %path.display(), error = %undo, "could not roll back failed insert");
        }
        return Err(e);
    }
    Ok(())
}

fn write_synced(f: &mut File, at: u64, buf: &[u8]) -> Result<(), StoreError> {
    f.set_len(at).map_err(|e| StoreError::io(format!("truncate: {e}")))?;
    f.seek(SeekFrom::Start(at))
        .map_err(|e| StoreError::io(format!("seek: {e}")))?;
    f.write_all(buf).map_err(|e| StoreError::io(format!("write: {e}")))?;
    f.sync_data().map_err(|e| StoreError::io(format!("sync: {e}")))
}

/// Feed every document in the first `len` bytes to `visit` in file order
/// until it returns `false`. A missing file is an empty collection.
fn scan(path: &Path, len: u64, mut visit: impl FnMut(LogRecord) -> bool) -> Result<(), StoreError> {
    let f = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(StoreError::io(format!("open {}: {e}", path.display()))),
    };

    for (i, line) in std::io::BufReader::new(f.take(len)).lines().enumerate() {
        let line = line.map_err(|e| StoreError::io(format!("read line: {e}")))?;
        if line.is_empty() {
            continue;
        }
        let disk = parse_line(&line, i + 1)?;
        if !visit(disk.doc) {
            break;
        }
    }
    Ok(())
}

/// What `replay` recovers from an existing file.
struct Replayed {
    last_seq: u64,
    count: u64,
    len: u64,
    recent: VecDeque<LogRecord>,
}

/// Validate an existing file and recover the collection state.
///
/// A trailing line without its newline is a torn write; it is cut off so
/// the next append starts on a clean line.
fn replay(path: &Path) -> Result<Replayed, StoreError> {
    let mut replayed = Replayed {
        last_seq: 0,
        count: 0,
        len: 0,
        recent: VecDeque::new(),
    };
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(replayed),
        Err(e) => return Err(StoreError::io(format!("read {}: {e}", path.display()))),
    };

    let complete = complete_prefix_len(&bytes);
    if complete < bytes.len() {
        tracing::warn!(
            path = %path.display(),
            dropped_bytes = bytes.len() - complete,
            "truncating torn write at end of collection file"
        );
        let f = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| StoreError::io(format!("open {}: {e}", path.display())))?;
        f.set_len(complete as u64)
            .map_err(|e| StoreError::io(format!("truncate: {e}")))?;
        f.sync_data().map_err(|e| StoreError::io(format!("sync: {e}")))?;
    }

    let text = std::str::from_utf8(&bytes[..complete])
        .map_err(|e| StoreError::format(format!("{}: {e}", path.display())))?;

    for (i, line) in text.lines().enumerate() {
        if line.is_empty() {
            continue;
        }
        let disk = parse_line(line, i + 1).map_err(|e| e.with_context(path.display()))?;
        if disk.seq <= replayed.last_seq {
            return Err(StoreError::format(format!(
                "{}: line {}: sequence {} not after {}",
                path.display(),
                i + 1,
                disk.seq,
                replayed.last_seq
            )));
        }
        replayed.last_seq = disk.seq;
        replayed.count += 1;
        if replayed.recent.len() == RECENT_CAPACITY {
            replayed.recent.pop_front();
        }
        replayed.recent.push_back(disk.doc);
    }
    replayed.len = complete as u64;
    Ok(replayed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_replaces_unacknowledged_tail() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.jsonl");
        std::fs::write(&path, b"{\"seq\":1,\"doc\":{}}\n{\"seq\":2,\"do").unwrap();

        append_at(&path, 19, b"{\"seq\":2,\"doc\":{}}\n").unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"seq\":1,\"doc\":{}}\n{\"seq\":2,\"doc\":{}}\n"
        );
    }

    #[test]
    fn append_refuses_a_file_shorter_than_acknowledged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.jsonl");
        std::fs::write(&path, b"{}\n").unwrap();

        assert!(append_at(&path, 100, b"{}\n").is_err());
        assert_eq!(std::fs::read(&path).unwrap(), b"{}\n");
    }

    #[test]
    fn scan_stops_at_acknowledged_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.jsonl");
        std::fs::write(
            &path,
            b"{\"seq\":1,\"doc\":{\"n\":1}}\n{\"seq\":2,\"doc\":{\"n\":2}}\ngarbage",
        )
        .unwrap();

        let mut seen = Vec::new();
        scan(&path, 24, |doc| {
            seen.push(doc.get("n").cloned());
            true
        })
        .unwrap();
        assert_eq!(seen, vec![Some(serde_json::json!(1))]);
    }
}
