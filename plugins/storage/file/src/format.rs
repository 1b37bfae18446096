// ════════════════════════════════════════════════════════════════
//  On-disk document format
// ════════════════════════════════════════════════════════════════

use logsink_api::{LogRecord, StoreError};

/// One line of `<collection>.jsonl`.
#[derive(serde::Serialize, serde::Deserialize)]
pub(crate) struct DiskDocument {
    /// Insertion sequence number, strictly increasing within a file.
    pub seq: u64,
    pub doc: LogRecord,
}

/// Serialize documents into one newline-terminated buffer, numbering them
/// from `first_seq`.
pub(crate) fn encode_batch(first_seq: u64, docs: &[LogRecord]) -> Result<Vec<u8>, StoreError> {
    let mut buf = Vec::new();
    for (i, doc) in docs.iter().enumerate() {
        let line = DiskDocument {
            seq: first_seq + i as u64,
            doc: doc.clone(),
        };
        serde_json::to_writer(&mut buf, &line)
            .map_err(|e| StoreError::format(format!("json serialize: {e}")))?;
        buf.push(b'\n');
    }
    Ok(buf)
}

pub(crate) fn parse_line(line: &str, line_no: usize) -> Result<DiskDocument, StoreError> {
    serde_json::from_str(line)
        .map_err(|e| StoreError::format(format!("line {line_no}: {e}")))
}

/// Length of the prefix of `bytes` that ends with a newline. Anything after
/// it is a torn write from an interrupted insert.
pub(crate) fn complete_prefix_len(bytes: &[u8]) -> usize {
    match bytes.iter().rposition(|b| *b == b'\n') {
        Some(pos) => pos + 1,
        None => 0,
    }
}
