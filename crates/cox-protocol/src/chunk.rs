//! Line chunking for the write path
//!
//! The remote side reads the transport line by line with a fixed-size
//! buffer, so no emitted line may exceed 128 bytes. Over-long lines are
//! split; framer commands mark every non-final chunk with a literal
//! trailing backslash, which the remote reassembler strips. Non-framer
//! commands are split with no marker.

/// Maximum bytes per emitted line, including the continuation marker
pub const MAX_LINE_BYTES: usize = 128;

/// Continuation marker appended to non-final chunks of framer commands.
/// This is a literal byte, not an escape sequence.
pub const FRAMER_CONTINUATION: &str = "\\";

/// Split a single line into chunks no longer than `limit` bytes.
///
/// Every chunk except the last carries the continuation marker; the marker
/// counts against the limit. Splits land on char boundaries.
pub fn chunk_line(line: &str, limit: usize, continuation: &str) -> Vec<String> {
    if line.len() <= limit {
        return vec![line.to_string()];
    }

    let body = limit.saturating_sub(continuation.len()).max(1);
    let mut chunks = Vec::new();
    let mut rest = line;

    while rest.len() > limit {
        let mut cut = body.min(rest.len());
        while !rest.is_char_boundary(cut) {
            cut -= 1;
        }
        let (head, tail) = rest.split_at(cut);
        chunks.push(format!("{}{}", head, continuation));
        rest = tail;
    }
    chunks.push(rest.to_string());
    chunks
}

/// Chunk every line of a newline-separated record.
///
/// The result carries no trailing newline; the dispatcher appends exactly
/// one when it transmits.
pub fn chunked_record(record: &str, limit: usize, continuation: &str) -> String {
    record
        .split('\n')
        .flat_map(|line| chunk_line(line, limit, continuation))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Undo chunking the way the remote reassembler does: strip the marker
    /// from continuation chunks and concatenate.
    fn reassemble(chunks: &[String], continuation: &str) -> String {
        let mut out = String::new();
        for (i, chunk) in chunks.iter().enumerate() {
            if i + 1 < chunks.len() && !continuation.is_empty() {
                out.push_str(chunk.strip_suffix(continuation).unwrap());
            } else {
                out.push_str(chunk);
            }
        }
        out
    }

    #[test]
    fn test_short_line_passthrough() {
        let chunks = chunk_line("poll", MAX_LINE_BYTES, FRAMER_CONTINUATION);
        assert_eq!(chunks, vec!["poll".to_string()]);
    }

    #[test]
    fn test_long_framer_line_splits() {
        let line = "x".repeat(300);
        let chunks = chunk_line(&line, MAX_LINE_BYTES, FRAMER_CONTINUATION);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.len() <= MAX_LINE_BYTES);
        }
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with('\\'));
        }
        assert_eq!(reassemble(&chunks, FRAMER_CONTINUATION), line);
    }

    #[test]
    fn test_long_plain_line_splits_without_marker() {
        let line = "y".repeat(200);
        let chunks = chunk_line(&line, MAX_LINE_BYTES, "");

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), line);
    }

    #[test]
    fn test_exact_limit_not_split() {
        let line = "z".repeat(MAX_LINE_BYTES);
        let chunks = chunk_line(&line, MAX_LINE_BYTES, FRAMER_CONTINUATION);
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_multibyte_boundary() {
        let line = "é".repeat(100); // 200 bytes
        let chunks = chunk_line(&line, MAX_LINE_BYTES, FRAMER_CONTINUATION);
        assert_eq!(reassemble(&chunks, FRAMER_CONTINUATION), line);
    }

    #[test]
    fn test_record_chunks_each_line() {
        let record = format!("send\n4321\n{}", "A".repeat(250));
        let out = chunked_record(&record, MAX_LINE_BYTES, FRAMER_CONTINUATION);

        for line in out.split('\n') {
            assert!(line.len() <= MAX_LINE_BYTES);
        }
        assert!(out.starts_with("send\n4321\n"));
    }

    #[test]
    fn test_record_passthrough_when_short() {
        let record = "login\n/home/u\ntmux attach";
        let out = chunked_record(record, MAX_LINE_BYTES, FRAMER_CONTINUATION);
        assert_eq!(out, record);
    }
}
