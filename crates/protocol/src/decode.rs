//! Chunk-to-line accumulation for stream readers.

/// Splits an incoming byte stream into complete, newline-terminated lines.
///
/// The decoder buffers raw bytes and only converts whole lines to text, so
/// a UTF-8 sequence split across two chunks is reassembled before decoding
/// (`\n` is a single byte and cannot occur inside a multi-byte sequence).
/// Invalid UTF-8 inside a line is replaced rather than failing the stream.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line it finishes.
    ///
    /// Returned lines have the trailing `\n` (and `\r`, for CRLF peers)
    /// stripped. Blank lines are dropped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw[..pos]);
            let line = line.trim_end_matches('\r');
            if !line.trim().is_empty() {
                lines.push(line.to_string());
            }
        }
        lines
    }

    /// Finish the stream, returning any unterminated trailing fragment.
    ///
    /// The protocol never parses a fragment without a final newline; the
    /// caller decides whether its presence means truncation.
    pub fn finish(self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let fragment = String::from_utf8_lossy(&self.buffer).into_owned();
        if fragment.trim().is_empty() {
            None
        } else {
            Some(fragment)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_yields_each_line() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"{\"a\":1}\n{\"b\":2}\n");
        assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn line_split_across_chunks_is_reassembled() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.feed(b"{\"type\":\"con").is_empty());
        let lines = decoder.feed(b"tent\",\"data\":\"hi\"}\n");
        assert_eq!(lines, vec![r#"{"type":"content","data":"hi"}"#]);
    }

    #[test]
    fn chunking_never_changes_the_line_sequence() {
        let wire = b"{\"n\":1}\n{\"n\":2}\n{\"n\":3}\n";

        // Reference: everything in one chunk.
        let mut reference = LineDecoder::new();
        let expected = reference.feed(wire);

        // Every possible split point, byte by byte.
        for split in 0..wire.len() {
            let mut decoder = LineDecoder::new();
            let mut lines = decoder.feed(&wire[..split]);
            lines.extend(decoder.feed(&wire[split..]));
            assert_eq!(lines, expected, "split at byte {split}");
        }
    }

    #[test]
    fn multibyte_utf8_split_across_chunks_survives() {
        // "₹500" spends three bytes on the rupee sign.
        let wire = "{\"data\":\"₹500\"}\n".as_bytes();
        let mut decoder = LineDecoder::new();
        let mut lines = decoder.feed(&wire[..9]);
        lines.extend(decoder.feed(&wire[9..]));
        assert_eq!(lines, vec!["{\"data\":\"₹500\"}"]);
    }

    #[test]
    fn crlf_and_blank_lines_are_tolerated() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"{\"a\":1}\r\n\n  \n{\"b\":2}\n");
        assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"b":2}"#]);
    }

    #[test]
    fn trailing_fragment_is_reported_not_parsed() {
        let mut decoder = LineDecoder::new();
        let lines = decoder.feed(b"{\"a\":1}\n{\"trunc");
        assert_eq!(lines, vec![r#"{"a":1}"#]);
        assert_eq!(decoder.finish(), Some("{\"trunc".to_string()));
    }
}
