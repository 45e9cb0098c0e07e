//! Incremental decoders for the two SSE framings the providers use.
//!
//! A transport read may contain zero, one, or several logical frames, and
//! may cut a frame anywhere. Both buffers accumulate undecoded bytes across
//! reads and only hand out a frame once its delimiter has fully arrived;
//! whatever trails the last delimiter stays buffered for the next read.

use bytes::{Buf, BytesMut};

/// Newline-delimited framing: one logical frame per line.
#[derive(Default)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete line, without its terminator. Trailing `\r` is
    /// stripped so CRLF transports decode the same as LF.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = twoway::find_bytes(&self.buf, b"\n")?;
        let mut line = self.buf.split_to(pos);
        self.buf.advance(1);
        if line.last() == Some(&b'\r') {
            line.truncate(line.len() - 1);
        }
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

/// Blank-line-delimited framing: one logical frame per SSE event block.
#[derive(Default)]
pub struct EventBuffer {
    buf: BytesMut,
}

impl EventBuffer {
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete event block, without its blank-line terminator.
    pub fn next_event(&mut self) -> Option<String> {
        let (pos, adv) = if let Some(p) = twoway::find_bytes(&self.buf, b"\r\n\r\n") {
            (p, 4)
        } else if let Some(p) = twoway::find_bytes(&self.buf, b"\n\n") {
            (p, 2)
        } else {
            return None;
        };
        let block = self.buf.split_to(pos);
        self.buf.advance(adv);
        Some(String::from_utf8_lossy(&block).into_owned())
    }
}

/// Payload of a `data:` line, or `None` for comments and other fields.
pub fn data_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}

/// Joined `data:` payload of one event block, or `None` when the block
/// carries no data field at all.
pub fn event_data(block: &str) -> Option<String> {
    let mut lines = Vec::new();
    for line in block.lines() {
        if let Some(rest) = data_line(line) {
            lines.push(rest);
        }
    }
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_split_across_reads_is_reassembled() {
        let mut b = LineBuffer::default();
        b.push(b"data: {\"x\":");
        assert_eq!(b.next_line(), None);
        b.push(b"1}\ndata: tail");
        assert_eq!(b.next_line().as_deref(), Some("data: {\"x\":1}"));
        assert_eq!(b.next_line(), None);
        b.push(b"\n");
        assert_eq!(b.next_line().as_deref(), Some("data: tail"));
    }

    #[test]
    fn one_read_may_hold_many_lines() {
        let mut b = LineBuffer::default();
        b.push(b"a\r\nb\nc\n");
        assert_eq!(b.next_line().as_deref(), Some("a"));
        assert_eq!(b.next_line().as_deref(), Some("b"));
        assert_eq!(b.next_line().as_deref(), Some("c"));
        assert_eq!(b.next_line(), None);
    }

    #[test]
    fn multibyte_char_cut_at_read_boundary_survives() {
        let text = "data: café\n".as_bytes();
        let mut b = LineBuffer::default();
        // Cut inside the two-byte 'é'.
        b.push(&text[..8]);
        assert_eq!(b.next_line(), None);
        b.push(&text[8..]);
        assert_eq!(b.next_line().as_deref(), Some("data: café"));
    }

    #[test]
    fn event_block_split_across_reads() {
        let mut b = EventBuffer::default();
        b.push(b"event: content_block_delta\ndata: {\"a\":");
        assert_eq!(b.next_event(), None);
        b.push(b"1}\n\nevent: next\n");
        let block = b.next_event().expect("complete block");
        assert!(block.contains("content_block_delta"));
        assert!(block.contains("{\"a\":1}"));
        assert_eq!(b.next_event(), None);
    }

    #[test]
    fn crlf_event_boundary() {
        let mut b = EventBuffer::default();
        b.push(b"data: one\r\n\r\ndata: two\r\n\r\n");
        assert_eq!(b.next_event().as_deref(), Some("data: one"));
        assert_eq!(b.next_event().as_deref(), Some("data: two"));
    }

    #[test]
    fn data_line_prefix_handling() {
        assert_eq!(data_line("data: hello"), Some("hello"));
        assert_eq!(data_line("data:hello"), Some("hello"));
        assert_eq!(data_line(": comment"), None);
        assert_eq!(data_line("event: ping"), None);
    }

    #[test]
    fn event_data_joins_multiple_data_lines() {
        let block = "event: x\ndata: {\"a\":\ndata: 1}";
        assert_eq!(event_data(block).as_deref(), Some("{\"a\":\n1}"));
        assert_eq!(event_data("event: ping"), None);
    }
}
