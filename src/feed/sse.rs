use crate::error::AppError;

/// Upper bound on one undispatched event. A tick payload is well under a
/// kilobyte, so anything near this limit is a broken or hostile peer.
pub const MAX_EVENT_BYTES: usize = 64 * 1024;

/// Incremental decoder for the server-sent-events wire format.
///
/// Transport chunks may split an event at any byte boundary, so the decoder
/// buffers until a full line is available. `data:` lines accumulate and a
/// blank line dispatches one event payload; comment lines and non-`data`
/// fields (`event:`, `id:`, `retry:`) are consumed and ignored. Pending
/// bytes are capped at [`MAX_EVENT_BYTES`] so a peer that never terminates
/// an event cannot grow the buffer without bound.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one transport chunk and returns every event payload completed
    /// by it, in arrival order. Errors when the undispatched remainder
    /// exceeds [`MAX_EVENT_BYTES`]; the caller should drop the connection.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<String>, AppError> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline_at) = self.buffer.iter().position(|&byte| byte == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=newline_at).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            self.consume_line(line.trim_end_matches(['\n', '\r']), &mut events);
        }

        if self.pending_bytes() > MAX_EVENT_BYTES {
            return Err(AppError::Stream(format!(
                "pending event exceeds {MAX_EVENT_BYTES} bytes"
            )));
        }
        Ok(events)
    }

    fn pending_bytes(&self) -> usize {
        self.buffer.len() + self.data_lines.iter().map(String::len).sum::<usize>()
    }

    fn consume_line(&mut self, line: &str, events: &mut Vec<String>) {
        if line.is_empty() {
            if !self.data_lines.is_empty() {
                events.push(self.data_lines.join("\n"));
                self.data_lines.clear();
            }
            return;
        }

        if line.starts_with(':') {
            return;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        if field == "data" {
            self.data_lines.push(value.to_string());
        }
    }
}
