//! `text/event-stream` framing used by the approval resume transport.
//!
//! The stream is read one line at a time. Each complete `data:` line is one
//! payload; blank lines, comments and other fields are skipped, so events may
//! be separated by a single newline or by a blank line, with LF or CRLF. A
//! `data: [DONE]` line ends the stream and anything after it is ignored.

pub const DONE_MARKER: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    /// Unfinished trailing line.
    buffer: String,
    done: bool,
}

impl EventStreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return the payloads of completed `data:` lines.
    pub fn feed(&mut self, fragment: &str) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.push_str(fragment);

        let mut payloads = Vec::new();
        while let Some(line) = drain_next_line(&mut self.buffer) {
            if self.accept(&line, &mut payloads) {
                self.buffer.clear();
                break;
            }
        }
        payloads
    }

    /// Flush an unterminated final line at end of stream.
    pub fn finish(&mut self) -> Vec<String> {
        let mut payloads = Vec::new();
        if !self.done {
            let tail = std::mem::take(&mut self.buffer);
            let _ = self.accept(&tail, &mut payloads);
        }
        self.buffer.clear();
        payloads
    }

    /// Whether the `[DONE]` marker has been seen.
    #[must_use]
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Returns true once the done marker is reached.
    fn accept(&mut self, line: &str, payloads: &mut Vec<String>) -> bool {
        let Some(data) = extract_data(line) else {
            return false;
        };
        if data.trim() == DONE_MARKER {
            self.done = true;
            return true;
        }
        if !data.trim().is_empty() {
            payloads.push(data.to_string());
        }
        false
    }
}

/// Remove and return the next complete line, without its terminator.
fn drain_next_line(buffer: &mut String) -> Option<String> {
    let end = buffer.find('\n')?;
    let line = buffer[..end].strip_suffix('\r').unwrap_or(&buffer[..end]).to_string();
    buffer.drain(..=end);
    Some(line)
}

fn extract_data(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}
