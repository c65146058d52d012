//! Recovery of top-level JSON objects from arbitrarily chunked text.
//!
//! The backend writes JSON objects back to back with no delimiter, and the
//! transport may cut the text anywhere: between objects, inside a string
//! literal, or between a backslash and the character it escapes. The
//! reassembler scans only the structural characters `{`, `}`, `"` and `\`;
//! everything else is opaque payload.
//!
//! State carried across [`ObjectReassembler::feed`] calls:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `depth` | open braces of the current object |
//! | `in_string` | inside a string literal |
//! | `escaped` | previous char was a backslash inside the object |
//! | `pending` | text since the last closed object boundary |
//!
//! Only the new suffix is scanned on each call, so feeding a stream piece by
//! piece yields exactly the objects that scanning the whole concatenation at
//! once would.

/// Trailing object still open when the stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncompleteObject {
    /// Bytes buffered for the unfinished object.
    pub pending_bytes: usize,
    /// Braces still open.
    pub depth: usize,
}

#[derive(Debug, Default)]
pub struct ObjectReassembler {
    pending: String,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl ObjectReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment and return every object it completes, in order.
    pub fn feed(&mut self, fragment: &str) -> Vec<String> {
        let scan_from = self.pending.len();
        self.pending.push_str(fragment);

        let mut complete = Vec::new();
        // Offset of the current object's `{` within `pending`.
        let mut object_start = if self.depth > 0 { Some(0) } else { None };
        let mut consumed = 0;

        let bytes = self.pending.as_bytes();
        for (offset, &byte) in bytes.iter().enumerate().skip(scan_from) {
            if self.depth == 0 {
                // Between objects only an opening brace means anything.
                match byte {
                    b'{' => {
                        object_start = Some(offset);
                        self.depth = 1;
                    }
                    b'}' => tracing::debug!(offset, "Ignoring unbalanced closing brace"),
                    _ => {}
                }
                continue;
            }

            if self.escaped {
                self.escaped = false;
                continue;
            }

            match byte {
                b'\\' => self.escaped = true,
                b'"' => self.in_string = !self.in_string,
                _ if self.in_string => {}
                b'{' => self.depth += 1,
                b'}' => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        let start = object_start.take().unwrap_or(consumed);
                        complete.push(self.pending[start..=offset].to_string());
                        consumed = offset + 1;
                    }
                }
                _ => {}
            }
        }

        if self.depth == 0 {
            let stray = self.pending[consumed..].trim();
            if !stray.is_empty() {
                tracing::debug!(bytes = stray.len(), "Discarding text outside JSON objects");
            }
            self.pending.clear();
        } else {
            let start = object_start.unwrap_or(consumed);
            self.pending.drain(..start);
        }

        complete
    }

    /// Text of the object currently being received (empty between objects).
    ///
    /// Text outside any object is dropped when scanned, never kept here.
    #[must_use]
    pub fn pending(&self) -> &str {
        &self.pending
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn is_mid_object(&self) -> bool {
        self.depth > 0
    }

    /// Close the stream. Reports, without emitting, an object left open.
    ///
    /// The pending buffer is cleared either way.
    pub fn finish(&mut self) -> Option<IncompleteObject> {
        let incomplete = (self.depth > 0).then(|| IncompleteObject {
            pending_bytes: self.pending.len(),
            depth: self.depth,
        });
        if let Some(lost) = &incomplete {
            tracing::warn!(
                pending_bytes = lost.pending_bytes,
                depth = lost.depth,
                "Stream ended inside a JSON object; trailing data lost"
            );
        }
        self.reset();
        incomplete
    }

    pub fn reset(&mut self) {
        self.pending.clear();
        self.depth = 0;
        self.in_string = false;
        self.escaped = false;
    }
}

/// Split a complete text into its top-level objects in one pass.
#[must_use]
pub fn split_objects(text: &str) -> Vec<String> {
    let mut reassembler = ObjectReassembler::new();
    let objects = reassembler.feed(text);
    let _ = reassembler.finish();
    objects
}
