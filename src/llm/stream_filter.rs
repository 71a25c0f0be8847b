//! Cleanup of streamed model output for user-facing display.
//!
//! The raw stream interleaves natural-language reasoning with protocol
//! scaffolding: fenced code blocks and the ReAct JSON object itself.
//! [`StreamFilter`] is a character state machine fed one chunk at a
//! time; it tracks whether the current position is inside a fence or
//! inside JSON (including JSON strings, where braces do not count) and
//! forwards only the prose outside both.

#[derive(Default)]
pub struct StreamFilter {
    pending_ticks: usize,
    in_fence: bool,
    json_depth: usize,
    in_string: bool,
    escaped: bool,
}

impl StreamFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns the user-visible fragment of it.
    /// Fence state carries across chunk boundaries, so a ``` split in
    /// two chunks is still recognized.
    pub fn feed(&mut self, chunk: &str) -> String {
        let mut out = String::new();

        for ch in chunk.chars() {
            if ch == '`' {
                self.pending_ticks += 1;
                if self.pending_ticks == 3 {
                    self.in_fence = !self.in_fence;
                    self.pending_ticks = 0;
                }
                continue;
            }
            if self.pending_ticks > 0 {
                // A short backtick run is inline code, not a fence.
                if !self.in_fence && self.json_depth == 0 {
                    for _ in 0..self.pending_ticks {
                        out.push('`');
                    }
                }
                self.pending_ticks = 0;
            }

            if self.in_fence {
                continue;
            }

            if self.json_depth > 0 {
                if self.in_string {
                    if self.escaped {
                        self.escaped = false;
                    } else if ch == '\\' {
                        self.escaped = true;
                    } else if ch == '"' {
                        self.in_string = false;
                    }
                } else {
                    match ch {
                        '"' => self.in_string = true,
                        '{' => self.json_depth += 1,
                        '}' => self.json_depth -= 1,
                        _ => {}
                    }
                }
                continue;
            }

            if ch == '{' {
                self.json_depth = 1;
                self.in_string = false;
                self.escaped = false;
                continue;
            }

            out.push(ch);
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_all(filter: &mut StreamFilter, chunks: &[&str]) -> String {
        chunks.iter().map(|c| filter.feed(c)).collect()
    }

    #[test]
    fn prose_passes_through() {
        let mut filter = StreamFilter::new();
        assert_eq!(filter.feed("Let me check the weather."), "Let me check the weather.");
    }

    #[test]
    fn fenced_blocks_are_dropped() {
        let mut filter = StreamFilter::new();
        let out = filter.feed("Thinking.\n```json\n{\"action\":\"finish\"}\n```\nDone.");
        assert_eq!(out, "Thinking.\n\nDone.");
    }

    #[test]
    fn fence_split_across_chunks_is_recognized() {
        let mut filter = StreamFilter::new();
        let out = feed_all(&mut filter, &["First `", "``\nsecret\n``", "` after"]);
        assert_eq!(out, "First  after");
    }

    #[test]
    fn bare_json_is_suppressed() {
        let mut filter = StreamFilter::new();
        let out = filter.feed(r#"I will add them. {"action": "tool_call"} Now waiting."#);
        assert_eq!(out, "I will add them.  Now waiting.");
    }

    #[test]
    fn braces_inside_json_strings_do_not_confuse_depth() {
        let mut filter = StreamFilter::new();
        let out = filter.feed(r#"before {"note": "a } inside \" string"} after"#);
        assert_eq!(out, "before  after");
    }

    #[test]
    fn nested_objects_close_correctly() {
        let mut filter = StreamFilter::new();
        let out = filter.feed(r#"x {"a": {"b": 1}} y"#);
        assert_eq!(out, "x  y");
    }

    #[test]
    fn json_split_across_chunks_is_suppressed() {
        let mut filter = StreamFilter::new();
        let out = feed_all(
            &mut filter,
            &["thinking ", r#"{"thoughts": "hm"#, r#"m", "action": "plan"}"#, " done"],
        );
        assert_eq!(out, "thinking  done");
    }

    #[test]
    fn inline_backticks_survive() {
        let mut filter = StreamFilter::new();
        assert_eq!(filter.feed("use `cargo` here"), "use `cargo` here");
    }
}
