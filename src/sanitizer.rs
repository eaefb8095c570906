//! Incremental removal of orchestrator control directives from streamed text.
//!
//! Agents embed bracketed directives such as `[EDIT_FILE:src/main.py]` or
//! `[→JUNIOR]` in their prose. [`StreamSanitizer`] consumes text one delta at a
//! time and keeps three things apart:
//!
//! - committed display text, with fully formed directives removed
//! - `[RUN_COMMAND:...]` arguments, extracted in order
//! - an unresolved tail that starts at an open bracket and could still become a
//!   directive; it stays hidden until a later delta completes or disproves it,
//!   or until the stream ends and [`StreamSanitizer::final_snapshot`] shows it
//!
//! The lexer advances one character at a time and never looks at delta
//! boundaries, so any chunking of the same string yields the same snapshot.
//! Removing a directive can splice its neighbours into a new one
//! (`[ED[DONE]IT_FILE:a]`), so snapshots re-lex the display text until it
//! stops shrinking. Sanitizing a display text again therefore changes nothing.

/// Argument length after which an open tag is treated as ordinary text.
pub const MAX_TAG_ARGUMENT_CHARS: usize = 512;

const RUN_COMMAND: &str = "RUN_COMMAND:";

/// Directive keywords without their opening bracket. Entries ending in `:`
/// take an argument up to the closing bracket; the others are matched whole.
const TAG_KEYWORDS: &[&str] = &[
    "EDIT_FILE:",
    "CREATE_FILE:",
    "DELETE_FILE:",
    "READ_FILE:",
    "SEARCH:",
    "FILE_SEARCH:",
    "READ_URL:",
    "SUB_RESEARCH:",
    "HANDOFF:",
    RUN_COMMAND,
    "→SENIOR]",
    "→JUNIOR]",
    "→TESTER]",
    "→RESEARCH]",
    "→SEARCH]",
    "→FILE_SEARCH]",
    "MISSION ACCOMPLISHED]",
    "DONE]",
];

const SENTENCE_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?'];

/// Display text and extracted commands for one message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizedText {
    pub display: String,
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LexState {
    Text,
    /// Directly after a removed directive. Horizontal whitespace is held in
    /// `gap` until the next visible character decides whether it survives.
    AfterTag { gap: String },
    /// Inside `[`. `argument_start` is the byte offset in `raw` where the
    /// argument begins once an argument-taking keyword has been read.
    Tag {
        raw: String,
        argument_start: Option<usize>,
        argument_chars: usize,
    },
}

enum TagStep {
    Pending,
    Complete,
    Disproved,
}

/// Incremental directive filter over an append-only text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamSanitizer {
    committed: String,
    commands: Vec<String>,
    state: LexState,
}

impl Default for StreamSanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSanitizer {
    pub fn new() -> Self {
        Self {
            committed: String::new(),
            commands: Vec::new(),
            state: LexState::Text,
        }
    }

    /// Feeds one delta.
    pub fn push(&mut self, delta: &str) {
        for ch in delta.chars() {
            self.push_char(ch);
        }
    }

    /// True while an open bracket is waiting for more input.
    pub fn has_pending_tag(&self) -> bool {
        matches!(self.state, LexState::Tag { .. })
    }

    /// Display text for everything fed so far, with any unresolved tail hidden.
    pub fn display(&self) -> String {
        self.settle(false).display
    }

    pub fn snapshot(&self) -> SanitizedText {
        self.settle(false)
    }

    /// Snapshot as if the stream ended here. An unresolved tail can no longer
    /// become a directive and is shown as the text it is.
    pub fn final_snapshot(&self) -> SanitizedText {
        let mut ended = self.clone();
        ended.end_of_input();
        ended.settle(true)
    }

    fn end_of_input(&mut self) {
        if let LexState::Tag { raw, .. } = std::mem::replace(&mut self.state, LexState::Text) {
            self.committed.push_str(&raw);
        }
    }

    /// Re-lexes the tidied text until a pass removes nothing. Passes never add
    /// characters, so an unchanged length means a fixpoint.
    fn settle(&self, ended: bool) -> SanitizedText {
        let mut text = SanitizedText {
            display: tidy(&self.committed),
            commands: self.commands.clone(),
        };
        loop {
            let mut pass = StreamSanitizer::new();
            pass.push(&text.display);
            if ended {
                pass.end_of_input();
            }
            let display = tidy(&pass.committed);
            if display.len() >= text.display.len() {
                return text;
            }
            text.display = display;
            text.commands.extend(pass.commands);
        }
    }

    fn push_char(&mut self, ch: char) {
        match std::mem::replace(&mut self.state, LexState::Text) {
            LexState::Text => self.push_text_char(ch),
            LexState::AfterTag { gap } => self.push_after_tag(gap, ch),
            LexState::Tag {
                raw,
                argument_start,
                argument_chars,
            } => self.push_tag_char(raw, argument_start, argument_chars, ch),
        }
    }

    fn push_text_char(&mut self, ch: char) {
        if ch == '[' {
            self.open_tag();
        } else {
            self.committed.push(ch);
        }
    }

    fn push_after_tag(&mut self, mut gap: String, ch: char) {
        let at_line_start = self.at_line_start();
        match ch {
            ' ' | '\t' => {
                gap.push(ch);
                self.state = LexState::AfterTag { gap };
            }
            ch if SENTENCE_PUNCTUATION.contains(&ch) => {
                if at_line_start {
                    // Punctuation orphaned by a directive at line start.
                    self.state = LexState::AfterTag {
                        gap: String::new(),
                    };
                } else {
                    self.trim_trailing_blanks();
                    self.committed.push(ch);
                }
            }
            '[' => {
                self.restore_gap(&gap, at_line_start);
                self.open_tag();
            }
            ch => {
                self.restore_gap(&gap, at_line_start);
                self.committed.push(ch);
            }
        }
    }

    fn push_tag_char(
        &mut self,
        mut raw: String,
        argument_start: Option<usize>,
        argument_chars: usize,
        ch: char,
    ) {
        match argument_start {
            None => {
                raw.push(ch);
                match classify_keyword(&raw[1..]) {
                    TagStep::Pending => {
                        self.state = LexState::Tag {
                            raw,
                            argument_start: None,
                            argument_chars: 0,
                        };
                    }
                    TagStep::Complete if raw.ends_with(':') => {
                        let argument_start = Some(raw.len());
                        self.state = LexState::Tag {
                            raw,
                            argument_start,
                            argument_chars: 0,
                        };
                    }
                    TagStep::Complete => self.close_tag(&raw, None),
                    TagStep::Disproved => self.disprove(raw, ch),
                }
            }
            Some(start) => {
                if ch == ']' {
                    self.close_tag(&raw, Some(start));
                    return;
                }

                raw.push(ch);
                if ch == '\n' || argument_chars + 1 > MAX_TAG_ARGUMENT_CHARS {
                    self.disprove(raw, ch);
                    return;
                }

                self.state = LexState::Tag {
                    raw,
                    argument_start: Some(start),
                    argument_chars: argument_chars + 1,
                };
            }
        }
    }

    fn open_tag(&mut self) {
        self.state = LexState::Tag {
            raw: String::from("["),
            argument_start: None,
            argument_chars: 0,
        };
    }

    /// Emits `raw` minus its last character as plain text and replays that
    /// character, which may itself open a new tag.
    fn disprove(&mut self, mut raw: String, last: char) {
        raw.pop();
        self.committed.push_str(&raw);
        self.state = LexState::Text;
        self.push_text_char(last);
    }

    fn close_tag(&mut self, raw: &str, argument_start: Option<usize>) {
        if let Some(start) = argument_start {
            let keyword = &raw[1..start];
            if keyword == RUN_COMMAND {
                let command = clean_command(&raw[start..]);
                if !command.is_empty() {
                    self.commands.push(command);
                }
            }
        }

        self.state = LexState::AfterTag { gap: String::new() };
    }

    /// Keeps the whitespace that followed a removed directive unless the
    /// directive sat at a line start or already had whitespace before it.
    fn restore_gap(&mut self, gap: &str, at_line_start: bool) {
        if at_line_start || self.committed.ends_with([' ', '\t']) {
            return;
        }
        self.committed.push_str(gap);
    }

    fn at_line_start(&self) -> bool {
        let trimmed = self.committed.trim_end_matches([' ', '\t']);
        trimmed.is_empty() || trimmed.ends_with('\n')
    }

    fn trim_trailing_blanks(&mut self) {
        let keep = self.committed.trim_end_matches([' ', '\t']).len();
        self.committed.truncate(keep);
    }
}

/// Sanitizes a complete string.
pub fn sanitize(raw: &str) -> SanitizedText {
    let mut sanitizer = StreamSanitizer::new();
    sanitizer.push(raw);
    sanitizer.final_snapshot()
}

fn classify_keyword(body: &str) -> TagStep {
    if TAG_KEYWORDS.contains(&body) {
        return TagStep::Complete;
    }
    if TAG_KEYWORDS.iter().any(|keyword| keyword.starts_with(body)) {
        return TagStep::Pending;
    }
    TagStep::Disproved
}

fn clean_command(argument: &str) -> String {
    let trimmed = argument.trim();
    let unquoted = ['`', '"', '\'']
        .iter()
        .find_map(|quote| {
            trimmed
                .strip_prefix(*quote)
                .and_then(|rest| rest.strip_suffix(*quote))
        })
        .unwrap_or(trimmed);
    unquoted.trim().to_string()
}

/// Collapses runs of three or more newlines and trims the ends.
fn tidy(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut newlines = 0usize;
    for ch in text.chars() {
        if ch == '\n' {
            newlines += 1;
            if newlines > 2 {
                continue;
            }
        } else {
            newlines = 0;
        }
        out.push(ch);
    }
    out.trim().to_string()
}
