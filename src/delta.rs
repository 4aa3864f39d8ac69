//! Net line additions/removals for a single document change event.
//!
//! This is a heuristic, not a diff: each span compares the number of lines it
//! replaced with the number of line breaks it inserted. Edits inside a line
//! count as nothing, and overlapping spans are not deduplicated.

use crate::model::Position;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: Position,
    pub end: Position,
}

impl Range {
    pub fn lines(start: u32, end: u32) -> Self {
        Self {
            start: Position::new(start, 0),
            end: Position::new(end, 0),
        }
    }
}

/// One replaced range and the text that replaced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeSpan {
    pub range: Range,
    pub text: String,
}

impl ChangeSpan {
    pub fn new(range: Range, text: impl Into<String>) -> Self {
        Self {
            range,
            text: text.into(),
        }
    }

    fn old_lines(&self) -> u32 {
        self.range.end.line.saturating_sub(self.range.start.line)
    }

    fn new_lines(&self) -> u32 {
        count_line_breaks(&self.text)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineDelta {
    pub added: u32,
    pub removed: u32,
}

pub fn compute_line_delta<'a, I>(changes: I) -> LineDelta
where
    I: IntoIterator<Item = &'a ChangeSpan>,
{
    changes
        .into_iter()
        .fold(LineDelta::default(), |mut delta, change| {
            let (old, new) = (change.old_lines(), change.new_lines());
            if new > old {
                delta.added += new - old;
            } else {
                delta.removed += old - new;
            }
            delta
        })
}

/// `\r\n`, `\r` and `\n` each count as one break.
fn count_line_breaks(text: &str) -> u32 {
    let mut count = 0;
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\n' => count += 1,
            '\r' => {
                count += 1;
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            _ => {}
        }
    }
    count
}
