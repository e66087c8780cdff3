//! Line-oriented codec for daily task lists.
//!
//! A task file is UTF-8 text, one task per line:
//!
//! ```text
//! - [ ] 09:00 Run
//! - [x] 07:30 Stretch (10min)
//! ```
//!
//! Decoding is deliberately two-tier: a line that does not have the
//! task shape at all (prose, headings, blanks) is skipped silently,
//! but once a line matches the outer shape, its time and duration
//! fields are validated strictly and any violation fails the entire
//! decode. The two cases must not be unified -- they produce different
//! observable results for partially corrupt files.

use std::sync::LazyLock;

use regex::Regex;

use crate::task::Task;

/// Outer task-line shape. A line that fails this is not data.
#[allow(clippy::expect_used)]
static TASK_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- \[([ x])\] (\d{2}:\d{2}) (.+?)(?: \((.+?)\))?$")
        .expect("task line pattern is valid")
});

/// Strict duration grammar: integer or decimal magnitude plus unit.
#[allow(clippy::expect_used)]
static DURATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\d+|\d+\.\d+)(?:min|hr)$").expect("duration pattern is valid")
});

/// Errors produced by [`decode`]. A single bad line invalidates the
/// whole file; no partial list is ever returned.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// A task-shaped line carried a time outside 00:00..=23:59.
    #[error("line {line}: invalid time format: {value}")]
    InvalidTime {
        /// 1-based line number of the offending line.
        line: usize,
        /// The rejected time field.
        value: String,
    },

    /// A task-shaped line carried a duration that fails the grammar.
    #[error("line {line}: invalid duration format: {value}")]
    InvalidDuration {
        /// 1-based line number of the offending line.
        line: usize,
        /// The rejected duration field.
        value: String,
    },
}

/// Returns whether `time` is a zero-padded `HH:MM` within
/// 00:00..=23:59.
#[must_use]
pub fn is_valid_time(time: &str) -> bool {
    let Some((h, m)) = time.split_once(':') else {
        return false;
    };
    if h.len() != 2 || m.len() != 2 {
        return false;
    }
    if !h.bytes().chain(m.bytes()).all(|b| b.is_ascii_digit()) {
        return false;
    }
    let (Ok(hour), Ok(minute)) = (h.parse::<u8>(), m.parse::<u8>()) else {
        return false;
    };
    hour <= 23 && minute <= 59
}

/// Returns whether `duration` satisfies the strict duration grammar
/// (`30min`, `1.5hr`, ...).
#[must_use]
pub fn is_valid_duration(duration: &str) -> bool {
    DURATION.is_match(duration)
}

/// Decodes a task file into an ordered task list.
///
/// Record order follows the order of matching lines in the input; no
/// sort is applied. Blank lines, `#` headings, and lines without the
/// task shape are skipped.
///
/// # Errors
///
/// Returns [`CodecError`] if a task-shaped line has an out-of-range
/// time or a malformed duration. The error identifies the offending
/// line; nothing decoded before it is returned.
pub fn decode(text: &str) -> Result<Vec<Task>, CodecError> {
    let mut tasks = Vec::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;

        // Skip blanks and headings.
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Lines without the task shape are stray prose, not an error.
        let Some(caps) = TASK_LINE.captures(line) else {
            continue;
        };

        let done = &caps[1] == "x";
        let time = &caps[2];
        let name = caps[3].to_string();
        let duration = caps.get(4).map(|m| m.as_str().to_string());

        // From here on, validation is strict.
        if !is_valid_time(time) {
            return Err(CodecError::InvalidTime {
                line: line_no,
                value: time.to_string(),
            });
        }
        if let Some(d) = &duration
            && !is_valid_duration(d)
        {
            return Err(CodecError::InvalidDuration {
                line: line_no,
                value: d.clone(),
            });
        }

        tasks.push(Task {
            time: time.to_string(),
            name,
            duration,
            done,
            current: false,
        });
    }

    Ok(tasks)
}

/// Encodes a task list as file text, one line per record in the
/// list's current order. Callers are expected to have sorted the list
/// if order matters; no header lines are emitted.
///
/// All fields are assumed pre-validated, so encoding never fails.
#[must_use]
pub fn encode(tasks: &[Task]) -> String {
    let mut out = String::new();
    for task in tasks {
        let mark = if task.done { 'x' } else { ' ' };
        out.push_str(&format!("- [{mark}] {} {}", task.time, task.name));
        if let Some(duration) = &task.duration {
            out.push_str(&format!(" ({duration})"));
        }
        out.push('\n');
    }
    out
}
