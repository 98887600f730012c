//! Turns raw log text into a stream of [`TokenizeStep`]s (spec.md §4.1).
//!
//! The original walks the text with an explicit cursor and branches on
//! regexes; here the same shape becomes a plain [`Iterator`] over lines, with
//! at most one line of lookahead buffered at a time (via [`Peekable`]) to
//! support `FLOW_VALUE_ASSIGNMENT`'s multi-line continuation.
//!
//! Governor-limit block lines are never seen here — [`crate::parse`] runs
//! [`crate::governor_limits::GovernorLimitsCollector`] first and hands this
//! tokenizer the blanked-out remainder.

use std::iter::Peekable;
use std::str::Lines;

use apex_log_core::Nanos;

use crate::line_record::LineRecord;
use crate::registry;
use crate::tree::DebugLevel;

#[derive(Debug, Clone)]
pub enum TokenizeStep {
    Record(LineRecord),
    ParsingError(String),
    DebugLevels(Vec<DebugLevel>),
    /// A `*** Skipped N bytes of detailed log ***` marker the platform
    /// inserts when it drops lines mid-stream to stay under the log size cap.
    SkippedLines(u64),
    /// The `*********** MAXIMUM DEBUG LOG SIZE REACHED ***********` sentinel
    /// the platform appends when it stops writing the log altogether.
    MaxSizeReached,
    /// A blank line, or a line already consumed as part of another step.
    Empty,
}

pub struct LineTokenizer<'a> {
    lines: Peekable<Lines<'a>>,
    first_line_seen: bool,
}

impl<'a> LineTokenizer<'a> {
    pub fn new(text: &'a str) -> Self {
        LineTokenizer {
            lines: text.lines().peekable(),
            first_line_seen: false,
        }
    }

    fn absorb_continuation_lines(&mut self, record: &mut LineRecord) {
        while let Some(next_line) = self.lines.peek().copied() {
            if next_line.trim().is_empty() || parse_timestamp_prefix(next_line).is_some() {
                break;
            }
            record.text.push('\n');
            record.text.push_str(next_line.trim());
            self.lines.next();
        }
    }
}

impl<'a> Iterator for LineTokenizer<'a> {
    type Item = TokenizeStep;

    fn next(&mut self) -> Option<TokenizeStep> {
        let line = self.lines.next()?;

        if !self.first_line_seen {
            self.first_line_seen = true;
            if let Some(levels) = parse_debug_level_header(line) {
                return Some(TokenizeStep::DebugLevels(levels));
            }
        }

        if line.trim().is_empty() {
            return Some(TokenizeStep::Empty);
        }

        let Some((nanos, rest)) = parse_timestamp_prefix(line) else {
            if let Some(count) = parse_skipped_lines(line) {
                return Some(TokenizeStep::SkippedLines(count));
            }
            if line.contains("MAXIMUM DEBUG LOG SIZE REACHED") {
                return Some(TokenizeStep::MaxSizeReached);
            }
            return Some(TokenizeStep::ParsingError(format!("Invalid log line: {line}")));
        };

        let mut fields: Vec<&str> = rest.split('|').collect();
        if fields.is_empty() {
            return Some(TokenizeStep::ParsingError(format!("Invalid log line: {line}")));
        }
        let event_name = fields.remove(0);

        let Some(descriptor) = registry::lookup(event_name) else {
            return Some(TokenizeStep::ParsingError(format!(
                "Unsupported log event name: {event_name}"
            )));
        };

        let (line_ref, _) = registry::split_leading_line_ref(&fields);
        let (text, namespace, details) = (descriptor.parse_fields)(&fields);

        let mut record = LineRecord {
            timestamp: nanos,
            line_number: line_ref,
            log_line: line.to_string(),
            event: descriptor.name,
            text,
            namespace,
            discontinuity: descriptor.discontinuity,
            details,
        };

        if descriptor.multiline_tail {
            self.absorb_continuation_lines(&mut record);
        }

        Some(TokenizeStep::Record(record))
    }
}

/// Splits `HH:MM:SS.fff (nanos)|rest` into the nanosecond timestamp (the
/// canonical clock used throughout the tree — the `HH:MM:SS.fff` portion is
/// redundant with it and only checked for shape) and everything after the
/// first `|`.
fn parse_timestamp_prefix(line: &str) -> Option<(Nanos, &str)> {
    let bar = line.find('|')?;
    let prefix = &line[..bar];
    let open = prefix.find('(')?;
    let close = prefix.find(')')?;
    if close <= open {
        return None;
    }
    let nanos: Nanos = prefix[open + 1..close].parse().ok()?;
    let clock = prefix[..open].trim();
    if clock.matches(':').count() != 2 || !clock.contains('.') {
        return None;
    }
    Some((nanos, &line[bar + 1..]))
}

/// Parses a `*** Skipped 93 bytes of detailed log ***`-shaped marker into
/// the byte count the platform dropped, wherever `Skipped` happens to sit
/// in the line.
fn parse_skipped_lines(line: &str) -> Option<u64> {
    let idx = line.find("Skipped")?;
    let rest = line[idx + "Skipped".len()..].trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Parses the first-line debug-level header, e.g.
/// `51.0 APEX_CODE,FINE;APEX_PROFILING,INFO;CALLOUT,INFO;DB,INFO`.
fn parse_debug_level_header(line: &str) -> Option<Vec<DebugLevel>> {
    let (version, rest) = line.split_once(' ')?;
    if version.is_empty() || !version.chars().all(|c| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let mut levels = Vec::new();
    for pair in rest.split(';') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let (category, level) = pair.split_once(',')?;
        levels.push(DebugLevel {
            category: category.trim().to_string(),
            level: level.trim().to_string(),
        });
    }
    if levels.is_empty() {
        None
    } else {
        Some(levels)
    }
}
