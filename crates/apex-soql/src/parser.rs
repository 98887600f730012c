//! A hand-rolled SOQL parser (spec.md §4.9).
//!
//! This is intentionally not a general SOQL grammar: per spec.md §9's Open
//! Question, it mirrors the narrow set of shapes the linter actually needs
//! (`SELECT ... FROM ... [WHERE ...] [GROUP BY ...] [HAVING ...]
//! [ORDER BY ...] [LIMIT ...]`) and treats anything richer — a `TYPEOF`
//! branch, a nested subquery, an aggregate function — as present-but-opaque
//! rather than trying to fully understand it. `isTrivialQuery()` and
//! `isSimpleSelect()` fall back to `false` the moment they see a shape this
//! parser doesn't model in depth, which is the conservative posture the spec
//! asks for.

use apex_log_core::text::LineIndex;

use crate::error::SoqlSyntaxError;

/// `LIMIT` clause value: either a literal row count or a bind expression
/// (`LIMIT :pageSize`), exactly as written (spec.md §4.9).
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum LimitValue {
    Literal(u64),
    Bind(String),
}

/// A parsed SOQL statement (spec.md §4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct SoqlQuery {
    pub raw: String,
    pub from_object: String,
    pub select_items: Vec<String>,
    pub where_clause: Option<String>,
    pub group_by: Option<String>,
    pub having: Option<String>,
    pub order_by: Option<String>,
    pub limit: Option<LimitValue>,
    pub has_typeof: bool,
}

impl SoqlQuery {
    /// The object named in `FROM` (spec.md §4.9 `fromObject()`).
    pub fn from_object(&self) -> &str {
        &self.from_object
    }

    /// Every selected item is a bare field reference — no subqueries,
    /// aggregate functions, `TYPEOF`, or aliases (spec.md §4.9
    /// `isSimpleSelect()`).
    pub fn is_simple_select(&self) -> bool {
        !self.has_typeof
            && self
                .select_items
                .iter()
                .all(|item| is_bare_field_ref(item))
    }

    /// No `GROUP BY` / `HAVING` / `TYPEOF` / nested subquery anywhere in the
    /// statement (spec.md §4.9 `isTrivialQuery()`).
    pub fn is_trivial_query(&self) -> bool {
        self.group_by.is_none()
            && self.having.is_none()
            && !self.has_typeof
            && self.select_items.iter().all(|item| !item.contains('('))
    }

    /// Parsed `LIMIT` value, if present (spec.md §4.9 `limitValue()`).
    pub fn limit_value(&self) -> Option<&LimitValue> {
        self.limit.as_ref()
    }

    /// `true` iff an `ORDER BY` clause is present (spec.md §4.9 `isOrdered()`).
    pub fn is_ordered(&self) -> bool {
        self.order_by.is_some()
    }
}

/// Parses a single SOQL statement.
pub fn parse_soql(text: &str) -> Result<SoqlQuery, SoqlSyntaxError> {
    let span = tracing::trace_span!("apex_soql::parse_soql");
    let _enter = span.enter();

    let line_index = LineIndex::new(text);
    let err_at = |offset: usize, message: &str| {
        let lc = line_index.line_col(apex_log_core::text::TextSize::from(offset as u32));
        SoqlSyntaxError {
            line: lc.line,
            column: lc.col,
            message: message.to_string(),
        }
    };

    let trimmed_start = text.len() - text.trim_start().len();
    let body = text.trim();
    if body.is_empty() {
        return Err(err_at(0, "empty query"));
    }

    let select_kw_end = match_keyword(body, "SELECT").ok_or_else(|| err_at(trimmed_start, "expected SELECT"))?;

    let markers = find_top_level_markers(body);
    let from_marker = markers
        .iter()
        .find(|m| m.keyword == "FROM")
        .ok_or_else(|| err_at(trimmed_start + body.len(), "expected FROM"))?;

    let select_text = body[select_kw_end..from_marker.start].trim();
    if select_text.is_empty() {
        return Err(err_at(trimmed_start + select_kw_end, "empty SELECT list"));
    }
    let has_typeof = contains_keyword(select_text, "TYPEOF");
    let select_items = split_top_level_commas(select_text)
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    let after_from = &body[from_marker.end..];
    let from_object_end = after_from
        .char_indices()
        .find(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .unwrap_or(after_from.len());
    let from_object = after_from[..from_object_end].trim().to_string();
    if from_object.is_empty() {
        return Err(err_at(trimmed_start + from_marker.end, "expected object name after FROM"));
    }

    let mut where_clause = None;
    let mut group_by = None;
    let mut having = None;
    let mut order_by = None;
    let mut limit_text = None;

    for (i, marker) in markers.iter().enumerate().filter(|(_, m)| m.keyword != "FROM") {
        let body_start = marker.end;
        let body_end = markers
            .iter()
            .skip(i + 1)
            .map(|next| next.start)
            .next()
            .unwrap_or(body.len());
        let clause_text = body[body_start..body_end].trim().to_string();
        match marker.keyword {
            "WHERE" => where_clause = Some(clause_text),
            "GROUP BY" => group_by = Some(clause_text),
            "HAVING" => having = Some(clause_text),
            "ORDER BY" => order_by = Some(clause_text),
            "LIMIT" => limit_text = Some(clause_text),
            _ => {}
        }
    }

    let limit = match limit_text {
        Some(text) if text.is_empty() => None,
        Some(text) => Some(parse_limit_value(&text)),
        None => None,
    };

    Ok(SoqlQuery {
        raw: text.to_string(),
        from_object,
        select_items,
        where_clause,
        group_by,
        having,
        order_by,
        limit,
        has_typeof,
    })
}

fn parse_limit_value(text: &str) -> LimitValue {
    if let Some(bind) = text.strip_prefix(':') {
        LimitValue::Bind(bind.trim().to_string())
    } else if let Ok(n) = text.parse::<u64>() {
        LimitValue::Literal(n)
    } else {
        LimitValue::Bind(text.to_string())
    }
}

fn is_bare_field_ref(item: &str) -> bool {
    let item = item.trim();
    !item.is_empty()
        && item
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '_')
        && item.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_')
}

struct Marker<'a> {
    keyword: &'a str,
    start: usize,
    end: usize,
}

const CLAUSE_KEYWORDS: &[&str] = &["FROM", "WHERE", "GROUP BY", "HAVING", "ORDER BY", "LIMIT"];

/// Scans `body` (the text after the leading `SELECT`) for clause keywords
/// that appear at top level — outside any parentheses (subqueries, function
/// calls) and outside any single-quoted string literal.
fn find_top_level_markers(body: &str) -> Vec<Marker<'_>> {
    let bytes = body.as_bytes();
    let mut markers = Vec::new();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' && i + 1 < bytes.len() {
                i += 2;
                continue;
            }
            if b == b'\'' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' => in_string = true,
            b'(' => depth += 1,
            b')' => depth -= 1,
            _ => {
                if depth == 0 {
                    if let Some(keyword) = CLAUSE_KEYWORDS.iter().find(|kw| matches_keyword_at(body, i, kw)) {
                        let end = i + keyword_source_len(body, i, keyword);
                        markers.push(Marker {
                            keyword,
                            start: i,
                            end,
                        });
                        i = end;
                        continue;
                    }
                }
            }
        }
        i += 1;
    }
    markers
}

/// `true` if `keyword` (which may itself be two words, e.g. `"ORDER BY"`)
/// appears at `body[pos..]` as a whole word (not a substring of a longer
/// identifier).
fn matches_keyword_at(body: &str, pos: usize, keyword: &str) -> bool {
    let before_ok = pos == 0 || !is_ident_byte(body.as_bytes()[pos - 1]);
    if !before_ok {
        return false;
    }
    let mut cursor = pos;
    for word in keyword.split(' ') {
        let rest = &body[cursor..];
        let rest_trimmed = rest.trim_start();
        let skipped = rest.len() - rest_trimmed.len();
        if cursor != pos && skipped == 0 {
            return false; // words within a multi-word keyword need whitespace between them
        }
        cursor += skipped;
        if !rest_trimmed[..rest_trimmed.len().min(word.len())].eq_ignore_ascii_case(word) {
            return false;
        }
        let after = cursor + word.len();
        if after < body.len() && is_ident_byte(body.as_bytes()[after]) {
            return false;
        }
        cursor = after;
    }
    true
}

fn keyword_source_len(body: &str, pos: usize, keyword: &str) -> usize {
    let mut cursor = pos;
    for (idx, word) in keyword.split(' ').enumerate() {
        if idx > 0 {
            let rest = &body[cursor..];
            let skipped = rest.len() - rest.trim_start().len();
            cursor += skipped;
        }
        cursor += word.len();
    }
    cursor - pos
}

fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// Matches a single leading keyword (e.g. `SELECT`) at the very start of
/// `body` and returns the offset just past it, or `None` if it isn't there.
fn match_keyword(body: &str, keyword: &str) -> Option<usize> {
    if matches_keyword_at(body, 0, keyword) {
        Some(keyword_source_len(body, 0, keyword))
    } else {
        None
    }
}

fn contains_keyword(text: &str, keyword: &str) -> bool {
    let bytes = text.as_bytes();
    (0..bytes.len()).any(|i| matches_keyword_at(text, i, keyword))
}

/// Splits `text` on commas that sit outside any parentheses (so a
/// parenthesized subquery or function-call argument list isn't torn apart).
fn split_top_level_commas(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut start = 0;
    let mut parts = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_string {
            if b == b'\\' && i + 1 < bytes.len() {
                i += 2;
                continue;
            }
            if b == b'\'' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        match b {
            b'\'' => in_string = true,
            b'(' => depth += 1,
            b')' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    parts.push(&text[start..]);
    parts
}
