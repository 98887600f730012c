//! A deliberately narrow, hand-rolled Apex source scanner (spec.md §4.8 step 1).
//!
//! This is not a full Apex grammar — just enough structural recognition
//! (class/interface declarations, method and constructor declarations, and
//! brace nesting) to locate a class or method by name. Comments and string
//! literals are blanked out first so their contents never get mistaken for
//! structure; blanking (rather than deleting) keeps every later byte offset
//! valid against the original source.

use apex_log_core::text::LineIndex;

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Nature {
    Class,
    Method,
    Constructor,
}

/// One recognized declaration in the scanned source (spec.md §4.8 step 1).
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct AstNode {
    pub nature: Nature,
    /// Lowercased, for case-insensitive lookups (spec.md: "parse...
    /// case-insensitively").
    pub name: String,
    pub line: u32,
    pub id_character: u32,
    /// Comma-joined, lowercased, whitespace-stripped parameter *types* (not
    /// names) — `None` for classes. E.g. `String a, Integer b` becomes
    /// `"string,integer"`.
    pub params: Option<String>,
    pub children: Vec<AstNode>,
}

const BLOCK_KEYWORDS: &[&str] = &["if", "for", "while", "switch", "catch", "try", "else", "do", "finally"];

/// Parses `source` into its top-level declarations (usually a single outer
/// class, occasionally more than one top-level type per file).
pub fn parse(source: &str) -> Vec<AstNode> {
    let blanked = blank_comments_and_strings(source);
    let line_index = LineIndex::new(source);
    let mut scanner = Scanner {
        bytes: blanked.as_bytes(),
        source,
        line_index: &line_index,
        pos: 0,
    };
    scanner.parse_block(None)
}

struct Scanner<'a> {
    /// Comment/string-blanked copy, used only for structural scanning.
    bytes: &'a [u8],
    /// Original text, sliced for identifier names (blanking never changes
    /// non-comment/string bytes, so offsets line up).
    source: &'a str,
    line_index: &'a LineIndex,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn parse_block(&mut self, enclosing_class: Option<&str>) -> Vec<AstNode> {
        let mut nodes = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                _ => {
                    if let Some(node) = self.parse_declaration(enclosing_class, &mut nodes) {
                        nodes.push(node);
                    }
                }
            }
        }
        nodes
    }

    fn skip_whitespace(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    /// Reads one declaration head (everything up to the next top-level `{`,
    /// `;`, or EOF, with bracket/paren nesting tracked so commas and braces
    /// inside a parameter list or generic type don't terminate early).
    ///
    /// Returns `Some(node)` for a class/interface/enum or a method/constructor
    /// *with a body*; for anything else (a field, a statement, a control-flow
    /// block, an abstract/interface method with no body) it consumes the
    /// matching `{...}` (if any) without producing a node, but the nested
    /// block is still parsed for any classes defined in its midst.
    fn parse_declaration(&mut self, enclosing_class: Option<&str>, siblings: &mut Vec<AstNode>) -> Option<AstNode> {
        let head_start = self.pos;
        let mut depth = 0i32;
        let mut terminator = None;
        while let Some(b) = self.peek() {
            match b {
                b'(' | b'[' | b'<' => depth += 1,
                b')' | b']' | b'>' if depth > 0 => depth -= 1,
                b'{' | b';' if depth <= 0 => {
                    terminator = Some(b);
                    break;
                }
                // An unmatched `}` at depth 0 belongs to the *enclosing*
                // block (e.g. the trailing value in an `enum { A, B, C }`
                // body, which has no `;`/`{` of its own) — stop here without
                // consuming it so `parse_block`'s own loop sees it next.
                b'}' if depth <= 0 => break,
                _ => {}
            }
            self.pos += 1;
        }
        let head = &self.source[head_start..self.pos];
        let has_body = terminator == Some(b'{');
        if terminator.is_some() {
            self.pos += 1; // consume `{` or `;`
        }

        let parsed = classify_head(head, enclosing_class);

        match parsed {
            Some(Declared::Type { name, name_offset }) => {
                let (line, id_character) = self.line_col(name_offset);
                let children = if has_body {
                    self.parse_block(Some(&name))
                } else {
                    Vec::new()
                };
                Some(AstNode {
                    nature: Nature::Class,
                    name: name.to_ascii_lowercase(),
                    line,
                    id_character,
                    params: None,
                    children,
                })
            }
            Some(Declared::Method { name, name_offset, params, is_constructor }) => {
                let (line, id_character) = self.line_col(name_offset);
                if has_body {
                    // Method/constructor bodies may still contain local
                    // classes in principle; Apex doesn't support them, but
                    // parsing defensively costs nothing.
                    let nested = self.parse_block(enclosing_class);
                    siblings.extend(nested.into_iter().filter(|n| n.nature == Nature::Class));
                }
                Some(AstNode {
                    nature: if is_constructor { Nature::Constructor } else { Nature::Method },
                    name: name.to_ascii_lowercase(),
                    line,
                    id_character,
                    params: Some(params),
                    children: Vec::new(),
                })
            }
            None => {
                if has_body {
                    let nested = self.parse_block(enclosing_class);
                    siblings.extend(nested.into_iter().filter(|n| n.nature == Nature::Class));
                }
                None
            }
        }
    }

    fn line_col(&self, offset: usize) -> (u32, u32) {
        let lc = self
            .line_index
            .line_col(apex_log_core::text::TextSize::from(offset as u32));
        (lc.line, lc.col)
    }
}

enum Declared<'a> {
    Type {
        name: &'a str,
        name_offset: usize,
    },
    Method {
        name: &'a str,
        name_offset: usize,
        params: String,
        is_constructor: bool,
    },
}

/// Classifies one declaration head (the text between two top-level
/// delimiters) as a type, a method/constructor, or neither.
fn classify_head<'a>(head: &'a str, enclosing_class: Option<&str>) -> Option<Declared<'a>> {
    if let Some((keyword_end, name_start)) = find_keyword_then_identifier(head, &["class", "interface", "enum"]) {
        let name_end = identifier_end(head, name_start);
        let name = &head[name_start..name_end];
        let _ = keyword_end;
        return Some(Declared::Type {
            name,
            name_offset: name_start,
        });
    }

    // A method/constructor head has the shape `<modifiers/type> name(params)`,
    // with nothing but whitespace between the closing `)` and the end of the
    // head (throws clauses aside — Apex has none, unlike Java).
    let open_paren = head.find('(')?;
    let close_paren = find_matching_paren(head, open_paren)?;

    let before_paren = head[..open_paren].trim_end();
    let name_start = before_paren
        .rfind(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|i| i + 1)
        .unwrap_or(0);
    let name = &before_paren[name_start..];
    if name.is_empty() || !name.chars().next().unwrap().is_alphabetic() {
        return None;
    }
    if BLOCK_KEYWORDS.iter().any(|kw| kw.eq_ignore_ascii_case(name)) {
        return None;
    }

    let raw_params = &head[open_paren + 1..close_paren];
    let params = normalize_param_types(raw_params);
    let is_constructor = enclosing_class.is_some_and(|c| c.eq_ignore_ascii_case(name));

    Some(Declared::Method {
        name,
        name_offset: name_start,
        params,
        is_constructor,
    })
}

fn find_keyword_then_identifier(head: &str, keywords: &[&str]) -> Option<(usize, usize)> {
    let lower = head.to_ascii_lowercase();
    for keyword in keywords {
        let mut search_from = 0;
        while let Some(rel) = lower[search_from..].find(keyword) {
            let idx = search_from + rel;
            let before_ok = idx == 0 || !lower.as_bytes()[idx - 1].is_ascii_alphanumeric() && lower.as_bytes()[idx - 1] != b'_';
            let after = idx + keyword.len();
            let after_ok = after >= lower.len() || lower.as_bytes()[after].is_ascii_whitespace();
            if before_ok && after_ok {
                let rest = head[after..].trim_start();
                let skip = head[after..].len() - rest.len();
                let name_start = after + skip;
                if name_start < head.len() && head.as_bytes()[name_start].is_ascii_alphabetic() {
                    return Some((after, name_start));
                }
            }
            search_from = idx + keyword.len();
        }
    }
    None
}

fn identifier_end(head: &str, start: usize) -> usize {
    head[start..]
        .char_indices()
        .take_while(|(_, c)| c.is_alphanumeric() || *c == '_')
        .last()
        .map(|(i, c)| start + i + c.len_utf8())
        .unwrap_or(start)
}

fn find_matching_paren(head: &str, open: usize) -> Option<usize> {
    let bytes = head.as_bytes();
    let mut depth = 0i32;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// `"String a, Integer b"` -> `"string,integer"`: drop parameter names,
/// lowercase the remaining type, strip all whitespace.
fn normalize_param_types(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    raw.split(',')
        .map(|segment| {
            let segment = segment.trim();
            let last_space = segment.rfind(char::is_whitespace);
            let type_part = match last_space {
                Some(idx) => &segment[..idx],
                None => segment,
            };
            type_part.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase()
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Blanks out `//...` and `/*...*/` comments and `'...'` string literals with
/// spaces (newlines preserved) so the structural scanner never trips over
/// braces or parens inside them, while every byte offset stays valid.
fn blank_comments_and_strings(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = vec![b' '; bytes.len()];
    let mut i = 0;
    #[derive(PartialEq)]
    enum Mode {
        Code,
        LineComment,
        BlockComment,
        StringLit,
    }
    let mut mode = Mode::Code;
    while i < bytes.len() {
        let b = bytes[i];
        match mode {
            Mode::Code => {
                if b == b'/' && bytes.get(i + 1) == Some(&b'/') {
                    mode = Mode::LineComment;
                    out[i] = b' ';
                } else if b == b'/' && bytes.get(i + 1) == Some(&b'*') {
                    mode = Mode::BlockComment;
                    out[i] = b' ';
                } else if b == b'\'' {
                    mode = Mode::StringLit;
                    out[i] = b' ';
                } else {
                    out[i] = b;
                }
            }
            Mode::LineComment => {
                if b == b'\n' {
                    mode = Mode::Code;
                    out[i] = b'\n';
                } else {
                    out[i] = b' ';
                }
            }
            Mode::BlockComment => {
                if b == b'*' && bytes.get(i + 1) == Some(&b'/') {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                    mode = Mode::Code;
                } else {
                    out[i] = if b == b'\n' { b'\n' } else { b' ' };
                }
            }
            Mode::StringLit => {
                if b == b'\\' && i + 1 < bytes.len() {
                    out[i] = b' ';
                    out[i + 1] = b' ';
                    i += 1;
                } else if b == b'\'' {
                    mode = Mode::Code;
                    out[i] = b' ';
                } else {
                    out[i] = if b == b'\n' { b'\n' } else { b' ' };
                }
            }
        }
        i += 1;
    }
    // SAFETY-free: every byte we wrote is either an original ASCII-range
    // source byte we copied verbatim (`Mode::Code` non-comment path) or a
    // plain space/newline we chose ourselves, so the buffer stays valid
    // UTF-8 as long as the original source was (multi-byte UTF-8 sequences
    // are only ever copied whole, never split, because blanking only
    // replaces ASCII delimiter bytes one at a time).
    String::from_utf8(out).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn finds_outer_class_and_method() {
        let src = "public class Foo {\n    public void bar() {\n        System.debug('hi');\n    }\n}\n";
        let roots = parse(src);
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name, "foo");
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].nature, Nature::Method);
        assert_eq!(roots[0].children[0].name, "bar");
        assert_eq!(roots[0].children[0].params.as_deref(), Some(""));
    }

    #[test]
    fn finds_constructor_by_matching_class_name() {
        let src = "public class Foo {\n    public Foo(String a) {\n    }\n}\n";
        let roots = parse(src);
        let ctor = &roots[0].children[0];
        assert_eq!(ctor.nature, Nature::Constructor);
        assert_eq!(ctor.params.as_deref(), Some("string"));
    }

    #[test]
    fn finds_inner_class_and_its_method() {
        let src = "public class Outer {\n    public class Inner {\n        void m(Integer x, String y) {}\n    }\n}\n";
        let roots = parse(src);
        let inner = roots[0]
            .children
            .iter()
            .find(|n| n.nature == Nature::Class && n.name == "inner")
            .unwrap();
        assert_eq!(inner.children.len(), 1);
        assert_eq!(inner.children[0].name, "m");
        assert_eq!(inner.children[0].params.as_deref(), Some("integer,string"));
    }

    #[test]
    fn ignores_control_flow_parens_and_comments() {
        let src = "public class Foo {\n    /* a (fake) method */\n    void m() {\n        if (true) {\n            for (Integer i = 0; i < 1; i++) {}\n        }\n    }\n}\n";
        let roots = parse(src);
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].name, "m");
    }

    #[test]
    fn enum_body_does_not_swallow_the_rest_of_the_file() {
        let src = "public class Foo {\n    public enum Color { RED, GREEN, BLUE }\n    public void bar() {}\n}\n";
        let roots = parse(src);
        assert_eq!(roots[0].name, "foo");
        assert!(roots[0].children.iter().any(|n| n.name == "bar" && n.nature == Nature::Method));
    }

    #[test]
    fn interface_method_with_no_body_is_still_recorded() {
        let src = "public interface Foo {\n    void bar(String a);\n}\n";
        let roots = parse(src);
        assert_eq!(roots[0].name, "foo");
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].name, "bar");
    }
}
