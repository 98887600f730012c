//! Maps a parsed [`crate::ApexSymbol`] onto a location inside an Apex source
//! file (spec.md §4.8).

use crate::ast::{self, AstNode, Nature};
use crate::parser::ApexSymbol;

/// The result of looking up a symbol in a source file. A miss is never an
/// error (spec.md §7): `is_exact_match` downgrades to `false` and
/// `missing_symbol` names what couldn't be found, with `line`/`character`
/// falling back to the best-known enclosing class.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SymbolLocation {
    pub line: u32,
    pub character: u32,
    pub is_exact_match: bool,
    pub missing_symbol: Option<String>,
}

/// Parses `source_text` and locates `symbol` within it.
pub fn locate_symbol(source_text: &str, symbol: &ApexSymbol) -> SymbolLocation {
    let roots = ast::parse(source_text);

    let Some(outer) = find_class(&roots, &symbol.outer_class) else {
        // No recognizable class at all: fall back to the very start of the
        // file rather than inventing a location.
        return SymbolLocation {
            line: 0,
            character: 0,
            is_exact_match: false,
            missing_symbol: Some(symbol.outer_class.clone()),
        };
    };

    let resolved_class = match &symbol.inner_class {
        Some(inner) => match find_class(&outer.children, inner) {
            Some(inner_node) => inner_node,
            None => {
                return SymbolLocation {
                    line: outer.line,
                    character: outer.id_character,
                    is_exact_match: false,
                    missing_symbol: Some(inner.clone()),
                };
            }
        },
        None => outer,
    };

    let symbol_params = normalize_symbol_params(&symbol.parameters);
    let stripped_params = strip_outer_qualifier(&symbol_params, &symbol.outer_class);

    let method = find_method(resolved_class, &symbol.method, &symbol_params)
        .or_else(|| find_method(resolved_class, &symbol.method, &stripped_params));

    match method {
        Some(node) => SymbolLocation {
            line: node.line,
            character: node.id_character,
            is_exact_match: true,
            missing_symbol: None,
        },
        None => SymbolLocation {
            line: resolved_class.line,
            character: resolved_class.id_character,
            is_exact_match: false,
            missing_symbol: Some(symbol.method.clone()),
        },
    }
}

fn find_class<'a>(nodes: &'a [AstNode], name: &str) -> Option<&'a AstNode> {
    nodes
        .iter()
        .find(|n| n.nature == Nature::Class && n.name.eq_ignore_ascii_case(name))
}

fn find_method<'a>(class_node: &'a AstNode, name: &str, params: &str) -> Option<&'a AstNode> {
    class_node.children.iter().find(|n| {
        matches!(n.nature, Nature::Method | Nature::Constructor)
            && n.name.eq_ignore_ascii_case(name)
            && n.params.as_deref() == Some(params)
    })
}

/// Normalizes the symbol's raw parameter-type list (as it appears in the
/// debug log) the same way [`crate::ast`] normalizes a declared parameter
/// list: lowercase, whitespace stripped, comma-joined types.
fn normalize_symbol_params(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    raw.split(',')
        .map(|t| t.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(",")
}

/// Second lookup attempt (spec.md §4.8 step 4): strip a leading
/// `OuterClass.` qualifier from each parameter type, so a log symbol that
/// spells out `Outer.Inner` for a parameter type matches a declaration that
/// only wrote the unqualified `Inner`.
fn strip_outer_qualifier(normalized_params: &str, outer_class: &str) -> String {
    if normalized_params.is_empty() {
        return String::new();
    }
    let prefix = format!("{}.", outer_class.to_ascii_lowercase());
    normalized_params
        .split(',')
        .map(|t| t.strip_prefix(prefix.as_str()).unwrap_or(t).to_string())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_symbol;
    use pretty_assertions::assert_eq;

    #[test]
    fn locates_a_top_level_method() {
        let src = "public class Foo {\n    public void bar() {\n    }\n}\n";
        let symbol = parse_symbol("Foo.bar()", &[]).unwrap();
        let loc = locate_symbol(src, &symbol);
        assert!(loc.is_exact_match);
        assert_eq!(loc.missing_symbol, None);
        assert_eq!(loc.line, 1);
    }

    #[test]
    fn locates_a_method_with_matching_parameter_types() {
        let src = "public class Foo {\n    public void bar(String a, Integer b) {\n    }\n}\n";
        let symbol = parse_symbol("Foo.bar(String,Integer)", &[]).unwrap();
        let loc = locate_symbol(src, &symbol);
        assert!(loc.is_exact_match);
    }

    #[test]
    fn strips_outer_qualifier_from_parameter_types_on_second_attempt() {
        let src = "public class Foo {\n    public class Inner {}\n    public void bar(Inner a) {\n    }\n}\n";
        let symbol = parse_symbol("Foo.bar(Foo.Inner)", &[]).unwrap();
        let loc = locate_symbol(src, &symbol);
        assert!(loc.is_exact_match, "{loc:?}");
    }

    #[test]
    fn missing_method_falls_back_to_the_class_location() {
        let src = "public class Foo {\n    public void bar() {\n    }\n}\n";
        let symbol = parse_symbol("Foo.missing()", &[]).unwrap();
        let loc = locate_symbol(src, &symbol);
        assert!(!loc.is_exact_match);
        assert_eq!(loc.missing_symbol.as_deref(), Some("missing"));
        assert_eq!(loc.line, 0);
    }

    #[test]
    fn missing_class_falls_back_to_file_start() {
        let src = "public class Foo {\n}\n";
        let symbol = parse_symbol("Bar.method()", &[]).unwrap();
        let loc = locate_symbol(src, &symbol);
        assert!(!loc.is_exact_match);
        assert_eq!(loc.missing_symbol.as_deref(), Some("Bar"));
        assert_eq!((loc.line, loc.character), (0, 0));
    }

    #[test]
    fn finds_inner_class_method() {
        let src = "public class Outer {\n    public class Inner {\n        void go() {}\n    }\n}\n";
        let symbol = parse_symbol("Outer.Inner.go()", &[]).unwrap();
        let loc = locate_symbol(src, &symbol);
        assert!(loc.is_exact_match);
    }

    #[test]
    fn leading_namespace_is_dropped_when_locating_in_a_single_file() {
        // The namespace only matters for which *file* to open (the caller's
        // concern); within one already-selected file it never maps onto a
        // class segment, so it's discarded here (spec.md §4.8 step 2 /
        // DESIGN.md's resolution of the corresponding Open Question).
        let src = "public class Foo {\n    public void bar() {\n    }\n}\n";
        let symbol = parse_symbol("ns.Foo.Inner.bar()", &["ns"]).unwrap();
        assert_eq!(symbol.namespace.as_deref(), Some("ns"));
        let loc = locate_symbol(src, &symbol);
        // `Inner` doesn't exist, so we still degrade gracefully to `Foo`.
        assert!(!loc.is_exact_match);
    }
}
