//! Splits a fully-qualified Apex debug-log symbol into its parts
//! (spec.md §4.7): `[namespace.]OuterClass[.InnerClass].method(paramTypes)`.

use crate::error::SymbolError;

/// A parsed fully-qualified Apex symbol, as it appears in `METHOD_ENTRY` /
/// `CONSTRUCTOR_ENTRY` / `CODE_UNIT_STARTED` text.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ApexSymbol {
    /// The untouched input string; `parse_symbol(s, ..).full_symbol == s`
    /// always holds (spec.md §8 invariant 6).
    pub full_symbol: String,
    pub namespace: Option<String>,
    pub outer_class: String,
    pub inner_class: Option<String>,
    pub method: String,
    /// Raw, comma-joined parameter type list, exactly as written between the
    /// outermost parentheses (not re-split here; `apex-soql`/`apex-symbols`
    /// callers split on `,` themselves if they need individual types).
    pub parameters: String,
}

/// Parses `symbol` into its namespace/class/method parts.
///
/// `known_namespaces` is the caller's set of namespaces that belong to the
/// current project (spec.md §4.7 step 3b) — this crate never discovers that
/// set itself, it is handed in by value.
pub fn parse_symbol(symbol: &str, known_namespaces: &[&str]) -> Result<ApexSymbol, SymbolError> {
    let (dotted_path, parameters) = split_path_and_parameters(symbol);

    let parts: Vec<&str> = dotted_path.split('.').collect();
    if parts.is_empty() || parts.iter().any(|p| p.is_empty()) {
        return Err(SymbolError::InvalidSymbol(symbol.to_string()));
    }

    let has_namespace = parts.len() == 4
        || known_namespaces
            .iter()
            .any(|ns| ns.eq_ignore_ascii_case(parts[0]));

    let namespace = if has_namespace { Some(parts[0].to_string()) } else { None };
    let rest = if has_namespace { &parts[1..] } else { &parts[..] };

    if rest.len() < 2 {
        return Err(SymbolError::InvalidSymbol(symbol.to_string()));
    }

    let method = rest[rest.len() - 1].to_string();
    let outer_class = rest[0].to_string();
    let inner_class = if rest.len() >= 3 {
        Some(rest[1..rest.len() - 1].join("."))
    } else {
        None
    };

    Ok(ApexSymbol {
        full_symbol: symbol.to_string(),
        namespace,
        outer_class,
        inner_class,
        method,
        parameters,
    })
}

/// Splits on the first `(`; everything after it (minus a trailing `)`, if
/// present) is the raw parameter list.
fn split_path_and_parameters(symbol: &str) -> (&str, String) {
    match symbol.find('(') {
        Some(idx) => {
            let path = &symbol[..idx];
            let rest = &symbol[idx + 1..];
            let params = rest.strip_suffix(')').unwrap_or(rest);
            (path, params.to_string())
        }
        None => (symbol, String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn four_segments_always_implies_a_namespace() {
        let symbol = parse_symbol("ns.MyClass.Inner.m(String)", &[]).unwrap();
        assert_eq!(symbol.namespace.as_deref(), Some("ns"));
        assert_eq!(symbol.outer_class, "MyClass");
        assert_eq!(symbol.inner_class.as_deref(), Some("Inner"));
        assert_eq!(symbol.method, "m");
        assert_eq!(symbol.parameters, "String");
    }

    #[test]
    fn three_segments_with_a_known_namespace_prefix() {
        let symbol = parse_symbol("ns.MyClass.method(Integer,String)", &["ns"]).unwrap();
        assert_eq!(symbol.namespace.as_deref(), Some("ns"));
        assert_eq!(symbol.outer_class, "MyClass");
        assert_eq!(symbol.inner_class, None);
        assert_eq!(symbol.method, "method");
    }

    #[test]
    fn three_segments_without_a_known_namespace_is_outer_inner_method() {
        let symbol = parse_symbol("MyClass.Inner.method()", &["somethingelse"]).unwrap();
        assert_eq!(symbol.namespace, None);
        assert_eq!(symbol.outer_class, "MyClass");
        assert_eq!(symbol.inner_class.as_deref(), Some("Inner"));
        assert_eq!(symbol.method, "method");
    }

    #[test]
    fn two_segments_is_class_dot_method() {
        let symbol = parse_symbol("MyClass.method()", &[]).unwrap();
        assert_eq!(symbol.namespace, None);
        assert_eq!(symbol.outer_class, "MyClass");
        assert_eq!(symbol.inner_class, None);
        assert_eq!(symbol.method, "method");
    }

    #[test]
    fn full_symbol_round_trips_the_original_string_unchanged() {
        for input in [
            "ns.MyClass.Inner.m(String)",
            "MyClass.method()",
            "Outer.Inner.method(Id, List<String>)",
        ] {
            let symbol = parse_symbol(input, &["ns"]).unwrap();
            assert_eq!(symbol.full_symbol, input);
        }
    }

    #[test]
    fn single_segment_path_is_invalid() {
        let err = parse_symbol("method()", &[]).unwrap_err();
        assert_eq!(err, SymbolError::InvalidSymbol("method()".to_string()));
    }

    #[test]
    fn empty_path_segment_is_invalid() {
        let err = parse_symbol(".method()", &[]).unwrap_err();
        assert!(matches!(err, SymbolError::InvalidSymbol(_)));
    }

    #[test]
    fn missing_parentheses_is_treated_as_an_empty_parameter_list() {
        let symbol = parse_symbol("MyClass.method", &[]).unwrap();
        assert_eq!(symbol.method, "method");
        assert_eq!(symbol.parameters, "");
    }
}
