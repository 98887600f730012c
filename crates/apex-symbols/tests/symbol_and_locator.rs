use apex_symbols::{locate_symbol, parse_symbol};
use pretty_assertions::assert_eq;

/// spec.md §8 S6.
#[test]
fn parses_a_symbol_with_a_namespace_and_inner_class() {
    let symbol = parse_symbol("ns.MyClass.Inner.m(String)", &["ns"]).unwrap();
    assert_eq!(symbol.namespace.as_deref(), Some("ns"));
    assert_eq!(symbol.outer_class, "MyClass");
    assert_eq!(symbol.inner_class.as_deref(), Some("Inner"));
    assert_eq!(symbol.method, "m");
    assert_eq!(symbol.parameters, "String");
}

#[test]
fn end_to_end_locate_a_trigger_handler_method() {
    let source = r#"
public without sharing class AccountTriggerHandler {
    public void beforeInsert(List<Account> newAccounts) {
        for (Account acc : newAccounts) {
            acc.Name = acc.Name.trim();
        }
    }

    public void afterUpdate(List<Account> oldAccounts, List<Account> newAccounts) {
    }
}
"#;
    let symbol = parse_symbol("AccountTriggerHandler.afterUpdate(List<Account>,List<Account>)", &[]).unwrap();
    let location = locate_symbol(source, &symbol);
    assert!(location.is_exact_match);
    assert_eq!(location.missing_symbol, None);
}

#[test]
fn degrades_gracefully_when_method_was_renamed() {
    let source = "public class Widget {\n    public void build() {}\n}\n";
    let symbol = parse_symbol("Widget.buildNow()", &[]).unwrap();
    let location = locate_symbol(source, &symbol);
    assert!(!location.is_exact_match);
    assert_eq!(location.missing_symbol.as_deref(), Some("buildNow"));
}
