use serde::Serialize;
use smol_str::SmolStr;
use std::fmt;

/// Sentinel used for the unmanaged / local namespace, matching the original
/// tool's `default` string exactly (callers match against it by value).
pub const DEFAULT_NAMESPACE: &str = "default";

/// A managed-package namespace prefix.
///
/// Namespace is never absent on a line record or tree node; the sentinel
/// [`DEFAULT_NAMESPACE`] stands in for "no namespace" (the invariant that
/// namespace is never null).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
#[serde(transparent)]
pub struct Namespace(SmolStr);

impl Namespace {
    pub fn default_namespace() -> Self {
        Namespace(SmolStr::new_inline(DEFAULT_NAMESPACE))
    }

    pub fn new(value: impl AsRef<str>) -> Self {
        Namespace(SmolStr::new(value))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn is_default(&self) -> bool {
        self.0.as_str() == DEFAULT_NAMESPACE
    }
}

impl Default for Namespace {
    fn default() -> Self {
        Namespace::default_namespace()
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

impl From<&str> for Namespace {
    fn from(value: &str) -> Self {
        Namespace::new(value)
    }
}

/// Extracts the namespace prefix from an object or field API name
/// (`key__Name` -> `key`). Names with no `__` separator have no namespace.
///
/// Only the *first* `__` counts as the namespace separator: custom object
/// names themselves routinely contain further double underscores (e.g. the
/// `__c` / `__mdt` / `__e` suffix), which must stay attached to the object
/// portion rather than being mistaken for a second namespace split.
pub fn parse_object_namespace(api_name: &str) -> Namespace {
    match api_name.split_once("__") {
        Some((prefix, _rest)) if !prefix.is_empty() => Namespace::new(prefix),
        _ => Namespace::default_namespace(),
    }
}

/// Extracts the namespace from a Visualforce page reference of the form
/// `VF: /apex/ns__Page`. Any other shape has no namespace.
pub fn parse_vf_namespace(vf_text: &str) -> Namespace {
    let Some(path) = vf_text.strip_prefix("VF: ") else {
        return Namespace::default_namespace();
    };
    let Some(page) = path.rsplit('/').next() else {
        return Namespace::default_namespace();
    };
    parse_object_namespace(page)
}
