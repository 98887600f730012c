use serde::Serialize;

/// Severity of a recorded log issue or lint finding.
///
/// Mirrors the small, closed severity sets used throughout this workspace:
/// issues raised by the tree builder are always `Error` or `Warning`
/// (§4.6/§7 of the spec), while SOQL lint findings additionally use `Info`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
