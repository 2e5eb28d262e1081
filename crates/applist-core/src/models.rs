use serde::{Deserialize, Serialize};

/// Version label used when the registry doesn't carry one.
pub const UNKNOWN_VERSION: &str = "未知版本";

/// One installed application as seen in a catalog snapshot - the star of the show.
///
/// `identifier` is unique within a snapshot and is the stable key the
/// presentation layer uses; `name` carries no uniqueness guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppEntry {
    pub name: String,
    pub identifier: String,
    pub version_label: String,
    /// Monotonic version ordinal, independent of `version_label`.
    pub version_code: i64,
    /// Unix millis; 0 means unknown.
    pub install_time: i64,
    /// Unix millis; 0 means unknown.
    pub update_time: i64,
    pub is_system: bool,
    /// The catalog only records whether an icon exists; rendering is the
    /// presentation layer's problem and never reaches the export formats.
    pub has_icon: bool,
}

impl AppEntry {
    /// Sort key for catalog ordering: name case-insensitive, identifier as
    /// the deterministic tiebreak.
    pub fn sort_key(&self) -> (String, &str) {
        (self.name.to_lowercase(), self.identifier.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, identifier: &str) -> AppEntry {
        AppEntry {
            name: name.to_string(),
            identifier: identifier.to_string(),
            version_label: "1.0".to_string(),
            version_code: 1,
            install_time: 0,
            update_time: 0,
            is_system: false,
            has_icon: false,
        }
    }

    #[test]
    fn sort_key_ignores_case_and_breaks_ties_by_identifier() {
        let a = entry("Zeta", "a.zeta");
        let b = entry("zeta", "b.zeta");
        assert!(a.sort_key() < b.sort_key());

        let lower = entry("alpha", "x");
        let upper = entry("Beta", "y");
        assert!(lower.sort_key() < upper.sort_key());
    }
}
