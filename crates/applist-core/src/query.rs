use crate::models::AppEntry;

/// Filter a catalog snapshot by a text query.
///
/// Pure and total: a blank query returns the input unchanged, anything else
/// keeps entries whose name or identifier contains the query
/// case-insensitively, preserving input order. System/user classification is
/// enforced upstream by the catalog, never re-checked here.
pub fn filter(entries: &[AppEntry], query: &str) -> Vec<AppEntry> {
    if query.trim().is_empty() {
        return entries.to_vec();
    }
    let needle = query.to_lowercase();
    entries
        .iter()
        .filter(|e| {
            e.name.to_lowercase().contains(&needle)
                || e.identifier.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
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

    fn snapshot() -> Vec<AppEntry> {
        vec![
            entry("alpha", "org.alpha"),
            entry("Beta", "org.beta"),
            entry("Zeta", "org.zeta"),
        ]
    }

    #[test]
    fn blank_query_returns_input_unchanged() {
        let apps = snapshot();
        assert_eq!(filter(&apps, ""), apps);
        assert_eq!(filter(&apps, "   "), apps);
    }

    #[test]
    fn matches_name_or_identifier_case_insensitively() {
        let apps = snapshot();
        // All three contain an "a" somewhere (Zeta via name, Beta via both).
        let hits = filter(&apps, "a");
        assert_eq!(hits, apps);

        let hits = filter(&apps, "BETA");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Beta");

        // Identifier-only match.
        let hits = filter(&apps, "org.zeta");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "Zeta");
    }

    #[test]
    fn preserves_relative_order_of_input() {
        let apps = snapshot();
        let hits = filter(&apps, "eta");
        let names: Vec<&str> = hits.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Beta", "Zeta"]);
    }

    #[test]
    fn no_match_yields_empty() {
        assert!(filter(&snapshot(), "does-not-exist").is_empty());
    }
}
