use crate::{
    models::{AppEntry, UNKNOWN_VERSION},
    Error, Result,
};
use std::path::PathBuf;
use tracing::{debug, info};

/// Boundary to the OS application registry.
///
/// Keeping this a trait means the session coordinator can be tested against
/// an in-memory catalog instead of a real registry.
#[async_trait::async_trait]
pub trait CatalogSource: Send + Sync {
    /// List installed applications, sorted by name (case-insensitive) with
    /// identifier as tiebreak. `include_system` controls whether entries
    /// classified as system-owned appear at all.
    async fn list_entries(&self, include_system: bool) -> Result<Vec<AppEntry>>;
}

/// Catalog backed by a dpkg-style status registry.
///
/// The status file is the source of truth for what is installed; per-package
/// install manifests under the info directory supply timestamps. A package
/// we fail to resolve is skipped - a partial catalog beats no catalog.
pub struct DpkgCatalog {
    status_path: PathBuf,
    info_dir: PathBuf,
}

impl DpkgCatalog {
    pub fn new() -> Self {
        Self {
            status_path: PathBuf::from("/var/lib/dpkg/status"),
            info_dir: PathBuf::from("/var/lib/dpkg/info"),
        }
    }

    pub fn with_paths(status_path: impl Into<PathBuf>, info_dir: impl Into<PathBuf>) -> Self {
        Self {
            status_path: status_path.into(),
            info_dir: info_dir.into(),
        }
    }

    fn parse_stanza(&self, stanza: &str) -> Option<AppEntry> {
        let mut package = None;
        let mut version = None;
        let mut architecture = None;
        let mut status = None;
        let mut priority = None;
        let mut essential = false;

        for line in stanza.lines() {
            // Continuation lines (descriptions etc.) carry nothing we need.
            if line.starts_with(' ') || line.starts_with('\t') {
                continue;
            }
            let (key, value) = line.split_once(':')?;
            let value = value.trim();
            match key {
                "Package" => package = Some(value.to_string()),
                "Version" => version = Some(value.to_string()),
                "Architecture" => architecture = Some(value.to_string()),
                "Status" => status = Some(value.to_string()),
                "Priority" => priority = Some(value.to_string()),
                "Essential" => essential = value.eq_ignore_ascii_case("yes"),
                _ => {}
            }
        }

        // Not installed (config-files leftovers, half-configured) means not
        // a catalog entry, not an error.
        if status.as_deref() != Some("install ok installed") {
            return None;
        }

        let package = package?;
        let is_system = essential
            || matches!(priority.as_deref(), Some("required") | Some("important"));
        let architecture = architecture.unwrap_or_else(|| "all".to_string());
        let identifier = format!("{}:{}", package, architecture);

        let version_label = version.unwrap_or_else(|| UNKNOWN_VERSION.to_string());
        let version_code = version_ordinal(&version_label);
        let (install_time, update_time) = self.manifest_times(&package, &architecture);

        Some(AppEntry {
            name: package,
            identifier,
            version_label,
            version_code,
            install_time,
            update_time,
            is_system,
            has_icon: false,
        })
    }

    /// Timestamps come from the package's install manifest. Missing manifest
    /// or unreadable metadata yields 0 (unknown), never an error.
    fn manifest_times(&self, package: &str, architecture: &str) -> (i64, i64) {
        let plain = self.info_dir.join(format!("{}.list", package));
        let arched = self
            .info_dir
            .join(format!("{}:{}.list", package, architecture));
        let manifest = if plain.exists() { plain } else { arched };

        match std::fs::metadata(&manifest) {
            Ok(meta) => {
                let update = meta.modified().ok().map(unix_millis).unwrap_or(0);
                let install = meta.created().ok().map(unix_millis).unwrap_or(update);
                (install, update)
            }
            Err(_) => (0, 0),
        }
    }
}

impl Default for DpkgCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CatalogSource for DpkgCatalog {
    async fn list_entries(&self, include_system: bool) -> Result<Vec<AppEntry>> {
        let status = tokio::fs::read_to_string(&self.status_path)
            .await
            .map_err(|e| {
                Error::CatalogUnavailable(format!(
                    "cannot read registry {}: {}",
                    self.status_path.display(),
                    e
                ))
            })?;

        let mut entries = Vec::new();
        for stanza in status.split("\n\n").filter(|s| !s.trim().is_empty()) {
            // Classification must be decidable from the stanza alone, so
            // system entries are dropped before detail resolution runs.
            if !include_system && stanza_is_system(stanza) {
                continue;
            }
            match self.parse_stanza(stanza) {
                Some(entry) => entries.push(entry),
                None => debug!("skipping unresolvable registry stanza"),
            }
        }

        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        info!("catalog snapshot: {} entries", entries.len());
        Ok(entries)
    }
}

/// Cheap classification check on the raw stanza, used to exclude system
/// packages before any per-entry resolution work.
fn stanza_is_system(stanza: &str) -> bool {
    for line in stanza.lines() {
        if let Some(value) = line.strip_prefix("Essential:") {
            if value.trim().eq_ignore_ascii_case("yes") {
                return true;
            }
        }
        if let Some(value) = line.strip_prefix("Priority:") {
            if matches!(value.trim(), "required" | "important") {
                return true;
            }
        }
    }
    false
}

/// Pack the leading numeric components of a version label into a monotonic
/// 64-bit ordinal. The registry has no native ordinal field, so comparisons
/// within one package line stay consistent as long as upstream versioning is
/// sane. The leading component keeps 31 bits because date-based upstream
/// versions (20240203 style) are common here; the next two components get 16
/// bits each. The result is never negative.
pub fn version_ordinal(label: &str) -> i64 {
    let numeric_end = label
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(label.len());
    let mut components = label[..numeric_end]
        .split('.')
        .map(|c| c.parse::<i64>().unwrap_or(0));
    let major = components.next().unwrap_or(0).min(0x7FFF_FFFF);
    let minor = components.next().unwrap_or(0).min(0xFFFF);
    let patch = components.next().unwrap_or(0).min(0xFFFF);
    (major << 32) | (minor << 16) | patch
}

fn unix_millis(t: std::time::SystemTime) -> i64 {
    t.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Fixed catalog for tests and demos: hands back a pre-built snapshot,
/// honoring the same ordering and classification contract as the real one.
pub struct StaticCatalog {
    entries: Vec<AppEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<AppEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait::async_trait]
impl CatalogSource for StaticCatalog {
    async fn list_entries(&self, include_system: bool) -> Result<Vec<AppEntry>> {
        let mut entries: Vec<AppEntry> = self
            .entries
            .iter()
            .filter(|e| include_system || !e.is_system)
            .cloned()
            .collect();
        entries.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        Ok(entries)
    }
}
