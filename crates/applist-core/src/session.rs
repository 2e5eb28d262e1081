use crate::{
    catalog::CatalogSource,
    export::{ExportOutcome, Exporter},
    models::AppEntry,
    query,
    serialize::ExportFormat,
};
use chrono::Local;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex, MutexGuard, PoisonError,
};
use tracing::{debug, info};

/// Snapshot of the user-visible session state. Observers always get a clone;
/// the live state is only ever mutated through [`Session`] operations, one
/// full field-set per transition.
#[derive(Debug, Clone, Default)]
pub struct AppListState {
    /// Last successful full load, sorted by name case-insensitively.
    pub apps: Vec<AppEntry>,
    /// Subset of `apps` matching the current query, in the same order.
    pub filtered_apps: Vec<AppEntry>,
    pub search_query: String,
    pub include_system: bool,
    pub is_loading: bool,
    pub is_exporting: bool,
    /// One-shot notices, cleared by explicit acknowledgment.
    pub last_error: Option<String>,
    pub last_export_message: Option<String>,
}

/// Single-writer coordinator over catalog loads, query filtering and exports.
///
/// Loads are generation-stamped: a load that finishes after a newer load has
/// started is discarded instead of clobbering fresher data. A load that
/// finishes after an intervening `search` applies the query current at
/// completion time, so the visible filter never lags the visible query.
pub struct Session<C: CatalogSource> {
    catalog: C,
    exporter: Exporter,
    state: Mutex<AppListState>,
    load_generation: AtomicU64,
}

impl<C: CatalogSource> Session<C> {
    pub fn new(catalog: C, exporter: Exporter) -> Self {
        Self {
            catalog,
            exporter,
            state: Mutex::new(AppListState::default()),
            load_generation: AtomicU64::new(0),
        }
    }

    /// Read-only snapshot for observers.
    pub fn state(&self) -> AppListState {
        self.lock_state().clone()
    }

    /// Reload the catalog. On failure the previous `apps` are kept and the
    /// error lands in `last_error`.
    pub async fn load(&self) {
        let generation = self.load_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let include_system = {
            let mut state = self.lock_state();
            state.is_loading = true;
            state.last_error = None;
            state.include_system
        };

        let result = self.catalog.list_entries(include_system).await;

        let mut state = self.lock_state();
        if self.load_generation.load(Ordering::SeqCst) != generation {
            debug!("discarding stale catalog load (generation {})", generation);
            return;
        }
        match result {
            Ok(apps) => {
                let filtered = query::filter(&apps, &state.search_query);
                info!("loaded {} apps ({} after filter)", apps.len(), filtered.len());
                state.apps = apps;
                state.filtered_apps = filtered;
                state.is_loading = false;
                state.last_error = None;
            }
            Err(e) => {
                state.is_loading = false;
                state.last_error = Some(format!("加载应用列表失败: {}", e));
            }
        }
    }

    /// Update the query and recompute the filtered view. Synchronous and
    /// total: filtering is a pure function over the already-loaded snapshot.
    pub fn search(&self, query: impl Into<String>) {
        let query = query.into();
        let mut state = self.lock_state();
        let filtered = query::filter(&state.apps, &query);
        state.search_query = query;
        state.filtered_apps = filtered;
    }

    /// Flip system-app visibility and reload. Classification is enforced at
    /// the catalog, not the query stage, so this costs a full load.
    pub async fn toggle_system(&self) {
        {
            let mut state = self.lock_state();
            state.include_system = !state.include_system;
        }
        self.load().await;
    }

    /// Export the current filtered view. No-op with a notice when there is
    /// nothing to export; silent no-op while another export is in flight.
    pub async fn export(&self, format: ExportFormat) {
        self.export_inner(format, None, false).await;
    }

    /// As [`Session::export`], with a caller-provided artifact name instead
    /// of the generated one. Same guards.
    pub async fn export_named(&self, format: ExportFormat, file_name: &str) {
        self.export_inner(format, Some(file_name), false).await;
    }

    /// As [`Session::export`], handing the artifact to the share mechanism on
    /// success. The share hand-off is best-effort and never turns a
    /// successful export into a failure.
    pub async fn export_and_share(&self, format: ExportFormat) {
        self.export_inner(format, None, true).await;
    }

    /// As [`Session::export_named`], sharing the artifact on success.
    pub async fn export_named_and_share(&self, format: ExportFormat, file_name: &str) {
        self.export_inner(format, Some(file_name), true).await;
    }

    pub fn clear_error(&self) {
        self.lock_state().last_error = None;
    }

    pub fn clear_export_notice(&self) {
        self.lock_state().last_export_message = None;
    }

    /// Claim the export slot. Returns the snapshot to export, or None when
    /// the filtered view is empty (notice set) or an export is already in
    /// flight (silent - at most one export at a time).
    fn begin_export(&self) -> Option<(Vec<AppEntry>, String)> {
        let mut state = self.lock_state();
        if state.is_exporting {
            debug!("export already in flight, ignoring request");
            return None;
        }
        if state.filtered_apps.is_empty() {
            state.last_export_message = Some("没有应用可以导出".to_string());
            return None;
        }
        state.is_exporting = true;
        state.last_export_message = None;
        state.last_error = None;
        Some((state.filtered_apps.clone(), state.search_query.clone()))
    }

    async fn export_inner(&self, format: ExportFormat, file_name: Option<&str>, share: bool) {
        let Some((apps, query)) = self.begin_export() else {
            return;
        };
        let hint = match file_name {
            Some(name) => name.to_string(),
            None => format!(
                "app_list_{}_{}",
                file_name_context(&query),
                Local::now().timestamp_millis()
            ),
        };
        let outcome = self.exporter.export(&apps, format, Some(&hint)).await;

        if share && outcome.success {
            if let (Some(path), Some(mime)) = (&outcome.artifact_path, outcome.mime_type) {
                self.exporter.share_artifact(path, mime);
                let mut state = self.lock_state();
                state.is_exporting = false;
                state.last_export_message =
                    Some(format!("成功导出并分享 {} 个应用", outcome.exported_count));
                return;
            }
        }
        self.finish_export(&outcome);
    }

    fn finish_export(&self, outcome: &ExportOutcome) {
        let mut state = self.lock_state();
        state.is_exporting = false;
        state.last_export_message = Some(if outcome.success {
            let path = outcome
                .artifact_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            format!("成功导出 {} 个应用到:\n{}", outcome.exported_count, path)
        } else {
            format!(
                "导出失败: {}",
                outcome.error_detail.as_deref().unwrap_or("unknown")
            )
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, AppListState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Query segment of a generated artifact name. Path separators map to
/// underscores so a hostile query cannot steer the write out of the export
/// directory.
fn file_name_context(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return "all".to_string();
    }
    trimmed
        .chars()
        .map(|c| if std::path::is_separator(c) { '_' } else { c })
        .collect()
}
