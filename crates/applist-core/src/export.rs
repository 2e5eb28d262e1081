use crate::{
    models::AppEntry,
    serialize::{self, ExportFormat},
};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// What came out of an export attempt. The pipeline is the error containment
/// boundary for the whole export path: callers get an outcome, never an Err.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub success: bool,
    pub artifact_path: Option<PathBuf>,
    pub error_detail: Option<String>,
    pub exported_count: usize,
    pub mime_type: Option<&'static str>,
}

impl ExportOutcome {
    fn ok(path: PathBuf, count: usize, mime_type: &'static str) -> Self {
        Self {
            success: true,
            artifact_path: Some(path),
            error_detail: None,
            exported_count: count,
            mime_type: Some(mime_type),
        }
    }

    fn failed(detail: String) -> Self {
        Self {
            success: false,
            artifact_path: None,
            error_detail: Some(detail),
            exported_count: 0,
            mime_type: None,
        }
    }
}

/// Writes serialized snapshots into the export directory.
pub struct Exporter {
    export_dir: PathBuf,
}

impl Exporter {
    /// Default export location: an `AppList` folder under the platform's
    /// downloads directory, falling back to the home directory.
    pub fn new() -> Self {
        let base = dirs::download_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            export_dir: base.join("AppList"),
        }
    }

    pub fn with_dir(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    /// Serialize `entries` and write the artifact.
    ///
    /// The file name comes from `file_name_hint` (extension appended when
    /// missing) or defaults to `app_list_<timestamp>.<ext>`. The write is
    /// atomic from the caller's perspective: content lands in a temp sibling
    /// first and is renamed into place, so a failure never leaves a partial
    /// artifact behind.
    pub async fn export(
        &self,
        entries: &[AppEntry],
        format: ExportFormat,
        file_name_hint: Option<&str>,
    ) -> ExportOutcome {
        let content = match serialize::render(entries, format) {
            Ok(content) => content,
            Err(e) => return ExportOutcome::failed(format!("导出{}失败: {}", format, e)),
        };

        let file_name = self.artifact_name(file_name_hint, format);
        match self.write_atomic(&file_name, &content) {
            Ok(path) => {
                info!("exported {} entries to {}", entries.len(), path.display());
                ExportOutcome::ok(path, entries.len(), format.mime_type())
            }
            Err(e) => {
                warn!("export write failed: {}", e);
                ExportOutcome::failed(format!("导出{}失败: {}", format, e))
            }
        }
    }

    fn artifact_name(&self, hint: Option<&str>, format: ExportFormat) -> String {
        let ext = format.extension();
        match hint {
            Some(hint) if hint.ends_with(&format!(".{}", ext)) => hint.to_string(),
            Some(hint) => format!("{}.{}", hint, ext),
            None => format!(
                "app_list_{}.{}",
                Local::now().format("%Y-%m-%d_%H-%M-%S"),
                ext
            ),
        }
    }

    fn write_atomic(&self, file_name: &str, content: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.export_dir)?;
        let path = self.export_dir.join(file_name);
        let tmp = self.export_dir.join(format!("{}.tmp", file_name));

        if let Err(e) = std::fs::write(&tmp, content) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }
        Ok(path)
    }

    /// Hand an artifact to the OS default handler. Best-effort by contract:
    /// a failed hand-off is logged and swallowed, the artifact is on disk
    /// either way.
    pub fn share_artifact(&self, path: &Path, mime_type: &str) {
        debug!("sharing {} as {}", path.display(), mime_type);
        if let Err(e) = open::that_detached(path) {
            warn!("share hand-off failed for {}: {}", path.display(), e);
        }
    }
}

impl Default for Exporter {
    fn default() -> Self {
        Self::new()
    }
}
