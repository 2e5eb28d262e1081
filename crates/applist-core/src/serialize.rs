use crate::{models::AppEntry, Result};
use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};

/// Date sentinel for timestamps the registry couldn't provide.
pub const UNKNOWN_DATE: &str = "未知";

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    Txt,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Json => "application/json",
            ExportFormat::Csv => "text/csv",
            ExportFormat::Txt => "text/plain",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Top-level shape of the JSON export. Key names are the wire contract.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportDocument {
    export_time: String,
    total_apps: usize,
    apps: Vec<ExportedApp>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExportedApp {
    app_name: String,
    package_name: String,
    version_name: String,
    version_code: i64,
    is_system_app: bool,
    install_time: i64,
    update_time: i64,
}

impl From<&AppEntry> for ExportedApp {
    fn from(entry: &AppEntry) -> Self {
        Self {
            app_name: entry.name.clone(),
            package_name: entry.identifier.clone(),
            version_name: entry.version_label.clone(),
            version_code: entry.version_code,
            is_system_app: entry.is_system,
            install_time: entry.install_time,
            update_time: entry.update_time,
        }
    }
}

/// Render a snapshot into one of the export formats.
///
/// A strict 1:1 projection of the input: nothing is truncated, reordered or
/// deduplicated, and an empty snapshot still yields a well-formed document.
pub fn render(entries: &[AppEntry], format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Json => to_json(entries),
        ExportFormat::Csv => Ok(to_csv(entries)),
        ExportFormat::Txt => Ok(to_txt(entries)),
    }
}

fn to_json(entries: &[AppEntry]) -> Result<String> {
    let document = ExportDocument {
        export_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        total_apps: entries.len(),
        apps: entries.iter().map(ExportedApp::from).collect(),
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

fn to_csv(entries: &[AppEntry]) -> String {
    let mut output = String::new();
    output.push_str("应用名称,包名,版本号,版本代码,系统应用,安装时间,更新时间\n");

    let rows: Vec<String> = entries
        .iter()
        .map(|e| {
            format!(
                "{},{},{},{},{},{},{}",
                escape_csv(&e.name),
                escape_csv(&e.identifier),
                escape_csv(&e.version_label),
                e.version_code,
                e.is_system,
                format_millis(e.install_time),
                format_millis(e.update_time),
            )
        })
        .collect();

    output.push_str(&rows.join("\n"));
    output
}

fn to_txt(entries: &[AppEntry]) -> String {
    let header = format!(
        "应用列表导出\n导出时间: {}\n应用总数: {}\n{}\n\n",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        entries.len(),
        "=".repeat(80),
    );

    let blocks: Vec<String> = entries
        .iter()
        .enumerate()
        .map(|(index, e)| {
            format!(
                "{}. {}\n   包名: {}\n   版本: {} ({})\n   类型: {}\n   安装时间: {}\n   更新时间: {}\n   {}",
                index + 1,
                e.name,
                e.identifier,
                e.version_label,
                e.version_code,
                if e.is_system { "系统应用" } else { "用户应用" },
                format_millis(e.install_time),
                format_millis(e.update_time),
                "-".repeat(40),
            )
        })
        .collect();

    header + &blocks.join("\n\n")
}

/// Local-time `YYYY-MM-DD HH:MM`, or the unknown sentinel for 0.
fn format_millis(millis: i64) -> String {
    if millis <= 0 {
        return UNKNOWN_DATE.to_string();
    }
    match Local.timestamp_millis_opt(millis).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M").to_string(),
        None => UNKNOWN_DATE.to_string(),
    }
}

/// Standard CSV quoting: wrap when a field carries a comma, quote or
/// newline, doubling internal quotes.
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> AppEntry {
        AppEntry {
            name: name.to_string(),
            identifier: "org.example.app".to_string(),
            version_label: "2.1.0".to_string(),
            version_code: 210,
            install_time: 1_700_000_000_000,
            update_time: 0,
            is_system: false,
            has_icon: true,
        }
    }

    #[test]
    fn csv_escaping() {
        assert_eq!(escape_csv("simple"), "simple");
        assert_eq!(escape_csv("with,comma"), "\"with,comma\"");
        assert_eq!(escape_csv("with\"quote"), "\"with\"\"quote\"");
        assert_eq!(escape_csv("Foo, \"Bar\""), "\"Foo, \"\"Bar\"\"\"");
    }

    #[test]
    fn csv_has_seven_columns_and_quoted_name() {
        let csv = to_csv(&[entry("Foo, \"Bar\"")]);
        let mut lines = csv.lines();
        let header = lines.next().unwrap();
        assert_eq!(header, "应用名称,包名,版本号,版本代码,系统应用,安装时间,更新时间");
        assert_eq!(header.split(',').count(), 7);

        let row = lines.next().unwrap();
        assert!(row.starts_with("\"Foo, \"\"Bar\"\"\","));
        assert!(row.contains("org.example.app"));
        assert!(row.ends_with(UNKNOWN_DATE));
        assert!(lines.next().is_none());
    }

    #[test]
    fn json_carries_exact_wire_keys_and_raw_timestamps() {
        let json = render(&[entry("App")], ExportFormat::Json).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["totalApps"], 1);
        let app = &doc["apps"][0];
        for key in [
            "appName",
            "packageName",
            "versionName",
            "versionCode",
            "isSystemApp",
            "installTime",
            "updateTime",
        ] {
            assert!(app.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(app["installTime"], 1_700_000_000_000_i64);
        // 0 stays the literal integer 0 in JSON, no sentinel.
        assert_eq!(app["updateTime"], 0);
    }

    #[test]
    fn json_escapes_hostile_strings() {
        let mut e = entry("quote\" slash\\ newline\n tab\t");
        e.version_label = "v\"1\"".to_string();
        let json = render(&[e], ExportFormat::Json).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["apps"][0]["appName"], "quote\" slash\\ newline\n tab\t");
        assert_eq!(doc["apps"][0]["versionName"], "v\"1\"");
    }

    #[test]
    fn empty_input_yields_well_formed_documents() {
        let json = render(&[], ExportFormat::Json).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(doc["totalApps"], 0);
        assert_eq!(doc["apps"].as_array().unwrap().len(), 0);

        let csv = render(&[], ExportFormat::Csv).unwrap();
        assert_eq!(csv.lines().count(), 1);
        assert!(csv.starts_with("应用名称,"));

        let txt = render(&[], ExportFormat::Txt).unwrap();
        assert!(txt.contains("应用列表导出"));
        assert!(txt.contains("应用总数: 0"));
        assert!(txt.contains(&"=".repeat(80)));
    }

    #[test]
    fn txt_blocks_are_numbered_with_sentinel_dates() {
        let txt = to_txt(&[entry("First"), entry("Second")]);
        assert!(txt.contains("1. First"));
        assert!(txt.contains("2. Second"));
        assert!(txt.contains("版本: 2.1.0 (210)"));
        assert!(txt.contains("类型: 用户应用"));
        assert!(txt.contains(&format!("更新时间: {}", UNKNOWN_DATE)));
        assert!(txt.contains(&"-".repeat(40)));
    }

    #[test]
    fn output_preserves_input_order() {
        let entries = vec![entry("zzz"), entry("aaa")];
        let csv = to_csv(&entries);
        let z = csv.find("zzz").unwrap();
        let a = csv.find("aaa").unwrap();
        assert!(z < a);
    }
}
