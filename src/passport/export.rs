use std::sync::LazyLock;

use chrono::{DateTime, SecondsFormat, Utc};
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use super::compose::ComposedPassport;
use super::tabular::IndexRecord;

static UNSAFE_FILENAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Everything that went into a composed passport, for download.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot<'a> {
    pub uid: &'a str,
    pub generated_at: String,
    pub product_index_row: &'a IndexRecord,
    pub battery_passport: Option<&'a Value>,
    pub model_passport: Option<&'a Value>,
    pub composed_public_view: &'a ComposedPassport,
}

impl<'a> Snapshot<'a> {
    pub fn new(
        record: &'a IndexRecord,
        unit: Option<&'a Value>,
        model: Option<&'a Value>,
        composed: &'a ComposedPassport,
        now: DateTime<Utc>,
    ) -> Self {
        Snapshot {
            uid: record.text("uid"),
            generated_at: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            product_index_row: record,
            battery_passport: unit,
            model_passport: model,
            composed_public_view: composed,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn file_name(&self) -> String {
        let stem = self
            .product_index_row
            .present("serialNumber")
            .unwrap_or("battery-passport");
        format!("{}.json", sanitize_filename(stem))
    }
}

/// Replace each run of characters outside `[A-Za-z0-9._-]` with `_`.
pub fn sanitize_filename(input: &str) -> String {
    let input = if input.is_empty() { "file" } else { input };
    UNSAFE_FILENAME_RE.replace_all(input, "_").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passport::compose::compose;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn sanitize_collapses_runs() {
        assert_eq!(sanitize_filename("SN 0001/β#2"), "SN_0001_2");
        assert_eq!(sanitize_filename("ok-name_1.0"), "ok-name_1.0");
        assert_eq!(sanitize_filename(""), "file");
    }

    #[test]
    fn snapshot_bundles_sources_and_composition() {
        let record = IndexRecord::from_iter([("uid", "U-1"), ("serialNumber", "SN/1")]);
        let unit = json!({ "technical": { "chemistry": "LFP" } });
        let composed = compose(&record, Some(&unit), None);
        let now = Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap();

        let snap = Snapshot::new(&record, Some(&unit), None, &composed, now);
        assert_eq!(snap.file_name(), "SN_1.json");

        let value: Value = serde_json::from_str(&snap.to_json().unwrap()).unwrap();
        assert_eq!(value["uid"], json!("U-1"));
        assert_eq!(value["generatedAt"], json!("2026-03-04T05:06:07.000Z"));
        assert_eq!(value["productIndexRow"], json!({ "uid": "U-1", "serialNumber": "SN/1" }));
        assert_eq!(value["batteryPassport"], unit);
        assert_eq!(value["modelPassport"], Value::Null);
        assert_eq!(value["composedPublicView"]["technical"], json!({ "chemistry": "LFP" }));
        assert_eq!(value["composedPublicView"]["events"], json!([]));
    }

    #[test]
    fn default_file_name_without_serial() {
        let record = IndexRecord::from_iter([("uid", "U-1")]);
        let composed = compose(&record, None, None);
        let snap = Snapshot::new(&record, None, None, &composed, Utc::now());
        assert_eq!(snap.file_name(), "battery-passport.json");
    }
}
