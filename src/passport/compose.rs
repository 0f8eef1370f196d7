use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::tabular::IndexRecord;

/// Where an identification field may be sourced from, in priority order.
enum Precedence {
    /// Index column, then model document, then unit document.
    IndexFirst,
    /// Unit document, then model document. Never from the index.
    UnitFirst,
}

struct IdentificationField {
    key: &'static str,
    source_key: &'static str,
    precedence: Precedence,
}

const fn index_first(key: &'static str) -> IdentificationField {
    IdentificationField { key, source_key: key, precedence: Precedence::IndexFirst }
}

const fn unit_first(key: &'static str, source_key: &'static str) -> IdentificationField {
    IdentificationField { key, source_key, precedence: Precedence::UnitFirst }
}

const IDENTIFICATION_FIELDS: &[IdentificationField] = &[
    index_first("uid"),
    index_first("gtin"),
    index_first("serialNumber"),
    index_first("modelId"),
    index_first("modelName"),
    index_first("category"),
    unit_first("manufacturer", "manufacturer"),
    unit_first("manufacturingDate", "manufacturingDate"),
    unit_first("manufacturingPlant", "manufacturingPlant"),
    unit_first("batteryStatus", "status"),
    index_first("publicLandingUrl"),
    index_first("qrPayload"),
];

/// The merged, presentation-ready passport.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ComposedPassport {
    pub identification: Map<String, Value>,
    pub technical: Map<String, Value>,
    pub sustainability: Map<String, Value>,
    pub circularity: Map<String, Value>,
    pub events: Vec<Value>,
}

/// Follow `path` through nested objects. Any missing step yields `None`.
pub fn lookup<'a>(doc: Option<&'a Value>, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(doc?, |acc, key| acc.get(key))
}

/// Null and the empty string count as absent.
pub fn is_present(value: &Value) -> bool {
    !matches!(value, Value::Null) && value.as_str() != Some("")
}

fn present<'a>(value: Option<&'a Value>) -> Option<&'a Value> {
    value.filter(|v| is_present(v))
}

/// Overlay the model and unit documents onto an index record.
pub fn compose(record: &IndexRecord, unit: Option<&Value>, model: Option<&Value>) -> ComposedPassport {
    ComposedPassport {
        identification: compose_identification(record, unit, model),
        technical: merge_section("technical", unit, model),
        sustainability: merge_section("sustainability", unit, model),
        circularity: merge_section("circularity", unit, model),
        events: collect_events(unit),
    }
}

fn compose_identification(
    record: &IndexRecord,
    unit: Option<&Value>,
    model: Option<&Value>,
) -> Map<String, Value> {
    let mut out = Map::new();

    for field in IDENTIFICATION_FIELDS {
        let path = ["identification", field.source_key];
        let from_unit = || present(lookup(unit, &path)).cloned();
        let from_model = || present(lookup(model, &path)).cloned();

        let value = match field.precedence {
            Precedence::IndexFirst => record
                .present(field.source_key)
                .map(|v| Value::String(v.to_string()))
                .or_else(from_model)
                .or_else(from_unit)
                .or_else(|| match field.key {
                    "modelId" => present(lookup(unit, &["modelId"])).cloned(),
                    _ => None,
                }),
            Precedence::UnitFirst => from_unit().or_else(from_model),
        };

        if let Some(value) = value {
            out.insert(field.key.to_string(), value);
        }
    }

    out
}

fn section_object<'a>(doc: Option<&'a Value>, name: &str, origin: &str) -> Option<&'a Map<String, Value>> {
    match lookup(doc, &[name]) {
        Some(Value::Object(map)) => Some(map),
        Some(Value::Null) | None => None,
        Some(other) => {
            warn!(section = name, origin, kind = json_kind(other), "ignoring non-object section");
            None
        }
    }
}

/// Key union with unit values on top of model values. A key the unit carries takes the
/// unit value even when it is empty; keys left empty are dropped.
fn merge_section(name: &str, unit: Option<&Value>, model: Option<&Value>) -> Map<String, Value> {
    let model = section_object(model, name, "model");
    let unit = section_object(unit, name, "unit");

    let mut out = Map::new();
    let keys = model
        .into_iter()
        .flat_map(|m| m.keys())
        .chain(unit.into_iter().flat_map(|u| u.keys()));

    for key in keys {
        if out.contains_key(key) {
            continue;
        }
        let value = match unit.and_then(|u| u.get(key)) {
            Some(value) => Some(value),
            None => model.and_then(|m| m.get(key)),
        };
        if let Some(value) = present(value) {
            out.insert(key.clone(), value.clone());
        }
    }

    out
}

fn collect_events(unit: Option<&Value>) -> Vec<Value> {
    match lookup(unit, &["events"]) {
        Some(Value::Array(items)) => items.clone(),
        Some(obj @ Value::Object(_)) => vec![obj.clone()],
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(kind = json_kind(other), "ignoring events that are not a list");
            Vec::new()
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn record() -> IndexRecord {
        IndexRecord::from_iter([
            ("uid", "01/04710000000010/21/SN-0001"),
            ("gtin", "04710000000010"),
            ("modelId", "LFP-280"),
            ("serialNumber", "SN-0001"),
            ("category", ""),
            ("passportJsonUrl", "../data/passports/SN-0001.json"),
            ("qrPayload", ""),
            ("publicLandingUrl", ""),
        ])
    }

    fn keys(map: &Map<String, Value>) -> Vec<&str> {
        map.keys().map(String::as_str).collect()
    }

    #[test]
    fn index_only_composition() {
        let composed = compose(&record(), None, None);
        assert_eq!(
            Value::Object(composed.identification.clone()),
            json!({
                "uid": "01/04710000000010/21/SN-0001",
                "gtin": "04710000000010",
                "serialNumber": "SN-0001",
                "modelId": "LFP-280",
            })
        );
        assert!(composed.technical.is_empty());
        assert!(composed.sustainability.is_empty());
        assert!(composed.circularity.is_empty());
        assert!(composed.events.is_empty());
    }

    #[test]
    fn index_fields_fall_back_to_model_then_unit() {
        let unit = json!({ "identification": { "category": "unit-cat", "modelName": "Unit Name" } });
        let model = json!({ "identification": { "category": "EV battery", "modelName": "" } });
        let composed = compose(&record(), Some(&unit), Some(&model));
        assert_eq!(composed.identification["category"], json!("EV battery"));
        assert_eq!(composed.identification["modelName"], json!("Unit Name"));
    }

    #[test]
    fn index_value_beats_documents() {
        let unit = json!({ "identification": { "gtin": "999" } });
        let model = json!({ "identification": { "gtin": "888" } });
        let composed = compose(&record(), Some(&unit), Some(&model));
        assert_eq!(composed.identification["gtin"], json!("04710000000010"));
    }

    #[test]
    fn manufacturing_fields_prefer_unit_document() {
        let unit = json!({
            "identification": {
                "manufacturer": "Unit Works",
                "manufacturingDate": "2024-03-01",
                "status": "in-use",
            }
        });
        let model = json!({
            "identification": {
                "manufacturer": "Model Corp",
                "manufacturingPlant": "Plant 7",
                "status": "original",
            }
        });
        let composed = compose(&record(), Some(&unit), Some(&model));
        let id = &composed.identification;
        assert_eq!(id["manufacturer"], json!("Unit Works"));
        assert_eq!(id["manufacturingDate"], json!("2024-03-01"));
        assert_eq!(id["manufacturingPlant"], json!("Plant 7"));
        assert_eq!(id["batteryStatus"], json!("in-use"));
        assert!(!id.contains_key("status"));
    }

    #[test]
    fn unit_top_level_model_id_is_last_resort() {
        let mut rec = record();
        rec.insert("modelId", "");
        let unit = json!({ "modelId": "FROM-UNIT" });
        let composed = compose(&rec, Some(&unit), None);
        assert_eq!(composed.identification["modelId"], json!("FROM-UNIT"));
    }

    #[test]
    fn identification_order_is_fixed() {
        let unit = json!({ "identification": { "status": "active", "manufacturer": "M" } });
        let composed = compose(&record(), Some(&unit), None);
        assert_eq!(
            keys(&composed.identification),
            vec!["uid", "gtin", "serialNumber", "modelId", "manufacturer", "batteryStatus"]
        );
    }

    #[test]
    fn unit_overrides_model_in_mergeable_sections() {
        let model = json!({
            "technical": { "chemistry": "LFP", "nominalVoltage": 3.2, "capacityAh": 280 },
            "circularity": { "recycledContent": { "lithium": 4 } },
        });
        let unit = json!({
            "technical": { "capacityAh": 276.4, "cycleCount": 12 },
            "circularity": { "recycledContent": { "cobalt": 12 } },
        });
        let composed = compose(&record(), Some(&unit), Some(&model));
        assert_eq!(
            Value::Object(composed.technical.clone()),
            json!({ "chemistry": "LFP", "nominalVoltage": 3.2, "capacityAh": 276.4, "cycleCount": 12 })
        );
        assert_eq!(keys(&composed.technical), vec!["chemistry", "nominalVoltage", "capacityAh", "cycleCount"]);
        // one level only: nested objects are replaced, not merged
        assert_eq!(composed.circularity["recycledContent"], json!({ "cobalt": 12 }));
    }

    #[test]
    fn empty_leaves_are_dropped() {
        let model = json!({ "sustainability": { "carbonFootprint": "61 kgCO2e/kWh", "note": "", "grid": "TW" } });
        let unit = json!({ "sustainability": { "carbonFootprint": "", "scope": null, "origin": "TW" } });
        let composed = compose(&record(), Some(&unit), Some(&model));
        assert_eq!(
            Value::Object(composed.sustainability.clone()),
            json!({ "grid": "TW", "origin": "TW" })
        );
    }

    #[test]
    fn empty_unit_value_clears_shared_key() {
        let model = json!({ "technical": { "k": "model-val", "chemistry": "LFP" } });
        let unit = json!({ "technical": { "k": "", "chemistry": null } });
        let composed = compose(&record(), Some(&unit), Some(&model));
        assert!(!composed.technical.contains_key("k"));
        assert!(!composed.technical.contains_key("chemistry"));

        let absent = json!({ "technical": {} });
        let composed = compose(&record(), Some(&absent), Some(&model));
        assert_eq!(composed.technical["k"], json!("model-val"));
    }

    #[test]
    fn non_object_sections_are_ignored() {
        let unit = json!({ "technical": "see datasheet", "sustainability": [1, 2] });
        let composed = compose(&record(), Some(&unit), None);
        assert!(composed.technical.is_empty());
        assert!(composed.sustainability.is_empty());
    }

    #[test]
    fn events_come_only_from_unit() {
        let model = json!({ "events": [{ "type": "model-event" }] });
        let unit = json!({ "events": [{ "type": "Manufactured" }, { "type": "Installed" }] });
        let composed = compose(&record(), Some(&unit), Some(&model));
        assert_eq!(composed.events.len(), 2);
        assert_eq!(composed.events[0]["type"], json!("Manufactured"));

        let without_unit = compose(&record(), None, Some(&model));
        assert!(without_unit.events.is_empty());
    }

    #[test]
    fn single_event_object_becomes_sequence() {
        let unit = json!({ "events": { "type": "Inspected" } });
        let composed = compose(&record(), Some(&unit), None);
        assert_eq!(composed.events, vec![json!({ "type": "Inspected" })]);
    }

    #[test]
    fn lookup_fails_soft() {
        let doc = json!({ "a": { "b": null, "c": [1] } });
        assert_eq!(lookup(Some(&doc), &["a", "c"]), Some(&json!([1])));
        assert_eq!(lookup(Some(&doc), &["a", "x", "y"]), None);
        assert_eq!(lookup(Some(&doc), &["a", "c", "d"]), None);
        assert_eq!(lookup(None, &["a"]), None);
    }
}
