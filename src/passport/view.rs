use std::fmt::Write;

use serde::Serialize;
use serde_json::{Map, Value};
use url::Url;

use super::compose::{is_present, ComposedPassport};
use super::flatten::{compact_json, flatten, flatten_excluding, stringify_value, RenderHint, Row};
use super::router::{absolute_passport_url, passport_link};
use super::search::{self, Visibility};
use super::tabular::IndexRecord;

const EVENT_KNOWN_KEYS: &[&str] = &["type", "date", "actor", "location", "description"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Section {
    Identification,
    Technical,
    Sustainability,
    Circularity,
    Events,
}

impl Section {
    pub const ALL: [Section; 5] = [
        Section::Identification,
        Section::Technical,
        Section::Sustainability,
        Section::Circularity,
        Section::Events,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Section::Identification => "identification",
            Section::Technical => "technical",
            Section::Sustainability => "sustainability",
            Section::Circularity => "circularity",
            Section::Events => "events",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Section::Identification => "識別資訊 / Identification",
            Section::Technical => "技術資料 / Technical",
            Section::Sustainability => "永續性 / Sustainability",
            Section::Circularity => "循環性 / Circularity",
            Section::Events => "事件紀錄 / Events",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tab {
    #[default]
    Public,
    Restricted,
}

/// What the reader is currently looking at.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub query: String,
    pub tab: Tab,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventEntry {
    pub title: String,
    pub meta: Option<String>,
    pub description: Option<String>,
    pub details: Vec<Row>,
    pub search_text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "entry", rename_all = "snake_case")]
pub enum Entry {
    Field(Row),
    Event(EventEntry),
}

impl Entry {
    pub fn search_text(&self) -> &str {
        match self {
            Entry::Field(row) => &row.search_text,
            Entry::Event(event) => &event.search_text,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SectionView {
    pub section: Section,
    pub key: &'static str,
    pub label: &'static str,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PassportView {
    pub title: String,
    pub subtitle: String,
    pub qr_text: String,
    pub sections: Vec<SectionView>,
}

/// QR payload for a unit: explicit payload, then landing page, then the passport URL.
pub fn qr_text(record: &IndexRecord, base: &Url) -> String {
    let uid = record.text("uid");
    record
        .present("qrPayload")
        .or_else(|| record.present("publicLandingUrl"))
        .map(str::to_string)
        .unwrap_or_else(|| {
            absolute_passport_url(base, uid)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| passport_link(uid))
        })
}

fn id_text(composed: &ComposedPassport, key: &str) -> Option<String> {
    composed
        .identification
        .get(key)
        .filter(|v| is_present(v))
        .map(stringify_value)
}

pub fn build_view(record: &IndexRecord, composed: &ComposedPassport, base: &Url) -> PassportView {
    let title = format!(
        "{} / {}",
        id_text(composed, "modelName").unwrap_or_else(|| record.text("modelId").to_string()),
        id_text(composed, "serialNumber").unwrap_or_else(|| record.text("serialNumber").to_string()),
    );
    let subtitle = format!(
        "UID {} · {}",
        id_text(composed, "uid").unwrap_or_default(),
        id_text(composed, "category").unwrap_or_else(|| record.text("category").to_string()),
    );

    let sections = Section::ALL
        .into_iter()
        .map(|section| SectionView {
            section,
            key: section.key(),
            label: section.label(),
            entries: section_entries(section, composed),
        })
        .filter(|s| !s.entries.is_empty())
        .collect();

    PassportView {
        title,
        subtitle,
        qr_text: qr_text(record, base),
        sections,
    }
}

fn section_entries(section: Section, composed: &ComposedPassport) -> Vec<Entry> {
    let fields = |map: &Map<String, Value>| -> Vec<Entry> {
        flatten(map).into_iter().map(Entry::Field).collect()
    };
    match section {
        Section::Identification => fields(&composed.identification),
        Section::Technical => fields(&composed.technical),
        Section::Sustainability => fields(&composed.sustainability),
        Section::Circularity => fields(&composed.circularity),
        Section::Events => composed
            .events
            .iter()
            .enumerate()
            .map(|(i, event)| Entry::Event(event_entry(i, event)))
            .collect(),
    }
}

/// Text of a value that is neither null, empty, `false` nor zero.
fn truthy_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        v => Some(stringify_value(v)).filter(|s| !s.is_empty()),
    }
}

fn event_entry(index: usize, event: &Value) -> EventEntry {
    let title = truthy_text(event.get("type")).unwrap_or_else(|| format!("事件 / Event {}", index + 1));

    let meta: Vec<String> = [
        ("日期 Date", "date"),
        ("執行者 Actor", "actor"),
        ("地點 Location", "location"),
    ]
    .iter()
    .filter_map(|(label, key)| truthy_text(event.get(*key)).map(|v| format!("{label}: {v}")))
    .collect();

    let details = match event {
        Value::Object(map) => flatten_excluding(map, EVENT_KNOWN_KEYS),
        _ => Vec::new(),
    };

    let json = compact_json(event);
    let search_text = format!("{title} {json}").to_lowercase();

    EventEntry {
        title,
        meta: (!meta.is_empty()).then(|| meta.join(" · ")),
        description: truthy_text(event.get("description")),
        details,
        search_text,
    }
}

/// Plain-text rendering of the passport for the terminal.
pub fn render(view: &PassportView, state: &ViewState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", view.title);
    let _ = writeln!(out, "{}", view.subtitle);
    let _ = writeln!(out, "QR: {}", view.qr_text);

    if state.tab == Tab::Restricted {
        let _ = writeln!(
            out,
            "\n受限資料需經授權方可檢視。 / Restricted data requires authorized access."
        );
        return out;
    }

    let visibility = search::filter(view, &state.query);
    render_sections(&mut out, view, &visibility);
    if visibility.no_results {
        let _ = writeln!(out, "\n找不到符合的欄位。 / No matching fields.");
    }
    out
}

fn render_sections(out: &mut String, view: &PassportView, visibility: &Visibility) {
    for (section, vis) in view.sections.iter().zip(&visibility.sections) {
        if !vis.visible {
            continue;
        }
        let _ = writeln!(out, "\n== {} ==", section.label);
        for (entry, entry_vis) in section.entries.iter().zip(&vis.entries) {
            if !entry_vis.visible {
                continue;
            }
            match entry {
                Entry::Field(row) => render_row(out, row, "  "),
                Entry::Event(event) => {
                    let _ = writeln!(out, "  # {}", event.title);
                    if let Some(meta) = &event.meta {
                        let _ = writeln!(out, "    {meta}");
                    }
                    if let Some(desc) = &event.description {
                        let _ = writeln!(out, "    {desc}");
                    }
                    for (row, shown) in event.details.iter().zip(&entry_vis.details) {
                        if *shown {
                            render_row(out, row, "    ");
                        }
                    }
                }
            }
        }
    }
}

fn render_row(out: &mut String, row: &Row, indent: &str) {
    match row.hint {
        RenderHint::Chips => {
            let chips: Vec<String> = row.chips().iter().map(|c| format!("[{c}]")).collect();
            let _ = writeln!(out, "{indent}{}: {}", row.label, chips.join(" "));
        }
        RenderHint::Json => {
            let _ = writeln!(out, "{indent}{}:", row.label);
            for line in row.pretty().lines() {
                let _ = writeln!(out, "{indent}  {line}");
            }
        }
        RenderHint::Link => {
            let _ = writeln!(out, "{indent}{}: <{}>", row.label, row.text());
        }
        RenderHint::Mono | RenderHint::Text => {
            let _ = writeln!(out, "{indent}{}: {}", row.label, row.text());
        }
    }
}
