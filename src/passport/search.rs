use serde::Serialize;

use super::tabular::IndexRecord;
use super::view::{Entry, PassportView, Section};

const CATALOG_COLUMNS: &[&str] = &["uid", "gtin", "serialNumber", "modelId", "category"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryVisibility {
    pub visible: bool,
    /// Per detail row of an event entry; empty for plain fields.
    pub details: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionVisibility {
    pub section: Section,
    pub visible: bool,
    pub entries: Vec<EntryVisibility>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Visibility {
    pub sections: Vec<SectionVisibility>,
    pub no_results: bool,
}

pub fn normalize_query(query: &str) -> String {
    query.trim().to_lowercase()
}

/// Substring match against a precomputed search string. `query` must already be
/// normalized; an empty query matches everything.
fn matches(search_text: &str, query: &str) -> bool {
    query.is_empty() || search_text.contains(query)
}

/// Decide which sections and entries of `view` are shown for `query`.
///
/// An event is shown when it matches or any of its detail rows does; in the latter case
/// the event header is kept only so the matching rows have somewhere to show. A section
/// is shown when any entry is.
pub fn filter(view: &PassportView, query: &str) -> Visibility {
    let q = normalize_query(query);

    let sections: Vec<SectionVisibility> = view
        .sections
        .iter()
        .map(|section| {
            let entries: Vec<EntryVisibility> = section
                .entries
                .iter()
                .map(|entry| {
                    let details: Vec<bool> = match entry {
                        Entry::Field(_) => Vec::new(),
                        Entry::Event(event) => event
                            .details
                            .iter()
                            .map(|row| matches(&row.search_text, &q))
                            .collect(),
                    };
                    let visible = matches(entry.search_text(), &q) || details.iter().any(|d| *d);
                    EntryVisibility { visible, details }
                })
                .collect();
            SectionVisibility {
                section: section.section,
                visible: entries.iter().any(|e| e.visible),
                entries,
            }
        })
        .collect();

    let no_results = !q.is_empty() && !sections.iter().any(|s| s.visible);
    Visibility { sections, no_results }
}

/// Home listing: records sorted by UID and narrowed by `query` over the identifying
/// columns.
pub fn filter_catalog<'a>(records: &'a [IndexRecord], query: &str) -> Vec<&'a IndexRecord> {
    let q = normalize_query(query);
    let mut hits: Vec<&IndexRecord> = records
        .iter()
        .filter(|r| {
            let haystack = CATALOG_COLUMNS
                .iter()
                .map(|c| r.text(c))
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            matches(&haystack, &q)
        })
        .collect();
    hits.sort_by(|a, b| a.text("uid").cmp(b.text("uid")));
    hits
}

pub fn result_summary(count: usize) -> String {
    let plural = if count == 1 { "" } else { "s" };
    format!("共 {count} 筆結果 / {count} result{plural}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passport::compose::compose;
    use crate::passport::tabular::parse;
    use crate::passport::view::build_view;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use url::Url;

    fn view() -> PassportView {
        let record = IndexRecord::from_iter([
            ("uid", "U-1"),
            ("modelId", "LFP-280"),
            ("serialNumber", "SN-0001"),
            ("category", "EV battery"),
        ]);
        let unit = json!({
            "technical": { "chemistry": "LFP", "cells": ["A1", "A2"] },
            "sustainability": { "carbonFootprint": "61 kgCO2e/kWh" },
            "events": [
                { "type": "Manufactured", "date": "2024-01-02" },
                { "type": "Inspection", "stateOfHealth": 97 },
            ],
        });
        let composed = compose(&record, Some(&unit), None);
        build_view(&record, &composed, &Url::parse("https://example.com/").unwrap())
    }

    fn visible_sections(vis: &Visibility) -> Vec<&'static str> {
        vis.sections
            .iter()
            .filter(|s| s.visible)
            .map(|s| s.section.key())
            .collect()
    }

    #[test]
    fn empty_query_shows_everything() {
        let vis = filter(&view(), "   ");
        assert_eq!(
            visible_sections(&vis),
            vec!["identification", "technical", "sustainability", "events"]
        );
        assert!(vis.sections.iter().all(|s| s.entries.iter().all(|e| e.visible)));
        assert!(!vis.no_results);
    }

    #[test]
    fn query_is_trimmed_and_case_folded() {
        let vis = filter(&view(), "  KGCO2E ");
        assert_eq!(visible_sections(&vis), vec!["sustainability"]);
    }

    #[test]
    fn sections_without_matches_are_hidden() {
        let vis = filter(&view(), "a2");
        assert_eq!(visible_sections(&vis), vec!["technical"]);
        let technical = &vis.sections[1];
        assert_eq!(
            technical.entries.iter().map(|e| e.visible).collect::<Vec<_>>(),
            vec![false, true]
        );
    }

    #[test]
    fn event_detail_match_keeps_event_visible() {
        // humanized label only exists on the detail row, not in the event JSON
        let vis = filter(&view(), "state of health");
        assert_eq!(visible_sections(&vis), vec!["events"]);
        let events = vis.sections.iter().find(|s| s.section == Section::Events).unwrap();
        assert!(!events.entries[0].visible);
        assert!(events.entries[1].visible);
        assert_eq!(events.entries[1].details, vec![true]);
    }

    #[test]
    fn no_results_only_for_non_empty_query() {
        let vis = filter(&view(), "abc");
        assert!(visible_sections(&vis).is_empty());
        assert!(vis.no_results);

        let empty = PassportView {
            title: String::new(),
            subtitle: String::new(),
            qr_text: String::new(),
            sections: Vec::new(),
        };
        assert!(!filter(&empty, "").no_results);
        assert!(filter(&empty, "x").no_results);
    }

    #[test]
    fn catalog_sorted_and_filtered() {
        let records = parse(
            "uid,gtin,serialNumber,modelId,category\n\
             U-3,0471,SN-3,NMC-100,ESS\n\
             U-1,0471,SN-1,LFP-280,EV battery\n\
             U-2,0472,SN-2,LFP-280,EV battery\n",
        );
        let all: Vec<_> = filter_catalog(&records, "").iter().map(|r| r.text("uid")).collect();
        assert_eq!(all, vec!["U-1", "U-2", "U-3"]);

        let lfp: Vec<_> = filter_catalog(&records, " lfp ").iter().map(|r| r.text("uid")).collect();
        assert_eq!(lfp, vec!["U-1", "U-2"]);

        assert!(filter_catalog(&records, "passportJsonUrl").is_empty());
    }

    #[test]
    fn summary_pluralizes() {
        assert_eq!(result_summary(1), "共 1 筆結果 / 1 result");
        assert_eq!(result_summary(3), "共 3 筆結果 / 3 results");
    }
}
