//! Facility detail-page extraction.
//!
//! The same logical field ships under different markup across years, so
//! field lookup runs three tiers in order: exact label-adjacent cell,
//! same-cell "Label: value" suffix, then row-text-contains-label. Absent
//! fields yield defaults, never errors.

use regex::Regex;
use scraper::{Html, Selector};

use crate::models::{FacilityDetail, FacilityStatus, DEFAULT_CAPACITY};

use super::{collapse_whitespace, element_lines, element_text};

/// Parse a detail page into a facility record. Fields the page does not
/// yield stay at their defaults (status Active, capacity 6, empty strings).
pub fn parse_facility_detail(license_number: &str, html: &str) -> FacilityDetail {
    let mut detail = FacilityDetail::new(license_number);
    let doc = Html::parse_document(html);

    if let Some(name) = labeled_field(&doc, &["facility name", "name of facility", "name"]) {
        detail.name = name;
    }
    if let Some(status) = labeled_field(&doc, &["facility status", "license status", "status"]) {
        detail.status = FacilityStatus::parse_portal_text(&status);
    }
    if let Some(capacity) = labeled_field(&doc, &["licensed beds", "licensed capacity", "capacity"])
    {
        detail.capacity = parse_capacity(&capacity);
    }
    if let Some(phone) = labeled_field(&doc, &["telephone", "phone"]) {
        detail.phone = phone;
    }
    if let Some(county) = labeled_field(&doc, &["county"]) {
        detail.county = county;
    }
    if let Some(address) = labeled_field_lines(&doc, &["facility address", "location address", "address"])
    {
        let parts = split_composite_address(&address);
        detail.street = parts.street;
        detail.city = parts.city;
        detail.state = parts.state;
        detail.zip = parts.zip;
    }

    detail.refresh_fingerprint();
    detail
}

/// Look a field up by label, trying each tier in order.
pub(crate) fn labeled_field(doc: &Html, labels: &[&str]) -> Option<String> {
    for label in labels {
        if let Some(value) = label_adjacent_cell(doc, label)
            .or_else(|| same_cell_suffix(doc, label))
            .or_else(|| row_contains_label(doc, label))
        {
            return Some(value);
        }
    }
    None
}

/// Like `labeled_field` but preserves line structure in the value cell,
/// for multi-line address blocks. Only the adjacent-cell tier applies;
/// the looser tiers flatten lines anyway.
fn labeled_field_lines(doc: &Html, labels: &[&str]) -> Option<String> {
    for label in labels {
        if let Some(value) = label_adjacent_cell_lines(doc, label) {
            return Some(value);
        }
    }
    labeled_field(doc, labels)
}

/// Tier 1: a cell whose text is exactly the label, followed by a sibling
/// value cell. Covers `th`/`td` tables and `dt`/`dd` definition lists.
pub(crate) fn label_adjacent_cell(doc: &Html, label: &str) -> Option<String> {
    adjacent_cell_value(doc, label).map(|lines| collapse_whitespace(&lines.join(" ")))
}

fn label_adjacent_cell_lines(doc: &Html, label: &str) -> Option<String> {
    adjacent_cell_value(doc, label).map(|lines| lines.join("\n"))
}

fn adjacent_cell_value(doc: &Html, label: &str) -> Option<Vec<String>> {
    let row_sel = Selector::parse("tr").ok()?;
    let cell_sel = Selector::parse("th, td").ok()?;
    for row in doc.select(&row_sel) {
        let cells: Vec<_> = row.select(&cell_sel).collect();
        for pair in cells.windows(2) {
            if normalize_label(&element_text(pair[0])) == label {
                let lines = element_lines(pair[1]);
                if !lines.is_empty() {
                    return Some(lines);
                }
            }
        }
    }

    let dl_sel = Selector::parse("dl").ok()?;
    let dt_sel = Selector::parse("dt").ok()?;
    let dd_sel = Selector::parse("dd").ok()?;
    for dl in doc.select(&dl_sel) {
        let dts: Vec<_> = dl.select(&dt_sel).collect();
        let dds: Vec<_> = dl.select(&dd_sel).collect();
        for (dt, dd) in dts.iter().zip(dds.iter()) {
            if normalize_label(&element_text(*dt)) == label {
                let lines = element_lines(*dd);
                if !lines.is_empty() {
                    return Some(lines);
                }
            }
        }
    }
    None
}

/// Tier 2: a single cell of the form "Label: value".
pub(crate) fn same_cell_suffix(doc: &Html, label: &str) -> Option<String> {
    let cell_sel = Selector::parse("th, td, li, p, span, b, strong").ok()?;
    for cell in doc.select(&cell_sel) {
        let text = element_text(cell);
        let Some((prefix, value)) = text.split_once(':') else {
            continue;
        };
        if normalize_label(prefix) == label {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Tier 3: any row whose text contains the label; the value is what
/// follows it on the same line.
pub(crate) fn row_contains_label(doc: &Html, label: &str) -> Option<String> {
    let row_sel = Selector::parse("tr").ok()?;
    for row in doc.select(&row_sel) {
        for line in element_lines(row) {
            let lowered = line.to_lowercase();
            let Some(pos) = lowered.find(label) else {
                continue;
            };
            // Offsets come from the lowercased copy; non-ASCII case folding
            // can shift byte positions.
            let Some(rest) = line.get(pos + label.len()..) else {
                continue;
            };
            let value = rest.trim_start_matches([':', ' ']).trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

fn normalize_label(s: &str) -> String {
    collapse_whitespace(s).trim_end_matches(':').to_lowercase()
}

/// Capacity defaults to the domain default rather than zero when the
/// portal value is missing or unparseable.
fn parse_capacity(s: &str) -> u32 {
    Regex::new(r"\d+")
        .ok()
        .and_then(|re| re.find(s).and_then(|m| m.as_str().parse().ok()))
        .unwrap_or(DEFAULT_CAPACITY)
}

/// Components of a composite address string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressParts {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Split a composite address by finding the line matching
/// `"<state-code> <5-digit-zip>"`; the prior non-label line is the street.
pub fn split_composite_address(raw: &str) -> AddressParts {
    let Ok(re) = Regex::new(r"^(?P<city>.*?)[,\s]\s*(?P<state>[A-Z]{2})\s+(?P<zip>\d{5})(?:-\d{4})?$")
    else {
        return AddressParts::default();
    };

    let lines: Vec<String> = raw
        .lines()
        .map(collapse_whitespace)
        .filter(|l| !l.is_empty())
        .collect();

    for (idx, line) in lines.iter().enumerate() {
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let mut parts = AddressParts {
            city: caps["city"].trim_end_matches(',').trim().to_string(),
            state: caps["state"].to_string(),
            zip: caps["zip"].to_string(),
            street: lines[..idx]
                .iter()
                .rev()
                .find(|l| !l.ends_with(':'))
                .cloned()
                .unwrap_or_default(),
        };
        // Single-line form: "1418 S Maple St, Spokane, WA 99203".
        if parts.street.is_empty() {
            if let Some((street, city)) = parts.city.rsplit_once(',') {
                parts.street = street.trim().to_string();
                parts.city = city.trim().to_string();
            }
        }
        return parts;
    }
    AddressParts::default()
}
