//! Related-documents page extraction.
//!
//! The documents page lists inspection PDFs per facility. It also renders
//! the facility name more reliably than the detail page, whose name field
//! sometimes contains the portal's own error text, so the name is captured
//! opportunistically and merged under a documented precedence rule.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;

use crate::models::{FacilityDetail, InspectionKind, InspectionRecord};
use crate::portal::urls::{absolutize, DOCUMENTS_BASE_URL};

use super::{collapse_whitespace, element_text};
use super::detail::labeled_field;

/// Extraction result for a related-documents page.
#[derive(Debug, Clone, Default)]
pub struct DocumentsPage {
    pub inspections: Vec<InspectionRecord>,
    pub facility_name: Option<String>,
}

/// Parse the related-documents page: inspection links plus, when present,
/// the facility name.
pub fn parse_inspection_documents(html: &str) -> DocumentsPage {
    let doc = Html::parse_document(html);
    DocumentsPage {
        inspections: parse_document_links(&doc),
        facility_name: parse_page_name(&doc),
    }
}

fn parse_document_links(doc: &Html) -> Vec<InspectionRecord> {
    let anchor_sel = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let month_year_re = Regex::new(r"\b(\d{1,2})\s*/\s*(\d{4})\b").ok();
    let number_re = Regex::new(r"\d{6,}").ok();

    let mut records = Vec::new();
    for anchor in doc.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !is_document_href(href) {
            continue;
        }
        let text = element_text(anchor);

        let effective_date = month_year_re
            .as_ref()
            .and_then(|re| re.captures(&text))
            .and_then(|caps| {
                let month: u32 = caps[1].parse().ok()?;
                let year: i32 = caps[2].parse().ok()?;
                NaiveDate::from_ymd_opt(year, month, 1)
            });
        if effective_date.is_none() {
            debug!(link = %text, "no parseable month/year in document link");
        }

        let compliance_numbers = number_re
            .as_ref()
            .map(|re| {
                re.find_iter(document_filename(href))
                    .map(|m| m.as_str().to_string())
                    .collect()
            })
            .unwrap_or_default();

        records.push(InspectionRecord {
            effective_date,
            kind: InspectionKind::infer(&text),
            // PDF contents are never parsed; the count stays zero rather
            // than recording a guess.
            violation_count: 0,
            compliance_numbers,
            document_url: absolutize(DOCUMENTS_BASE_URL, href),
        });
    }
    records
}

fn is_document_href(href: &str) -> bool {
    let lowered = href.to_lowercase();
    lowered.contains(".pdf") || lowered.contains("filedownload") || lowered.contains("showdoc")
}

/// Filename portion of an href: last path segment, query stripped.
fn document_filename(href: &str) -> &str {
    let path = href.split(['?', '#']).next().unwrap_or(href);
    path.rsplit('/').next().unwrap_or(path)
}

fn parse_page_name(doc: &Html) -> Option<String> {
    let heading_sel = Selector::parse("h1, h2, h3").ok()?;
    for heading in doc.select(&heading_sel) {
        let text = element_text(heading);
        if !text.is_empty() && !looks_like_error_placeholder(&text) {
            return Some(text);
        }
    }
    labeled_field(doc, &["facility name", "name"])
}

/// Whether a scraped name is the portal's own error text rather than a
/// facility name.
pub fn looks_like_error_placeholder(name: &str) -> bool {
    let trimmed = collapse_whitespace(name);
    if trimmed.is_empty() {
        return true;
    }
    let lowered = trimmed.to_lowercase();
    [
        "error",
        "unable to",
        "not found",
        "not available",
        "object reference",
        "exception",
    ]
    .iter()
    .any(|marker| lowered.contains(marker))
}

/// Merge the documents page into a detail record.
///
/// Precedence rule: the documents-page name wins when the detail-page name
/// is missing or looks like an error placeholder. Inspections replace the
/// detail's list wholesale and the fingerprint is refreshed to cover them.
pub fn merge_documents_page(detail: &mut FacilityDetail, page: DocumentsPage) {
    if let Some(name) = page.facility_name {
        let detail_name_unusable = looks_like_error_placeholder(&detail.name);
        if detail_name_unusable && !looks_like_error_placeholder(&name) {
            detail.name = name;
        }
    }
    detail.attach_inspections(page.inspections);
}
