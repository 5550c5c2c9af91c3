//! County results-page extraction.
//!
//! Primary strategy: row-scoped regexes over each result row's text.
//! Secondary strategy: scan anchors for detail-link URLs and manufacture
//! stubs from the license number alone, so a layout change that breaks the
//! row parse still yields syncable keys.

use std::collections::HashSet;

use regex::Regex;
use scraper::{Html, Selector};
use tracing::warn;

use crate::models::FacilityStub;

use super::{element_lines, element_text};

/// Parse a county results page into facility stubs.
pub fn parse_facility_list(html: &str) -> Vec<FacilityStub> {
    if looks_like_error_page(html) {
        warn!(
            length = html.len(),
            "results page looks like a portal error page; treating as zero results"
        );
        return Vec::new();
    }

    let doc = Html::parse_document(html);
    let mut stubs = parse_list_rows(&doc);
    if stubs.is_empty() {
        stubs = parse_list_anchors(&doc);
    }
    if stubs.is_empty() {
        log_list_diagnostics(html, &doc);
    }
    stubs
}

/// Primary tier: one stub per table row that carries a license number.
pub(crate) fn parse_list_rows(doc: &Html) -> Vec<FacilityStub> {
    let row_sel = match Selector::parse("tr") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let license_re = match Regex::new(r"\b(\d{6,9})\b") {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };
    // Portal rows quote the facility name; typographic quotes included.
    let quoted_re = Regex::new(r#"["\u{201c}]([^"\u{201c}\u{201d}]{2,})["\u{201d}]"#).ok();
    let phone_re = Regex::new(r"\(?\d{3}\)?[\s.-]?\d{3}[\s.-]\d{4}").ok();
    let city_re = Regex::new(r"^(?P<city>.+?),\s*WA\b").ok();

    let table_sel = Selector::parse("table").ok();

    let mut seen = HashSet::new();
    let mut stubs = Vec::new();
    for row in doc.select(&row_sel) {
        // Skip composite rows that wrap a nested table; their inner rows
        // carry the actual records.
        if let Some(ref nested) = table_sel {
            if row.select(nested).next().is_some() {
                continue;
            }
        }
        let lines = element_lines(row);
        if lines.is_empty() {
            continue;
        }
        let row_text = lines.join("\n");

        let license = match license_re.captures(&row_text) {
            Some(caps) => caps[1].to_string(),
            None => continue,
        };
        // First sighting of a license wins.
        if !seen.insert(license.clone()) {
            continue;
        }

        // Quoted name first; otherwise the first line that is not the
        // bare license number.
        let name = quoted_re
            .as_ref()
            .and_then(|re| re.captures(&row_text))
            .map(|caps| caps[1].trim().to_string())
            .unwrap_or_else(|| {
                lines
                    .iter()
                    .find(|l| !l.chars().all(|c| c.is_ascii_digit()))
                    .cloned()
                    .unwrap_or_default()
            });

        let phone = phone_re
            .as_ref()
            .and_then(|re| re.find(&row_text))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let (street, city) = split_row_address(&lines, city_re.as_ref(), &name);

        stubs.push(FacilityStub {
            license_number: license,
            name,
            street,
            city,
            phone,
        });
    }
    stubs
}

/// The "City, WA 99xxx" line marks the locality; the prior line that is
/// neither the name nor the license is the street address.
fn split_row_address(
    lines: &[String],
    city_re: Option<&Regex>,
    name: &str,
) -> (String, String) {
    let Some(re) = city_re else {
        return (String::new(), String::new());
    };
    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = re.captures(line) {
            let city = caps["city"].trim_end_matches(',').trim().to_string();
            let street = lines[..idx]
                .iter()
                .rev()
                .find(|l| l.as_str() != name && !l.chars().all(|c| c.is_ascii_digit()))
                .cloned()
                .unwrap_or_default();
            return (street, city);
        }
    }
    (String::new(), String::new())
}

/// Fallback tier: manufacture key-only stubs from detail-link anchors.
pub(crate) fn parse_list_anchors(doc: &Html) -> Vec<FacilityStub> {
    let anchor_sel = match Selector::parse("a[href]") {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };
    let href_re = match Regex::new(r"(?i)LicenseNumber=(\d+)") {
        Ok(r) => r,
        Err(_) => return Vec::new(),
    };

    let mut seen = HashSet::new();
    let mut stubs = Vec::new();
    for anchor in doc.select(&anchor_sel) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(caps) = href_re.captures(href) else {
            continue;
        };
        let license = caps[1].to_string();
        if !seen.insert(license.clone()) {
            continue;
        }
        // Key-only stub; the detail fetch fills in everything else.
        stubs.push(FacilityStub {
            license_number: license,
            ..Default::default()
        });
    }
    stubs
}

/// Portal error pages are short documents with server error markers.
pub fn looks_like_error_page(html: &str) -> bool {
    if html.len() > 4096 {
        return false;
    }
    let lowered = html.to_lowercase();
    ["server error", "runtime error", "an error has occurred", "an error occurred"]
        .iter()
        .any(|marker| lowered.contains(marker))
}

/// Log enough shape information to diagnose markup drift from logs alone,
/// without replaying the crawl.
fn log_list_diagnostics(html: &str, doc: &Html) {
    let table_count = Selector::parse("table")
        .map(|s| doc.select(&s).count())
        .unwrap_or(0);
    let anchor_count = Selector::parse("a")
        .map(|s| doc.select(&s).count())
        .unwrap_or(0);
    let sample_row = Selector::parse("tr")
        .ok()
        .and_then(|s| doc.select(&s).next().map(element_text))
        .unwrap_or_default();
    let sample_row: String = sample_row.chars().take(200).collect();
    warn!(
        length = html.len(),
        tables = table_count,
        anchors = anchor_count,
        sample_row = %sample_row,
        "results page yielded no facilities with any strategy"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r#"
        <html><body>
        <table id="resultsGrid">
          <tr><th>License</th><th>Name</th><th>Address</th><th>Phone</th></tr>
          <tr>
            <td>753201</td>
            <td>"Evergreen Care Home"</td>
            <td>1418 S Maple St<br>Spokane, WA 99203</td>
            <td>(509) 555-0132</td>
          </tr>
          <tr>
            <td>108844</td>
            <td>"Maple Grove AFH"</td>
            <td>22 Birch Ln<br>Cheney, WA 99004</td>
            <td>509.555.0190</td>
          </tr>
        </table>
        </body></html>
    "#;

    #[test]
    fn test_parse_rows() {
        let stubs = parse_facility_list(RESULTS_PAGE);
        assert_eq!(stubs.len(), 2);

        assert_eq!(stubs[0].license_number, "753201");
        assert_eq!(stubs[0].name, "Evergreen Care Home");
        assert_eq!(stubs[0].street, "1418 S Maple St");
        assert_eq!(stubs[0].city, "Spokane");
        assert_eq!(stubs[0].phone, "(509) 555-0132");

        assert_eq!(stubs[1].license_number, "108844");
        assert_eq!(stubs[1].city, "Cheney");
    }

    #[test]
    fn test_anchor_fallback() {
        // No parseable rows, one detail link: exactly one key-only stub.
        let html = r#"
            <html><body>
            <div class="listing">
              <a href="AFHLookupDetail.aspx?LicenseNumber=753201">View details</a>
              <a href="help.aspx">Help</a>
            </div>
            </body></html>
        "#;
        let stubs = parse_facility_list(html);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].license_number, "753201");
        assert!(stubs[0].street.is_empty());
    }

    #[test]
    fn test_anchor_fallback_dedupes() {
        let html = r#"
            <a href="AFHLookupDetail.aspx?LicenseNumber=111222">A</a>
            <a href="AFHLookupDetail.aspx?LicenseNumber=111222">A again</a>
            <a href="AFHLookupDetail.aspx?LicenseNumber=333444">B</a>
        "#;
        let stubs = parse_facility_list(html);
        assert_eq!(stubs.len(), 2);
        assert_eq!(stubs[0].license_number, "111222");
        assert_eq!(stubs[1].license_number, "333444");
    }

    #[test]
    fn test_error_page_detection() {
        let html = "<html><body><h1>Server Error in '/' Application.</h1></body></html>";
        assert!(looks_like_error_page(html));
        assert!(parse_facility_list(html).is_empty());

        // A long page mentioning errors in content is not an error page.
        let long = format!(
            "<html><body>{}server error{}</body></html>",
            "x".repeat(4096),
            "y".repeat(64)
        );
        assert!(!looks_like_error_page(&long));
    }

    #[test]
    fn test_empty_and_garbage_input() {
        assert!(parse_facility_list("").is_empty());
        assert!(parse_facility_list("<<<not html>>>").is_empty());
        assert!(parse_facility_list("<table><tr><td>no licenses here</td></tr></table>").is_empty());
    }

    #[test]
    fn test_header_rows_skipped() {
        // Rows without a license-shaped number produce no stub.
        let html = r#"
            <table>
              <tr><th>License</th><th>Name</th></tr>
              <tr><td>753201</td><td>"Cedar House"</td></tr>
            </table>
        "#;
        let stubs = parse_facility_list(html);
        assert_eq!(stubs.len(), 1);
        assert_eq!(stubs[0].name, "Cedar House");
    }
}
