//! Best-effort HTML extraction for the lookup portal.
//!
//! The portal's markup is inconsistent across record types and years, so
//! extraction is layered: a strict tier first, then looser heuristics, then
//! regex over bare text. Every function here is pure and total: unexpected
//! markup yields empty/default values and diagnostic logs, never an error.

mod detail;
mod inspections;
mod list;

pub use detail::{parse_facility_detail, split_composite_address, AddressParts};
pub use inspections::{
    looks_like_error_placeholder, merge_documents_page, parse_inspection_documents, DocumentsPage,
};
pub use list::{looks_like_error_page, parse_facility_list};

use scraper::ElementRef;

/// Collapse runs of whitespace into single spaces and trim.
pub(crate) fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// All text under an element as one whitespace-collapsed string.
pub(crate) fn element_text(el: ElementRef) -> String {
    collapse_whitespace(&el.text().collect::<Vec<_>>().join(" "))
}

/// Text under an element as trimmed non-empty lines. Text nodes map to
/// lines, so `<br>`-separated address blocks come out line-per-line.
pub(crate) fn element_lines(el: ElementRef) -> Vec<String> {
    el.text()
        .flat_map(|t| t.lines())
        .map(|t| collapse_whitespace(t))
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::{Html, Selector};

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a\n\t b  c "), "a b c");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_element_lines_splits_on_br() {
        let html = Html::parse_fragment("<td>1418 S Maple St<br>Spokane, WA 99203</td>");
        let sel = Selector::parse("td").unwrap();
        let td = html.select(&sel).next().unwrap();
        assert_eq!(
            element_lines(td),
            vec!["1418 S Maple St", "Spokane, WA 99203"]
        );
    }
}
