//! Portal endpoints and URL construction.
//!
//! The lookup portal is addressed by fixed base URLs plus a license-number
//! query parameter. There is no documented stability contract on any of
//! these; they are what the portal serves today.

use url::Url;

/// County search form (ASP.NET postback page).
pub const SEARCH_URL: &str = "https://fortress.wa.gov/dshs/adsaapps/lookup/AFHPubLookup.aspx";

/// Per-facility detail page base.
pub const DETAIL_BASE_URL: &str = "https://fortress.wa.gov/dshs/adsaapps/lookup/AFHLookupDetail.aspx";

/// Per-facility related-documents page base.
pub const DOCUMENTS_BASE_URL: &str = "https://fortress.wa.gov/dshs/adsaapps/lookup/SFFDocList.aspx";

/// Washington's 39 counties, the portal's search-filter dimension.
pub const COUNTIES: &[&str] = &[
    "Adams",
    "Asotin",
    "Benton",
    "Chelan",
    "Clallam",
    "Clark",
    "Columbia",
    "Cowlitz",
    "Douglas",
    "Ferry",
    "Franklin",
    "Garfield",
    "Grant",
    "Grays Harbor",
    "Island",
    "Jefferson",
    "King",
    "Kitsap",
    "Kittitas",
    "Klickitat",
    "Lewis",
    "Lincoln",
    "Mason",
    "Okanogan",
    "Pacific",
    "Pend Oreille",
    "Pierce",
    "San Juan",
    "Skagit",
    "Skamania",
    "Snohomish",
    "Spokane",
    "Stevens",
    "Thurston",
    "Wahkiakum",
    "Walla Walla",
    "Whatcom",
    "Whitman",
    "Yakima",
];

/// Whether a county name is on the known roster (case-insensitive).
pub fn is_known_county(name: &str) -> bool {
    COUNTIES.iter().any(|c| c.eq_ignore_ascii_case(name.trim()))
}

/// Detail page URL for a license number.
pub fn detail_url(license_number: &str) -> String {
    format!(
        "{}?LicenseNumber={}",
        DETAIL_BASE_URL,
        urlencoding::encode(license_number)
    )
}

/// Related-documents page URL for a license number.
pub fn documents_url(license_number: &str) -> String {
    format!(
        "{}?LicenseNumber={}",
        DOCUMENTS_BASE_URL,
        urlencoding::encode(license_number)
    )
}

/// Resolve an href against a base page URL and escape embedded spaces.
/// Document filenames on the portal routinely contain spaces.
pub fn absolutize(base: &str, href: &str) -> String {
    let resolved = if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else {
        match Url::parse(base).and_then(|b| b.join(href)) {
            Ok(url) => url.to_string(),
            Err(_) => format!("{}{}", base, href),
        }
    };
    resolved.replace(' ', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_county_roster_complete() {
        assert_eq!(COUNTIES.len(), 39);
    }

    #[test]
    fn test_is_known_county() {
        assert!(is_known_county("Spokane"));
        assert!(is_known_county("spokane"));
        assert!(is_known_county(" Walla Walla "));
        assert!(!is_known_county("Multnomah"));
        assert!(!is_known_county(""));
    }

    #[test]
    fn test_detail_url_encodes_key() {
        assert_eq!(
            detail_url("753201"),
            format!("{}?LicenseNumber=753201", DETAIL_BASE_URL)
        );
        // Keys are digit strings, but the builder must not trust that.
        assert!(detail_url("a b").contains("LicenseNumber=a%20b"));
    }

    #[test]
    fn test_absolutize_relative_href() {
        let url = absolutize(DOCUMENTS_BASE_URL, "docs/753201 inspection.pdf");
        assert!(url.starts_with("https://fortress.wa.gov/"));
        assert!(!url.contains(' '));
        assert!(url.contains("%20"));
    }

    #[test]
    fn test_absolutize_keeps_absolute_href() {
        let url = absolutize(DOCUMENTS_BASE_URL, "https://example.org/a b.pdf");
        assert_eq!(url, "https://example.org/a%20b.pdf");
    }
}
