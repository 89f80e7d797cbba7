use std::fmt;
use std::time::Duration;

use scraper::Selector;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The set of sites this tracker knows how to parse. Unrecognized URLs map to
/// `Unknown`, which carries a generic profile rather than borrowing a real
/// site's selectors and headers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SiteId {
    Amazon,
    Trendyol,
    Hepsiburada,
    Temu,
    Unknown,
}

impl SiteId {
    pub const ALL: [SiteId; 5] = [
        SiteId::Amazon,
        SiteId::Trendyol,
        SiteId::Hepsiburada,
        SiteId::Temu,
        SiteId::Unknown,
    ];

    pub fn profile(&self) -> &'static SiteProfile {
        match self {
            SiteId::Amazon => &AMAZON,
            SiteId::Trendyol => &TRENDYOL,
            SiteId::Hepsiburada => &HEPSIBURADA,
            SiteId::Temu => &TEMU,
            SiteId::Unknown => &GENERIC,
        }
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SiteId::Amazon => "amazon",
            SiteId::Trendyol => "trendyol",
            SiteId::Hepsiburada => "hepsiburada",
            SiteId::Temu => "temu",
            SiteId::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Selector lists, request headers, and timeout policy for one target site.
/// Price selectors are tried in order; the first structural match whose text
/// normalizes to a number wins.
#[derive(Debug)]
pub struct SiteProfile {
    pub price_selectors: &'static [&'static str],
    pub title_selector: &'static str,
    pub request_headers: &'static [(&'static str, &'static str)],
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

const DESKTOP_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/94.0.4606.61 Safari/537.36";
const CHROME_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0.0.0";
const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANG_TR: &str = "tr-TR,tr;q=0.9,en-US;q=0.8,en;q=0.7";

static AMAZON: SiteProfile = SiteProfile {
    price_selectors: &[
        "span#priceblock_ourprice",
        "span#priceblock_dealprice",
        "span.a-price-whole",
        "span.a-offscreen",
    ],
    title_selector: "#productTitle",
    request_headers: &[
        ("User-Agent", DESKTOP_UA),
        ("Accept-Language", ACCEPT_LANG_TR),
    ],
    connect_timeout: Duration::from_secs(5),
    read_timeout: Duration::from_secs(10),
};

static TRENDYOL: SiteProfile = SiteProfile {
    price_selectors: &["span.prc-dsc", "span.prc-org", "span.product-price"],
    title_selector: "h1.pr-new-br",
    request_headers: &[
        ("User-Agent", CHROME_UA),
        ("Accept", ACCEPT_HTML),
        ("Accept-Language", ACCEPT_LANG_TR),
    ],
    connect_timeout: Duration::from_secs(5),
    read_timeout: Duration::from_secs(10),
};

static HEPSIBURADA: SiteProfile = SiteProfile {
    price_selectors: &[
        r#"span[data-bind="markupText: currentPriceBeforePoint"]"#,
        r#"span[data-bind="markupText: currentPriceAfterPoint"]"#,
        "span#offering-price",
    ],
    title_selector: "h1.product-name",
    request_headers: &[
        ("User-Agent", CHROME_UA),
        ("Accept", ACCEPT_HTML),
        ("Accept-Language", ACCEPT_LANG_TR),
    ],
    connect_timeout: Duration::from_secs(5),
    read_timeout: Duration::from_secs(10),
};

static TEMU: SiteProfile = SiteProfile {
    price_selectors: &["div[data-type=price] span", "span._2de9ERAH", "span.price"],
    title_selector: "h1",
    request_headers: &[
        ("User-Agent", CHROME_UA),
        ("Accept", ACCEPT_HTML),
        ("Accept-Language", ACCEPT_LANG_TR),
    ],
    connect_timeout: Duration::from_secs(5),
    read_timeout: Duration::from_secs(15),
};

static GENERIC: SiteProfile = SiteProfile {
    price_selectors: &["span.price", ".price", "[itemprop=price]"],
    title_selector: "h1",
    request_headers: &[("User-Agent", CHROME_UA), ("Accept", ACCEPT_HTML)],
    connect_timeout: Duration::from_secs(5),
    read_timeout: Duration::from_secs(10),
};

// Tested in this order; first match wins.
const SITE_TOKENS: [(&str, SiteId); 4] = [
    ("amazon", SiteId::Amazon),
    ("hepsiburada", SiteId::Hepsiburada),
    ("trendyol", SiteId::Trendyol),
    ("temu", SiteId::Temu),
];

/// Case-sensitive substring classification against the full URL. Total and
/// deterministic: every URL maps to exactly one site id.
pub fn classify(url: &str) -> SiteId {
    for (token, site) in SITE_TOKENS {
        if url.contains(token) {
            return site;
        }
    }
    SiteId::Unknown
}

#[derive(Debug, Error)]
#[error("invalid selector {selector:?} registered for site {site}")]
pub struct RegistryError {
    pub site: SiteId,
    pub selector: String,
}

/// Parses every registered selector. A failure here is a programming error in
/// the profile tables, so callers should treat it as fatal at startup.
pub fn validate() -> Result<(), RegistryError> {
    for site in SiteId::ALL {
        let profile = site.profile();
        for raw in profile
            .price_selectors
            .iter()
            .chain(std::iter::once(&profile.title_selector))
        {
            if Selector::parse(raw).is_err() {
                return Err(RegistryError {
                    site,
                    selector: (*raw).to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("https://www.amazon.com.tr/STANLEY-Termos/dp/B0CNTW2G2F/", SiteId::Amazon)]
    #[case("https://www.trendyol.com/apple/iphone-15-p-773358088", SiteId::Trendyol)]
    #[case("https://www.hepsiburada.com/stanley-termos-p-HBC000077", SiteId::Hepsiburada)]
    #[case("https://www.temu.com/tr/goods.html?goods_id=601099", SiteId::Temu)]
    #[case("https://shop.example.com/product/123", SiteId::Unknown)]
    fn classify_maps_known_domains(#[case] url: &str, #[case] expected: SiteId) {
        assert_eq!(classify(url), expected);
    }

    #[test]
    fn classify_is_deterministic() {
        let url = "https://www.amazon.com.tr/dp/B0CNTW2G2F";
        assert_eq!(classify(url), classify(url));
    }

    #[test]
    fn classify_priority_order_is_fixed() {
        // A URL mentioning two tokens resolves to the higher-priority site.
        assert_eq!(
            classify("https://www.amazon.com.tr/trendyol-gift-card"),
            SiteId::Amazon
        );
    }

    #[test]
    fn unknown_urls_get_the_generic_profile() {
        let site = classify("https://unknown-shop.xyz/item/42");
        assert_eq!(site, SiteId::Unknown);
        assert_eq!(site.profile().title_selector, "h1");
    }

    #[test]
    fn every_registered_selector_parses() {
        validate().expect("registry selectors must be valid CSS");
    }

    #[test]
    fn every_profile_has_at_least_one_price_selector() {
        for site in SiteId::ALL {
            assert!(
                !site.profile().price_selectors.is_empty(),
                "site {} has no price selectors",
                site
            );
        }
    }
}
