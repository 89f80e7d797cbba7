use regex::Regex;
use scraper::{Html, Selector};
use thiserror::Error;

use crate::sites::SiteProfile;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("no price selector matched the document")]
    NoSelectorMatched,

    #[error("a price selector matched but its text did not parse as a price")]
    ParseFailure,
}

/// Pulls a normalized price (and, best-effort, a title) out of fetched markup.
///
/// Site markup drifts; trying several candidate selectors in priority order
/// and skipping non-numeric matches tolerates partial drift without a
/// re-deploy. Retrying lives in the fetcher, never here: parsing a fixed
/// string cannot fail transiently.
pub struct PriceExtractor {
    currency_markers: Regex,
}

impl Default for PriceExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceExtractor {
    pub fn new() -> Self {
        Self {
            currency_markers: Regex::new(r"TL|₺|\s").unwrap(),
        }
    }

    /// Tries the profile's price selectors in order. The first selector that
    /// structurally matches *and* normalizes to a positive number is final;
    /// a structural match with non-numeric text falls through to the next
    /// selector.
    pub fn extract_price(&self, body: &str, profile: &SiteProfile) -> Result<f64, ExtractError> {
        let document = Html::parse_document(body);
        let mut matched_any = false;

        for raw in profile.price_selectors {
            // Registry selectors are validated at startup.
            let Ok(selector) = Selector::parse(raw) else {
                continue;
            };
            let Some(element) = document.select(&selector).next() else {
                continue;
            };
            matched_any = true;

            let text: String = element.text().collect();
            match self.normalize(text.trim()) {
                Some(price) => return Ok(price),
                None => {
                    tracing::debug!(
                        selector = raw,
                        text = text.trim(),
                        "price selector matched non-numeric text, trying next"
                    );
                }
            }
        }

        if matched_any {
            Err(ExtractError::ParseFailure)
        } else {
            Err(ExtractError::NoSelectorMatched)
        }
    }

    /// Single-selector title lookup. Absent or empty titles are not an error.
    pub fn extract_title(&self, body: &str, profile: &SiteProfile) -> Option<String> {
        let document = Html::parse_document(body);
        let selector = Selector::parse(profile.title_selector).ok()?;
        let element = document.select(&selector).next()?;
        let title = element.text().collect::<String>().trim().to_string();
        (!title.is_empty()).then_some(title)
    }

    /// Interprets the cleaned string in the Turkish locale: `.` groups
    /// thousands, `,` marks the decimal. `"1.299,99 TL"` becomes `1299.99`.
    fn normalize(&self, text: &str) -> Option<f64> {
        let cleaned = self.currency_markers.replace_all(text, "");
        let cleaned = cleaned.replace('.', "").replace(',', ".");
        let price: f64 = cleaned.parse().ok()?;
        (price.is_finite() && price > 0.0).then_some(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sites::SiteId;
    use rstest::rstest;

    fn extractor() -> PriceExtractor {
        PriceExtractor::new()
    }

    #[rstest]
    #[case(SiteId::Amazon, "span", "id=\"priceblock_ourprice\"")]
    #[case(SiteId::Trendyol, "span", "class=\"prc-dsc\"")]
    #[case(
        SiteId::Hepsiburada,
        "span",
        "data-bind=\"markupText: currentPriceBeforePoint\""
    )]
    fn first_selector_extracts_turkish_price_format(
        #[case] site: SiteId,
        #[case] tag: &str,
        #[case] attrs: &str,
    ) {
        let html = format!("<{tag} {attrs}>1.299,99 TL</{tag}>");
        let price = extractor().extract_price(&html, site.profile()).unwrap();
        assert_eq!(price, 1299.99);
    }

    #[test]
    fn falls_through_to_second_selector_when_first_is_absent() {
        // Amazon's first selector is span#priceblock_ourprice; only the deal
        // price span is present here.
        let html = r#"<span id="priceblock_dealprice">899,90 TL</span>"#;
        let price = extractor()
            .extract_price(html, SiteId::Amazon.profile())
            .unwrap();
        assert_eq!(price, 899.90);
    }

    #[test]
    fn skips_selector_with_non_numeric_text() {
        let html = r#"
            <span id="priceblock_ourprice">Currently unavailable</span>
            <span id="priceblock_dealprice">1.450,00 TL</span>
        "#;
        let price = extractor()
            .extract_price(html, SiteId::Amazon.profile())
            .unwrap();
        assert_eq!(price, 1450.0);
    }

    #[test]
    fn no_structural_match_is_no_selector_matched() {
        let html = "<div class=\"unrelated\">hello</div>";
        let err = extractor()
            .extract_price(html, SiteId::Trendyol.profile())
            .unwrap_err();
        assert_eq!(err, ExtractError::NoSelectorMatched);
    }

    #[test]
    fn all_matches_non_numeric_is_parse_failure() {
        let html = r#"
            <span class="prc-dsc">sold out</span>
            <span class="prc-org">see basket</span>
        "#;
        let err = extractor()
            .extract_price(html, SiteId::Trendyol.profile())
            .unwrap_err();
        assert_eq!(err, ExtractError::ParseFailure);
    }

    #[test]
    fn amazon_whole_price_without_decimals() {
        let html = r#"<span class="a-price-whole">1.299</span>"#;
        let price = extractor()
            .extract_price(html, SiteId::Amazon.profile())
            .unwrap();
        assert_eq!(price, 1299.0);
    }

    #[test]
    fn lira_sign_is_stripped() {
        let html = r#"<span class="prc-dsc">₺950,50</span>"#;
        let price = extractor()
            .extract_price(html, SiteId::Trendyol.profile())
            .unwrap();
        assert_eq!(price, 950.50);
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let html = r#"
            <span class="prc-dsc">0,00 TL</span>
            <span class="prc-org">1.000,00 TL</span>
        "#;
        // The zero price is skipped, the original price wins.
        let price = extractor()
            .extract_price(html, SiteId::Trendyol.profile())
            .unwrap();
        assert_eq!(price, 1000.0);
    }

    #[test]
    fn extract_title_trims_whitespace() {
        let html = "<h1 class=\"pr-new-br\">  Stanley Quick Flip Termos  </h1>";
        let title = extractor().extract_title(html, SiteId::Trendyol.profile());
        assert_eq!(title.as_deref(), Some("Stanley Quick Flip Termos"));
    }

    #[test]
    fn extract_title_absent_is_none() {
        let html = "<div>no title here</div>";
        assert_eq!(
            extractor().extract_title(html, SiteId::Amazon.profile()),
            None
        );
    }
}
