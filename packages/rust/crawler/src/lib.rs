//! Item page retrieval and completed-sales extraction.
//!
//! This crate provides:
//! - [`fetcher`]: pooled HTTP client with retry/backoff
//! - [`extract`]: HTML sales table → [`SaleRecord`](pricescrape_shared::SaleRecord)

pub mod extract;
pub mod fetcher;

pub use extract::{extract_condition, extract_from_fragment, extract_page, extract_sales};
pub use fetcher::{FetchedPage, Fetcher};

#[cfg(test)]
mod tests {
    use super::*;
    use pricescrape_shared::{Condition, SaleRecord};
    use scraper::Html;

    fn load_fixture(name: &str) -> Html {
        let path = format!("../../../fixtures/html/{name}");
        let content = std::fs::read_to_string(&path)
            .unwrap_or_else(|_| panic!("missing fixture: {path}"));
        Html::parse_document(&content)
    }

    // -----------------------------------------------------------------------
    // Full item page fixtures
    // -----------------------------------------------------------------------

    #[test]
    fn item_page_loose_sales() {
        let doc = load_fixture("item_page.html");
        let records = extract_condition(&doc, Condition::Loose, 1).unwrap();

        let pairs: Vec<(Option<&str>, &str)> = records
            .iter()
            .map(|r| (r.date_sold.as_deref(), r.price_sold.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![(Some("2021-01-01"), "10.00"), (Some("2021-02-01"), "12.50")]
        );
    }

    #[test]
    fn item_page_complete_sales() {
        let doc = load_fixture("item_page.html");
        let records = extract_condition(&doc, Condition::Complete, 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].price_sold, "1,024.99");
        assert_eq!(records[0].condition, Condition::Complete);
    }

    #[test]
    fn item_page_new_has_no_table() {
        let doc = load_fixture("item_page.html");
        let records = extract_condition(&doc, Condition::New, 1).unwrap();
        assert_eq!(records, vec![SaleRecord::placeholder(1, Condition::New)]);
    }

    #[test]
    fn odd_page_fails_validation() {
        let doc = load_fixture("item_page_odd.html");
        assert!(extract_condition(&doc, Condition::Loose, 5).is_err());
        // The other tabs of the same page are unaffected.
        let cib = extract_condition(&doc, Condition::Complete, 5).unwrap();
        assert!(cib[0].is_placeholder());
    }

    #[test]
    fn page_without_frame_is_parse_error() {
        let doc = load_fixture("item_page_no_frame.html");
        for condition in Condition::ALL {
            let err = extract_condition(&doc, condition, 1).unwrap_err();
            assert!(err.is_parse());
        }
    }

    #[test]
    fn extract_page_parses_raw_body() {
        let body = std::fs::read_to_string("../../../fixtures/html/item_page.html").unwrap();
        let loose = extract_page(&body, Condition::Loose, 9).unwrap();
        assert_eq!(loose.len(), 2);
        assert!(loose.iter().all(|r| r.game_id == 9));
    }
}
