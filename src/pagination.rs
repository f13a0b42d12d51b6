//! Computes the follow-up page URLs needed to exhaust a paginated collection.

use anyhow::{Context, Result};
use url::Url;

use crate::models::bitbucket::Paginated;

// When the envelope omits its totals we still owe the page `next` points at.
const FIRST_FOLLOWUP_PAGE: u64 = 2;

/// Returns the URLs of every page after the first, in order.
///
/// Empty when `next` is absent. Otherwise one URL per page from the page
/// `next` points at through `ceil(size / pagelen)` inclusive. A missing or
/// zero `size`/`pagelen` never divides by zero and never loops: the walker
/// conservatively produces exactly one more page.
pub fn remaining_pages<T>(page: &Paginated<T>) -> Result<Vec<Url>> {
    let Some(next) = page.next.as_deref() else {
        return Ok(Vec::new());
    };
    let next = Url::parse(next).with_context(|| format!("invalid next page url `{}`", next))?;

    let start = next
        .query_pairs()
        .find(|(key, _)| key == "page")
        .and_then(|(_, value)| value.parse::<u64>().ok())
        .unwrap_or(FIRST_FOLLOWUP_PAGE);

    let total = match (page.size, page.pagelen) {
        (Some(size), Some(pagelen)) if size > 0 && pagelen > 0 => size.div_ceil(pagelen).max(start),
        _ => start,
    };

    Ok((start..=total).map(|number| page_url(&next, number)).collect())
}

/// Derives a page URL from `next` with the `page` parameter rewritten. The
/// query string is rebuilt from scratch so no stale parameter survives.
fn page_url(next: &Url, number: u64) -> Url {
    let carried: Vec<(String, String)> = next
        .query_pairs()
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .filter(|(key, _)| key != "page")
        .collect();

    let mut url = next.clone();
    url.set_query(None);
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in &carried {
            pairs.append_pair(key, value);
        }
        pairs.append_pair("page", &number.to_string());
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::bitbucket::RawPullRequestStub;

    fn envelope(
        size: Option<u64>,
        pagelen: Option<u64>,
        next: Option<&str>,
    ) -> Paginated<RawPullRequestStub> {
        Paginated {
            size,
            pagelen,
            next: next.map(str::to_string),
            values: Vec::new(),
        }
    }

    #[test]
    fn no_next_means_no_more_pages() {
        let pages = remaining_pages(&envelope(Some(5), Some(10), None)).unwrap();
        assert!(pages.is_empty());
    }

    #[test]
    fn covers_every_page_after_the_first() {
        let next = "https://api.example.org/repositories/acme?page=2";
        let pages = remaining_pages(&envelope(Some(29), Some(10), Some(next))).unwrap();

        let pages: Vec<String> = pages.into_iter().map(Url::into).collect();
        assert_eq!(
            pages,
            vec![
                "https://api.example.org/repositories/acme?page=2",
                "https://api.example.org/repositories/acme?page=3",
            ]
        );
    }

    #[test]
    fn never_revisits_the_first_page() {
        let next = "https://api.example.org/repositories/acme?page=2";
        let pages = remaining_pages(&envelope(Some(100), Some(10), Some(next))).unwrap();

        assert_eq!(pages.len(), 9);
        assert!(pages.iter().all(|url| !url.as_str().ends_with("page=1")));
    }

    #[test]
    fn unknown_totals_still_produce_one_more_page() {
        let next = "https://api.example.org/repositories/acme?page=2";

        let pages = remaining_pages(&envelope(None, None, Some(next))).unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].as_str(), next);

        let pages = remaining_pages(&envelope(Some(0), Some(0), Some(next))).unwrap();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn total_is_clamped_to_the_start_page() {
        // A total computed below the page `next` points at must not
        // produce an empty or inverted range.
        let next = "https://api.example.org/repositories/acme?page=2";
        let pages = remaining_pages(&envelope(Some(10), Some(10), Some(next))).unwrap();

        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn other_query_parameters_are_preserved() {
        let next = "https://api.example.org/pullrequests?state=OPEN&page=2";
        let pages = remaining_pages(&envelope(Some(25), Some(10), Some(next))).unwrap();

        assert_eq!(
            pages[1].as_str(),
            "https://api.example.org/pullrequests?state=OPEN&page=3"
        );
    }

    #[test]
    fn malformed_next_is_an_error() {
        assert!(remaining_pages(&envelope(Some(20), Some(10), Some("not a url"))).is_err());
    }
}
