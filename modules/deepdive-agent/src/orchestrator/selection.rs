//! URL handling for search results.
//!
//! Result URLs are read from lines of the form `URL: <http(s) URL>`; nothing
//! else in the provider text is parsed.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static RESULT_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"URL: (https?://\S+)").expect("valid result URL regex"));

/// Every `URL: ...` occurrence, in order of appearance.
pub fn extract_urls(search_results: &str) -> Vec<String> {
    RESULT_URL
        .captures_iter(search_results)
        .map(|c| c[1].to_string())
        .collect()
}

/// Host of `url`, if it parses and has one.
pub fn host(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Up to `take` URLs, one per host first (first URL seen for each host, in
/// host first-seen order), then the remaining URLs in order until `take` is
/// reached. URLs without a host count as their own host.
pub fn pick_diverse(urls: &[String], take: usize) -> Vec<String> {
    let mut hosts = HashSet::new();
    let mut picked: Vec<String> = Vec::new();
    for url in urls {
        let key = host(url).unwrap_or_else(|| url.clone());
        if hosts.insert(key) {
            picked.push(url.clone());
        }
    }
    if picked.len() >= take {
        picked.truncate(take);
        return picked;
    }

    for url in urls {
        if picked.len() == take {
            break;
        }
        if !picked.contains(url) {
            picked.push(url.clone());
        }
    }
    picked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn extracts_url_lines_only() {
        let text = "Title: A\nURL: https://a.com/x\nSnippet: see http://nope.com\n---\n\
                    Title: B\nURL: http://b.org/y?q=1\nSnippet: s\nURL: ftp://c.net";
        assert_eq!(
            extract_urls(text),
            vec!["https://a.com/x", "http://b.org/y?q=1"]
        );
        assert!(extract_urls("No results found.").is_empty());
    }

    #[test]
    fn one_per_host_before_repeats() {
        let list = urls(&[
            "https://a.com/1",
            "https://a.com/2",
            "https://b.com/1",
            "https://a.com/3",
            "https://c.com/1",
        ]);
        assert_eq!(
            pick_diverse(&list, 3),
            urls(&["https://a.com/1", "https://b.com/1", "https://c.com/1"])
        );
    }

    #[test]
    fn underfilled_first_pass_is_topped_up_in_order() {
        let list = urls(&[
            "https://a.com/1",
            "https://a.com/2",
            "https://b.com/1",
            "https://a.com/3",
        ]);
        assert_eq!(
            pick_diverse(&list, 3),
            urls(&["https://a.com/1", "https://b.com/1", "https://a.com/2"])
        );
        assert_eq!(pick_diverse(&list, 10).len(), 4);
    }

    #[test]
    fn duplicates_are_not_repeated() {
        let list = urls(&["https://a.com/1", "https://a.com/1", "https://a.com/1"]);
        assert_eq!(pick_diverse(&list, 5), urls(&["https://a.com/1"]));
        assert!(pick_diverse(&[], 4).is_empty());
        assert!(pick_diverse(&list, 0).is_empty());
    }

    #[test]
    fn first_k_results_have_distinct_hosts() {
        let list = urls(&[
            "https://x.com/1",
            "https://x.com/2",
            "https://y.com/1",
            "https://y.com/2",
            "https://z.com/1",
        ]);
        let picked = pick_diverse(&list, 4);
        let first_hosts: HashSet<_> = picked[..3].iter().map(|u| host(u)).collect();
        assert_eq!(first_hosts.len(), 3);
        assert_eq!(picked.len(), 4);
    }
}
