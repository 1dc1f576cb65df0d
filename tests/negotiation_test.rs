// Acceptヘッダーによるネゴシエーションの公開APIに対する統合テスト
use jitsu_http::common::negotiation::{
    acceptable_content_types, accepts, negotiate, pattern_matches, AcceptList,
};

#[test]
fn test_browser_accept_header() {
    let header = Some("text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8");
    let list = acceptable_content_types(header);

    let patterns: Vec<&str> = list.iter().map(|e| e.pattern()).collect();
    assert_eq!(
        patterns,
        vec!["text/html", "application/xhtml+xml", "image/webp", "application/xml", "*/*"]
    );

    assert_eq!(negotiate(header, &["application/json", "text/html"]), Some(1));
    // */* が最後に拾う
    assert_eq!(negotiate(header, &["application/json", "text/csv"]), Some(0));
    assert!(accepts(header, "application/xml"));
    assert!(!accepts(header, "application/json"));
}

#[test]
fn test_api_client_prefers_json() {
    let header = Some("application/json;q=1, text/plain;q=0.5");
    let offered = vec!["text/plain".to_string(), "application/json".to_string()];
    assert_eq!(negotiate(header, &offered[..]), Some(1));
}

#[test]
fn test_absent_or_empty_header() {
    assert!(acceptable_content_types(None).is_empty());
    assert!(acceptable_content_types(Some("")).is_empty());
    assert_eq!(negotiate(None, &["text/html"]), None);
    assert_eq!(negotiate(Some(" , ,"), &["text/html"]), None);
    assert!(!accepts(None, "text/html"));
}

#[test]
fn test_no_candidates() {
    assert_eq!(negotiate::<&str>(Some("*/*"), &[]), None);
}

#[test]
fn test_wildcard_subtype_order_follows_candidates() {
    let header = Some("text/*");
    assert_eq!(negotiate(header, &["image/png", "text/plain", "text/html"]), Some(1));
    assert_eq!(negotiate(header, &["image/png"]), None);
}

#[test]
fn test_zero_quality_entry_is_not_accepted_but_still_listed() {
    let list = AcceptList::parse("text/html;q=0, application/json;q=0.3");
    assert_eq!(list.len(), 2);
    assert_eq!(list.entries()[1].pattern(), "text/html");
    assert_eq!(list.quality_of("text/html"), Some(0.0));
    assert!(!list.accepts("text/html"));
    assert!(list.accepts("application/json"));
}

#[test]
fn test_pattern_matching_rules() {
    assert!(pattern_matches("*/*", "application/vnd.api+json"));
    assert!(pattern_matches("application/*+json", "application/vnd.api+json"));
    assert!(!pattern_matches("text/*", "text/html/extra"));
    assert!(!pattern_matches("text/*", "TEXT/html"));
    assert!(!pattern_matches("text/html", "text/html; charset=utf-8"));
}

#[test]
fn test_iterating_a_list() {
    let list = AcceptList::parse("a/b;q=0.2, c/d");
    let mut seen = Vec::new();
    for entry in &list {
        seen.push((entry.pattern().to_string(), entry.quality()));
    }
    assert_eq!(seen, vec![("c/d".to_string(), 1.0), ("a/b".to_string(), 0.2)]);
}
