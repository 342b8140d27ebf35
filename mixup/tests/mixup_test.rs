//! End-to-end grouping mixup tests
//!
//! Product catalogue scenario: hits are scored by `rank` and grouped by
//! `company_id`; products without a company form their own group.

use mixup::ranking::{DeclineSpec, FieldTable, StoredFields};
use mixup::{
    Candidate, DeclineRegistry, Error, GroupingMixupConfig, GroupingReranker, Hits, MixupRequest,
};
use serde_json::json;

fn product(id: &str, company: Option<i64>, rank: f32) -> Candidate {
    let candidate = Candidate::new(id, rank).with_field("rank", rank);
    match company {
        Some(c) => candidate.with_field("company_id", c),
        None => candidate,
    }
}

/// Hits as retrieval returns them: sorted by rank
fn catalogue() -> Hits {
    Hits::from_candidates(vec![
        product("101", Some(1), 2.1),
        product("103", Some(1), 1.9),
        product("201", Some(2), 1.6),
        product("301", None, 1.0),
        product("304", None, 0.8),
        product("204", Some(2), 0.4),
    ])
}

fn mixup_config(decline: DeclineSpec) -> GroupingMixupConfig {
    GroupingMixupConfig::new("company_id", decline)
}

fn recip_request() -> MixupRequest {
    MixupRequest::new(mixup_config(DeclineSpec::expression("1.0 / (_pos + 1)")))
}

fn assert_scores(actual: &[f32], expected: &[f32]) {
    assert_eq!(actual.len(), expected.len(), "{:?} vs {:?}", actual, expected);
    for (a, e) in actual.iter().zip(expected) {
        assert!((a - e).abs() < 1e-5, "{:?} vs {:?}", actual, expected);
    }
}

fn scores(response: &mixup::MixupResponse) -> Vec<f32> {
    response.hits.iter().map(|h| h.score).collect()
}

#[test]
fn test_rescore_full_window() {
    let response = recip_request()
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap();

    assert_eq!(response.total, 6);
    assert_eq!(response.ids(), vec!["101", "201", "301", "103", "304", "204"]);
    assert_scores(&scores(&response), &[2.1, 1.6, 1.0, 0.95, 0.4, 0.2]);
}

#[test]
fn test_rescore_with_small_window_shifts_tail() {
    let mut request = recip_request();
    request.grouping_mixup.window_size = 3;
    let response = request
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap();

    // 103 drops to 0.95; the tail (301, 304, 204) is shifted down by 0.05
    assert_eq!(response.ids(), vec!["101", "201", "103", "301", "304", "204"]);
    assert_scores(&scores(&response), &[2.1, 1.6, 0.95, 0.95, 0.75, 0.35]);
    assert!(response.stats.tail_shift.is_some());
}

#[test]
fn test_rescore_with_declared_fields() {
    let request = MixupRequest::new(
        mixup_config(DeclineSpec::expression("rank > 1 ? 1.0 / (_pos + 1) : 1.0"))
            .with_fields(["rank"]),
    );
    let response = request
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap();

    assert_eq!(response.ids(), vec!["101", "201", "301", "103", "304", "204"]);
    assert_scores(&scores(&response), &[2.1, 1.6, 1.0, 0.95, 0.8, 0.4]);
}

#[test]
fn test_rescore_with_undeclared_field_fails() {
    let request = MixupRequest::new(mixup_config(DeclineSpec::expression(
        "rank > 1 ? 1.0 / (_pos + 1) : 1.0",
    )));
    let err = request
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap_err();

    assert!(matches!(err, Error::FieldResolution(_)));
    assert!(err.is_client_error());
}

#[test]
fn test_pagination() {
    let response = recip_request()
        .with_page(2, 2)
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap();

    assert_eq!(response.total, 6);
    assert_eq!(response.ids(), vec!["301", "103"]);
    assert_scores(&scores(&response), &[1.0, 0.95]);
    assert_eq!(response.max_score, Some(2.1));
}

#[test]
fn test_pagination_disabled() {
    let mut request = recip_request().with_page(0, 2);
    request.grouping_mixup.pagination = false;
    let response = request
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap();

    assert_eq!(response.ids(), vec!["101", "201", "301", "103", "304", "204"]);
}

#[test]
fn test_empty_result() {
    let response = recip_request()
        .run(Hits::default(), &DeclineRegistry::new(), &StoredFields)
        .unwrap();
    assert_eq!(response.total, 0);
    assert!(response.hits.is_empty());
}

#[test]
fn test_position_recip_params() {
    // m / (a*pos + b) + c with a = 0 is a constant multiplier: plain rank order
    let spec = DeclineSpec::new("position_recip")
        .with_param("m", 1.0)
        .with_param("a", 0.0)
        .with_param("b", 1.0)
        .with_param("c", 0.0);
    let response = MixupRequest::new(mixup_config(spec))
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap();
    assert_eq!(response.ids(), vec!["101", "103", "201", "301", "304", "204"]);
}

#[test]
fn test_missing_group_field_is_config_error() {
    let request = MixupRequest::new(GroupingMixupConfig::new("", DeclineSpec::new("constant")));
    let err = request
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn test_request_from_json() {
    let request: MixupRequest = serde_json::from_value(json!({
        "from": 0,
        "size": 3,
        "grouping_mixup": {
            "field": "company_id",
            "rescore_script": {
                "name": "position_recip",
                "params": {"m": 1.0, "a": 1.0, "b": 1.0, "c": 0.0}
            },
            "window_size": 10000,
            "shard_size": 1000
        }
    }))
    .unwrap();

    let response = request
        .run(catalogue(), &DeclineRegistry::new(), &StoredFields)
        .unwrap();
    assert_eq!(response.ids(), vec!["101", "201", "301"]);
}

#[test]
fn test_field_table_resolver() {
    // Group values live in a side table instead of on the hits
    let hits = vec![
        Candidate::new("a", 1.0),
        Candidate::new("b", 0.9),
        Candidate::new("c", 0.8),
    ];
    let mut table = FieldTable::new();
    table.insert("a", "seller", vec![json!("s1")]);
    table.insert("b", "seller", vec![json!("s1")]);
    table.insert("c", "seller", vec![json!("s2")]);

    let config = GroupingMixupConfig::new("seller", DeclineSpec::new("position_recip"))
        .compile(&DeclineRegistry::new())
        .unwrap();
    let mut hits = hits;
    GroupingReranker::new(&config)
        .rerank(&mut hits, &table)
        .unwrap();

    let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["a", "c", "b"]);
}
