mod common;

use common::*;
use graha_core::ephemeris::CelestialBody;
use graha_core::rules::{CatalogLimits, RuleCatalog, RuleEngine, CATALOG_ISSUE_ID};
use std::path::PathBuf;

#[test]
fn test_duplicate_id_is_named() {
    let source = r#"{
        "version": "dup",
        "rules": [
            {"id": "R1", "base_weight": 1.0, "condition": {"type": "retrograde", "body": "Mars"}},
            {"id": "R2", "base_weight": 1.0, "condition": {"type": "combust", "body": "Venus"}},
            {"id": "R1", "base_weight": 2.0, "condition": {"type": "combust", "body": "Mercury"}}
        ]
    }"#;
    let err = RuleCatalog::load(source, &CatalogLimits::default()).unwrap_err();
    assert_eq!(err.offending_ids(), vec!["R1"]);
    assert!(err.to_string().contains("duplicate rule id"));
}

#[test]
fn test_duplicate_of_unparsable_rule_is_named() {
    let source = r#"{
        "version": "dup-after-broken",
        "rules": [
            {"id": "X", "base_weight": 1.0, "condition": {"type": "retrograde", "body": "Pluto"}},
            {"id": "X", "base_weight": 1.0, "condition": {"type": "retrograde", "body": "Mars"}},
            {"id": "Y", "base_weight": 1.0, "condition": {"type": "orbiting", "body": "Mars"}},
            {"id": "Y", "base_weight": 1.0, "condition": {"type": "eclipsed", "body": "Sun"}}
        ]
    }"#;
    let err = RuleCatalog::load(source, &CatalogLimits::default()).unwrap_err();
    assert_eq!(err.offending_ids(), vec!["X", "Y"]);

    let duplicates: Vec<&str> = err
        .issues
        .iter()
        .filter(|issue| issue.reason == "duplicate rule id")
        .map(|issue| issue.rule_id.as_str())
        .collect();
    assert_eq!(duplicates, vec!["Y", "X"]);
}

#[test]
fn test_every_offending_rule_is_listed() {
    let source = r#"{
        "version": "broken",
        "rules": [
            {"id": "A", "base_weight": 1.0,
             "condition": {"type": "body_in_house", "body": "Sun", "houses": [13]}},
            {"id": "B", "base_weight": 1.0,
             "condition": {"type": "and", "children": []}},
            {"id": "C", "base_weight": 1.0,
             "condition": {"type": "body_in_sign", "body": "Moon", "signs": ["Ophiuchus"]}},
            {"id": "D", "base_weight": 1.0,
             "condition": {"type": "aspect", "a": "Mars", "b": "Mars", "aspects": ["square"]}},
            {"id": "E", "base_weight": 1.0,
             "condition": {"type": "dignity", "body": "Jupiter", "dignities": ["moolatrikona"]}},
            {"id": "OK", "base_weight": 1.0,
             "condition": {"type": "retrograde", "body": "Saturn"}}
        ]
    }"#;
    let err = RuleCatalog::load(source, &CatalogLimits::default()).unwrap_err();
    assert_eq!(err.offending_ids(), vec!["C", "E", "A", "B", "D"]);
}

#[test]
fn test_depth_limit_from_configuration() {
    let source = r#"{
        "version": "deep",
        "rules": [
            {"id": "DEEP", "base_weight": 1.0,
             "condition": {"type": "not", "child":
                {"type": "not", "child":
                    {"type": "not", "child": {"type": "retrograde", "body": "Mars"}}}}}
        ]
    }"#;
    let shallow = CatalogLimits { max_depth: 3, ..CatalogLimits::default() };
    let err = RuleCatalog::load(source, &shallow).unwrap_err();
    assert_eq!(err.offending_ids(), vec!["DEEP"]);
    assert!(RuleCatalog::load(source, &CatalogLimits::default()).is_ok());
}

#[test]
fn test_body_outside_configured_list() {
    let source = r#"{
        "version": "nodes",
        "rules": [
            {"id": "N1", "base_weight": 1.0, "condition": {"type": "retrograde", "body": "Rahu"}},
            {"id": "L1", "base_weight": 1.0,
             "condition": {"type": "house_lord_in", "house": 1, "houses": [10]}}
        ]
    }"#;
    let limits = CatalogLimits {
        bodies: vec![CelestialBody::Sun, CelestialBody::Moon, CelestialBody::Mars],
        ..CatalogLimits::default()
    };
    let err = RuleCatalog::load(source, &limits).unwrap_err();
    assert_eq!(err.offending_ids(), vec!["N1", "L1"]);
}

#[test]
fn test_empty_version_and_malformed_document() {
    let err = RuleCatalog::load(r#"{"version": " ", "rules": []}"#, &CatalogLimits::default())
        .unwrap_err();
    assert_eq!(err.offending_ids(), vec![CATALOG_ISSUE_ID]);

    let err = RuleCatalog::load("[1, 2, 3]", &CatalogLimits::default()).unwrap_err();
    assert_eq!(err.offending_ids(), vec![CATALOG_ISSUE_ID]);
}

#[test]
fn test_sample_catalog_loads() {
    let catalog = load_catalog(SAMPLE_CATALOG);
    assert_eq!(catalog.version(), "test-2024.1");
    assert_eq!(catalog.len(), 10);
    assert_eq!(catalog.rules()[0].id, "R1");
    assert_eq!(catalog.rule("R4").unwrap().category, "career");
}

#[test]
fn test_shipped_catalog_is_valid() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../rules/bphs_level2.json");
    let catalog = RuleCatalog::load_from_path(&path, &CatalogLimits::default()).unwrap();
    assert!(!catalog.is_empty());
    assert!(catalog.version().starts_with("bphs-level2"));

    let results = RuleEngine::new().evaluate(&sample_facts(), &catalog).unwrap();
    let matched: Vec<&str> = results.iter().map(|r| r.rule_id.as_str()).collect();
    // exalted Moon, Mars in the 12th from the Moon, Moon's own period ruling the 10th
    for id in ["BPHS-010", "BPHS-062", "BPHS-072"] {
        assert!(matched.contains(&id), "{id} missing from {matched:?}");
    }
    assert!(!matched.contains(&"BPHS-066"));
}

#[test]
fn test_missing_file() {
    let err = RuleCatalog::load_from_path(
        &PathBuf::from("/no/such/catalog.json"),
        &CatalogLimits::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("cannot read"));
}
