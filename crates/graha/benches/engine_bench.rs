use chrono::{TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use graha_core::chart::{normalize, AspectCalculator, AspectType, ChartConfig};
use graha_core::ephemeris::{CelestialBody, RawPosition};
use graha_core::rules::{CatalogLimits, RuleCatalog, RuleEngine};

const LONGITUDES: [f64; 9] = [100.0, 40.0, 10.0, 112.0, 250.0, 130.0, 310.0, 330.0, 150.0];
const MOTIONS: [f64; 9] = [0.95, 13.2, 0.6, -0.3, 0.1, 1.2, 0.05, -0.05, -0.05];

const CATALOG: &str = r#"{
    "version": "bench",
    "rules": [
        {"id": "B1", "base_weight": 2.0, "condition": {"type": "and", "children": [
            {"type": "body_in_house", "body": "Mars", "houses": [7]},
            {"type": "dignity", "body": "Mars", "dignities": ["own"]}
        ]}},
        {"id": "B2", "base_weight": 1.0, "condition": {"type": "combust", "body": "Mercury"}},
        {"id": "B3", "base_weight": 1.0,
         "condition": {"type": "aspect", "a": "Mars", "b": "Jupiter", "aspects": ["trine"]}},
        {"id": "B4", "base_weight": 1.0, "condition": {"type": "or", "children": [
            {"type": "retrograde", "body": "Jupiter"},
            {"type": "body_in_sign", "body": "Moon", "signs": ["Taurus"]}
        ]}},
        {"id": "B5", "base_weight": 1.0,
         "condition": {"type": "house_lord_in", "house": 7, "houses": [7]}},
        {"id": "B6", "base_weight": 1.0,
         "condition": {"type": "aspects_house", "body": "Saturn", "houses": [7]}},
        {"id": "B7", "base_weight": 1.0,
         "condition": {"type": "same_house", "bodies": ["Sun", "Mercury"]}},
        {"id": "B8", "base_weight": 1.0, "condition": {"type": "kala_sarpa"}},
        {"id": "B9", "base_weight": 1.0, "condition": {"type": "mutual_exchange"}},
        {"id": "B10", "base_weight": 1.0,
         "condition": {"type": "benefics_in", "reference": "moon", "houses": [6, 7, 8]}},
        {"id": "B11", "base_weight": 1.0,
         "condition": {"type": "dasha_lord_owns", "level": "antardasha", "houses": [10]}}
    ]
}"#;

fn positions() -> Vec<RawPosition> {
    let timestamp = Utc.with_ymd_and_hms(2024, 3, 14, 18, 35, 0).unwrap();
    CelestialBody::ALL
        .iter()
        .enumerate()
        .map(|(i, body)| RawPosition {
            body: *body,
            longitude: LONGITUDES[i],
            latitude: 0.0,
            daily_motion: MOTIONS[i],
            timestamp,
        })
        .collect()
}

fn bench_calculate_aspect(c: &mut Criterion) {
    let calculator = AspectCalculator::new();
    let config = ChartConfig::default();

    c.bench_function("calculate_aspect", |b| {
        b.iter(|| {
            calculator.calculate_aspect(black_box(100.0), black_box(222.0), |aspect: AspectType| {
                config.pair_orb(CelestialBody::Sun, CelestialBody::Jupiter, aspect)
            })
        })
    });
}

fn bench_normalize(c: &mut Criterion) {
    let config = ChartConfig::default();
    let positions = positions();

    c.bench_function("normalize_chart", |b| {
        b.iter(|| normalize(black_box(&positions), black_box(200.0), None, &config))
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let config = ChartConfig::default();
    let facts = normalize(&positions(), 200.0, None, &config).unwrap();
    let catalog = RuleCatalog::load(CATALOG, &CatalogLimits::default()).unwrap();
    let engine = RuleEngine::new();

    c.bench_function("evaluate_catalog", |b| {
        b.iter(|| engine.evaluate(black_box(&facts), black_box(&catalog)))
    });
}

criterion_group!(benches, bench_calculate_aspect, bench_normalize, bench_evaluate);
criterion_main!(benches);
