use crate::rules::catalog::RuleCatalog;
use crate::rules::engine::MatchResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Clamp bound for every life-area score.
pub const SCORE_LIMIT: f64 = 5.0;
pub const DEFAULT_SCORE_SCALE: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifeArea {
    Career,
    Finance,
    Love,
    Health,
    Mental,
    Spiritual,
}

impl LifeArea {
    pub const ALL: [LifeArea; 6] = [
        LifeArea::Career,
        LifeArea::Finance,
        LifeArea::Love,
        LifeArea::Health,
        LifeArea::Mental,
        LifeArea::Spiritual,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LifeArea::Career => "career",
            LifeArea::Finance => "finance",
            LifeArea::Love => "love",
            LifeArea::Health => "health",
            LifeArea::Mental => "mental",
            LifeArea::Spiritual => "spiritual",
        }
    }
}

impl fmt::Display for LifeArea {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate matched rules into one score per life area.
///
/// Each area is the sum of `effect * computed_strength` over matched rules,
/// divided by `scale` and clamped to `[-SCORE_LIMIT, SCORE_LIMIT]`. Every area
/// is present in the output, zero when untouched.
pub fn score_life_areas(
    results: &[MatchResult],
    catalog: &RuleCatalog,
    scale: f64,
) -> BTreeMap<LifeArea, f64> {
    let mut totals: BTreeMap<LifeArea, f64> =
        LifeArea::ALL.iter().map(|area| (*area, 0.0)).collect();

    for result in results {
        let Some(rule) = catalog.rule(&result.rule_id) else {
            continue;
        };
        for (area, effect) in &rule.effects {
            *totals.entry(*area).or_insert(0.0) += effect * result.computed_strength;
        }
    }

    let scale = if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        DEFAULT_SCORE_SCALE
    };
    for value in totals.values_mut() {
        *value = (*value / scale).clamp(-SCORE_LIMIT, SCORE_LIMIT);
    }
    totals
}

/// Coarse reading of a life-area score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreBand {
    VeryPositive,
    Favourable,
    Neutral,
    Caution,
    Challenging,
}

impl ScoreBand {
    /// Lower bounds are inclusive: 4, 2, 0 and -2.
    pub fn from_score(score: f64) -> ScoreBand {
        if score >= 4.0 {
            ScoreBand::VeryPositive
        } else if score >= 2.0 {
            ScoreBand::Favourable
        } else if score >= 0.0 {
            ScoreBand::Neutral
        } else if score >= -2.0 {
            ScoreBand::Caution
        } else {
            ScoreBand::Challenging
        }
    }
}

pub fn score_bands(scores: &BTreeMap<LifeArea, f64>) -> BTreeMap<LifeArea, ScoreBand> {
    scores
        .iter()
        .map(|(area, score)| (*area, ScoreBand::from_score(*score)))
        .collect()
}

/// Band of the mean score across all areas; neutral when there are none.
pub fn overall_band(scores: &BTreeMap<LifeArea, f64>) -> ScoreBand {
    if scores.is_empty() {
        return ScoreBand::Neutral;
    }
    let mean = scores.values().sum::<f64>() / scores.len() as f64;
    ScoreBand::from_score(mean)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_band_thresholds() {
        assert_eq!(ScoreBand::from_score(5.0), ScoreBand::VeryPositive);
        assert_eq!(ScoreBand::from_score(4.0), ScoreBand::VeryPositive);
        assert_eq!(ScoreBand::from_score(3.0), ScoreBand::Favourable);
        assert_eq!(ScoreBand::from_score(0.0), ScoreBand::Neutral);
        assert_eq!(ScoreBand::from_score(-1.0), ScoreBand::Caution);
        assert_eq!(ScoreBand::from_score(-2.0), ScoreBand::Caution);
        assert_eq!(ScoreBand::from_score(-4.0), ScoreBand::Challenging);
    }

    #[test]
    fn test_overall_band_uses_mean() {
        let scores: BTreeMap<LifeArea, f64> = LifeArea::ALL
            .iter()
            .zip([5.0, 5.0, 5.0, -1.0, -1.0, -1.0])
            .map(|(area, score)| (*area, score))
            .collect();
        assert_eq!(overall_band(&scores), ScoreBand::Favourable);
        assert_eq!(score_bands(&scores)[&LifeArea::Health], ScoreBand::Caution);
        assert_eq!(overall_band(&BTreeMap::new()), ScoreBand::Neutral);
    }

    #[test]
    fn test_band_serializes_snake_case() {
        let json = serde_json::to_string(&ScoreBand::VeryPositive).unwrap();
        assert_eq!(json, "\"very_positive\"");
    }
}
