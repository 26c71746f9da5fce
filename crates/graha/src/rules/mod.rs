pub mod catalog;
pub mod condition;
pub mod engine;
pub mod scoring;

pub use catalog::{RuleCatalog, RuleDefinition, StrengthModifiers, CATALOG_ISSUE_ID};
pub use condition::{CatalogLimits, ConditionNode, Reference};
pub use engine::{result_order, Fact, MatchResult, RuleEngine};
pub use scoring::{
    overall_band, score_bands, score_life_areas, LifeArea, ScoreBand, DEFAULT_SCORE_SCALE,
    SCORE_LIMIT,
};
