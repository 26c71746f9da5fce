//! Versioned, validated rule catalog.
//!
//! A catalog is loaded once, checked in full, and then only ever read. Every
//! problem found during loading is reported together so an author can fix a
//! catalog in one pass.

use crate::chart::Dignity;
use crate::error::{CatalogValidationError, RuleIssue};
use crate::rules::condition::{CatalogLimits, ConditionNode};
use crate::rules::scoring::LifeArea;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Id used in reports for problems that belong to the document, not a rule.
pub const CATALOG_ISSUE_ID: &str = "<catalog>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    /// Lower runs first on ties.
    #[serde(default)]
    pub priority: i32,
    #[serde(alias = "weight")]
    pub base_weight: f64,
    pub condition: ConditionNode,
    /// Signed contribution of this rule to each life area.
    #[serde(default)]
    pub effects: BTreeMap<LifeArea, f64>,
}

fn default_category() -> String {
    "general".to_string()
}

/// Multipliers applied to a matched rule's weight per contributing body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrengthModifiers {
    pub exalted: f64,
    pub own_sign: f64,
    pub neutral: f64,
    pub debilitated: f64,
    pub combust_penalty: f64,
}

impl Default for StrengthModifiers {
    fn default() -> Self {
        Self {
            exalted: 1.5,
            own_sign: 1.2,
            neutral: 1.0,
            debilitated: 0.5,
            combust_penalty: 0.5,
        }
    }
}

impl StrengthModifiers {
    pub fn dignity_multiplier(&self, dignity: Dignity) -> f64 {
        match dignity {
            Dignity::Exalted => self.exalted,
            Dignity::OwnSign => self.own_sign,
            Dignity::Neutral => self.neutral,
            Dignity::Debilitated => self.debilitated,
        }
    }

    fn problems(&self) -> Vec<String> {
        [
            ("exalted", self.exalted),
            ("own_sign", self.own_sign),
            ("neutral", self.neutral),
            ("debilitated", self.debilitated),
            ("combust_penalty", self.combust_penalty),
        ]
        .iter()
        .filter(|(_, value)| !value.is_finite())
        .map(|(name, value)| format!("strength.{} is not finite ({})", name, value))
        .collect()
    }
}

#[derive(Deserialize)]
struct CatalogDocument {
    version: String,
    #[serde(default)]
    rules: Vec<Value>,
    #[serde(default)]
    strength: StrengthModifiers,
}

/// Immutable rule collection tagged with a version.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleCatalog {
    version: String,
    rules: Vec<RuleDefinition>,
    strength: StrengthModifiers,
    index: HashMap<String, usize>,
}

impl RuleCatalog {
    /// Parse and validate a JSON catalog document.
    pub fn load(source: &str, limits: &CatalogLimits) -> Result<Self, CatalogValidationError> {
        let document: CatalogDocument = serde_json::from_str(source).map_err(|err| {
            CatalogValidationError::single(CATALOG_ISSUE_ID, format!("malformed catalog: {}", err))
        })?;

        let mut issues = Vec::new();
        let mut rules = Vec::with_capacity(document.rules.len());
        // ids of entries that failed to parse still claim their id
        let mut unparsed_ids: Vec<String> = Vec::new();
        let mut skipped = 0usize;

        for (position, entry) in document.rules.into_iter().enumerate() {
            if is_comment_entry(&entry) {
                skipped += 1;
                continue;
            }
            let id = entry.get("id").and_then(Value::as_str).map(str::to_string);
            match serde_json::from_value::<RuleDefinition>(entry) {
                Ok(rule) => rules.push(rule),
                Err(err) => {
                    let label = id.clone().unwrap_or_else(|| format!("#{}", position));
                    issues.push(RuleIssue {
                        rule_id: label,
                        reason: err.to_string(),
                    });
                    if let Some(id) = id {
                        if unparsed_ids.contains(&id) {
                            issues.push(RuleIssue {
                                rule_id: id,
                                reason: "duplicate rule id".to_string(),
                            });
                        } else {
                            unparsed_ids.push(id);
                        }
                    }
                }
            }
        }
        if skipped > 0 {
            debug!("Skipped {} comment entries in catalog {}", skipped, document.version);
        }

        let catalog = Self::build(
            document.version,
            rules,
            document.strength,
            limits,
            issues,
            &unparsed_ids,
        )?;
        info!(
            "Loaded rule catalog {} with {} rules",
            catalog.version,
            catalog.rules.len()
        );
        Ok(catalog)
    }

    /// Read and load a catalog file.
    pub fn load_from_path(
        path: &Path,
        limits: &CatalogLimits,
    ) -> Result<Self, CatalogValidationError> {
        let source = std::fs::read_to_string(path).map_err(|err| {
            CatalogValidationError::single(
                CATALOG_ISSUE_ID,
                format!("cannot read {}: {}", path.display(), err),
            )
        })?;
        Self::load(&source, limits)
    }

    /// Validate already-constructed rules into a catalog.
    pub fn from_rules(
        version: impl Into<String>,
        rules: Vec<RuleDefinition>,
        strength: StrengthModifiers,
        limits: &CatalogLimits,
    ) -> Result<Self, CatalogValidationError> {
        Self::build(version.into(), rules, strength, limits, Vec::new(), &[])
    }

    /// `unparsed_ids` are ids already taken by entries that failed to parse.
    fn build(
        version: String,
        rules: Vec<RuleDefinition>,
        strength: StrengthModifiers,
        limits: &CatalogLimits,
        mut issues: Vec<RuleIssue>,
        unparsed_ids: &[String],
    ) -> Result<Self, CatalogValidationError> {
        if version.trim().is_empty() {
            issues.push(RuleIssue {
                rule_id: CATALOG_ISSUE_ID.to_string(),
                reason: "empty catalog version".to_string(),
            });
        }
        for reason in strength.problems() {
            issues.push(RuleIssue {
                rule_id: CATALOG_ISSUE_ID.to_string(),
                reason,
            });
        }

        let mut index = HashMap::with_capacity(rules.len());
        for (position, rule) in rules.iter().enumerate() {
            let label = if rule.id.trim().is_empty() {
                issues.push(RuleIssue {
                    rule_id: format!("#{}", position),
                    reason: "empty rule id".to_string(),
                });
                format!("#{}", position)
            } else {
                rule.id.clone()
            };

            let taken = unparsed_ids.contains(&rule.id);
            if index.insert(rule.id.clone(), position).is_some() || taken {
                issues.push(RuleIssue {
                    rule_id: label.clone(),
                    reason: "duplicate rule id".to_string(),
                });
            }
            if !rule.base_weight.is_finite() {
                issues.push(RuleIssue {
                    rule_id: label.clone(),
                    reason: format!("base_weight is not finite ({})", rule.base_weight),
                });
            }
            for (area, effect) in &rule.effects {
                if !effect.is_finite() {
                    issues.push(RuleIssue {
                        rule_id: label.clone(),
                        reason: format!("effect on {} is not finite ({})", area, effect),
                    });
                }
            }
            for reason in rule.condition.problems(limits) {
                issues.push(RuleIssue {
                    rule_id: label.clone(),
                    reason,
                });
            }
        }

        if !issues.is_empty() {
            return Err(CatalogValidationError { issues });
        }

        Ok(Self {
            version,
            rules,
            strength,
            index,
        })
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Rules in catalog order.
    pub fn rules(&self) -> &[RuleDefinition] {
        &self.rules
    }

    pub fn rule(&self, id: &str) -> Option<&RuleDefinition> {
        self.index.get(id).map(|position| &self.rules[*position])
    }

    pub fn strength(&self) -> &StrengthModifiers {
        &self.strength
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Section separators: objects with no `id` whose keys all start with `_`.
fn is_comment_entry(entry: &Value) -> bool {
    match entry.as_object() {
        Some(map) => !map.contains_key("id") && map.keys().all(|key| key.starts_with('_')),
        None => false,
    }
}
