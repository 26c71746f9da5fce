//! Rule evaluation.
//!
//! A rule matches when its condition root is true. Its strength is the base
//! weight times one modifier per distinct body named by a contributing leaf:
//! a true leaf reached without passing through a `Not` and, inside an `Or`,
//! only through the first true branch.

use crate::chart::{
    aspected_houses, count_from, exaltation_sign, nth_from, AspectType, BodyFacts, DashaFacts,
    DashaLevel, Dignity, FactSet, Sign, KENDRAS, NATURAL_BENEFICS,
};
use crate::ephemeris::CelestialBody;
use crate::error::EvaluationInvariantError;
use crate::rules::catalog::{RuleCatalog, RuleDefinition, StrengthModifiers};
use crate::rules::condition::{ConditionNode, Reference};
use log::error;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// A fact that made a leaf true.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Fact {
    BodyInHouse {
        body: CelestialBody,
        house: u8,
    },
    BodyInSign {
        body: CelestialBody,
        sign: Sign,
    },
    Aspect {
        a: CelestialBody,
        b: CelestialBody,
        aspect: AspectType,
        orb: f64,
    },
    Retrograde {
        body: CelestialBody,
    },
    Combust {
        body: CelestialBody,
    },
    Dignity {
        body: CelestialBody,
        dignity: Dignity,
    },
    HouseLordIn {
        house: u8,
        lord: CelestialBody,
        placed_in: u8,
    },
    AspectsHouse {
        body: CelestialBody,
        from_house: u8,
        house: u8,
    },
    SameHouse {
        bodies: Vec<CelestialBody>,
        house: u8,
    },
    DashaLord {
        level: DashaLevel,
        lord: CelestialBody,
    },
    DashaLordOwns {
        level: DashaLevel,
        lord: CelestialBody,
        house: u8,
    },
    DashaLordDignity {
        level: DashaLevel,
        lord: CelestialBody,
        dignity: Dignity,
    },
    /// `a` precedes `b` in canonical order.
    MutualExchange {
        a: CelestialBody,
        b: CelestialBody,
    },
    KalaSarpa {
        rahu_house: u8,
        ketu_house: u8,
    },
    NeechaBhanga {
        body: CelestialBody,
        canceller: CelestialBody,
        canceller_house: u8,
    },
    FromMoon {
        body: CelestialBody,
        nth: u8,
    },
    /// `benefics[i]` occupies the `houses[i]`th house from `reference`.
    BeneficsIn {
        reference: Reference,
        houses: Vec<u8>,
        benefics: Vec<CelestialBody>,
    },
}

impl Fact {
    /// Bodies whose condition scales the strength of a rule using this fact.
    pub fn bodies(&self) -> Vec<CelestialBody> {
        match self {
            Fact::BodyInHouse { body, .. }
            | Fact::BodyInSign { body, .. }
            | Fact::Retrograde { body }
            | Fact::Combust { body }
            | Fact::Dignity { body, .. }
            | Fact::AspectsHouse { body, .. } => vec![*body],
            Fact::Aspect { a, b, .. } | Fact::MutualExchange { a, b } => vec![*a, *b],
            Fact::HouseLordIn { lord, .. }
            | Fact::DashaLord { lord, .. }
            | Fact::DashaLordOwns { lord, .. }
            | Fact::DashaLordDignity { lord, .. } => vec![*lord],
            Fact::SameHouse { bodies, .. } | Fact::BeneficsIn { benefics: bodies, .. } => {
                bodies.clone()
            }
            Fact::KalaSarpa { .. } => vec![CelestialBody::Rahu, CelestialBody::Ketu],
            Fact::NeechaBhanga { body, canceller, .. } => vec![*body, *canceller],
            Fact::FromMoon { body, .. } => vec![*body],
        }
    }
}

/// One matched rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub rule_id: String,
    pub name: String,
    pub category: String,
    pub priority: i32,
    pub computed_strength: f64,
    pub contributing_facts: Vec<Fact>,
}

/// (priority asc, strength desc, id asc).
pub fn result_order(a: &MatchResult, b: &MatchResult) -> Ordering {
    a.priority
        .cmp(&b.priority)
        .then_with(|| b.computed_strength.total_cmp(&a.computed_strength))
        .then_with(|| a.rule_id.cmp(&b.rule_id))
}

/// Stateless evaluator of a catalog against a fact set.
pub struct RuleEngine;

impl RuleEngine {
    pub fn new() -> Self {
        Self
    }

    /// Every matching rule, in result order.
    pub fn evaluate(
        &self,
        facts: &FactSet,
        catalog: &RuleCatalog,
    ) -> Result<Vec<MatchResult>, EvaluationInvariantError> {
        let mut results = Vec::new();
        for rule in catalog.rules() {
            match self.evaluate_rule(facts, rule, catalog.strength()) {
                Ok(Some(result)) => results.push(result),
                Ok(None) => {}
                Err(err) => {
                    error!(
                        "Rule evaluation aborted under catalog {}: {}",
                        catalog.version(),
                        err
                    );
                    return Err(err);
                }
            }
        }
        results.sort_by(result_order);
        Ok(results)
    }

    /// Evaluate a single rule; `None` when it does not match.
    pub fn evaluate_rule(
        &self,
        facts: &FactSet,
        rule: &RuleDefinition,
        strength: &StrengthModifiers,
    ) -> Result<Option<MatchResult>, EvaluationInvariantError> {
        let evaluator = Evaluator {
            facts,
            rule_id: &rule.id,
        };
        let mut contributing = Vec::new();
        if !evaluator.eval(&rule.condition, &mut contributing)? {
            return Ok(None);
        }

        let mut unique: Vec<Fact> = Vec::with_capacity(contributing.len());
        for fact in contributing {
            if !unique.contains(&fact) {
                unique.push(fact);
            }
        }

        let factor = contribution_factor(facts, &unique, strength, &rule.id)?;
        Ok(Some(MatchResult {
            rule_id: rule.id.clone(),
            name: rule.name.clone(),
            category: rule.category.clone(),
            priority: rule.priority,
            computed_strength: rule.base_weight * factor,
            contributing_facts: unique,
        }))
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn contribution_factor(
    facts: &FactSet,
    contributing: &[Fact],
    strength: &StrengthModifiers,
    rule_id: &str,
) -> Result<f64, EvaluationInvariantError> {
    let bodies: BTreeSet<CelestialBody> = contributing.iter().flat_map(Fact::bodies).collect();
    let mut factor = 1.0;
    for body in bodies {
        let state = facts.body(body).ok_or_else(|| EvaluationInvariantError::MissingBody {
            rule_id: rule_id.to_string(),
            body,
        })?;
        factor *= strength.dignity_multiplier(state.dignity);
        if state.combust {
            factor *= strength.combust_penalty;
        }
    }
    Ok(factor)
}

struct Evaluator<'a> {
    facts: &'a FactSet,
    rule_id: &'a str,
}

impl<'a> Evaluator<'a> {
    fn body(&self, body: CelestialBody) -> Result<&'a BodyFacts, EvaluationInvariantError> {
        self.facts
            .body(body)
            .ok_or_else(|| EvaluationInvariantError::MissingBody {
                rule_id: self.rule_id.to_string(),
                body,
            })
    }

    fn house_lord(&self, house: u8) -> Result<CelestialBody, EvaluationInvariantError> {
        self.facts
            .house_lord(house)
            .ok_or_else(|| EvaluationInvariantError::MissingHouseLord {
                rule_id: self.rule_id.to_string(),
                house,
            })
    }

    /// Dasha lords are derived from the Moon, so a chart without one has none.
    fn dasha(&self) -> Result<DashaFacts, EvaluationInvariantError> {
        self.facts
            .dasha()
            .ok_or_else(|| EvaluationInvariantError::MissingBody {
                rule_id: self.rule_id.to_string(),
                body: CelestialBody::Moon,
            })
    }

    /// `bodies`, or every configured body other than `except` when empty.
    fn candidates(
        &self,
        bodies: &[CelestialBody],
        except: Option<CelestialBody>,
    ) -> Vec<CelestialBody> {
        if bodies.is_empty() {
            self.facts
                .bodies()
                .map(|(body, _)| body)
                .filter(|body| Some(*body) != except)
                .collect()
        } else {
            bodies.to_vec()
        }
    }

    /// Evaluate `node`, appending contributing facts only when it is true.
    fn eval(
        &self,
        node: &ConditionNode,
        out: &mut Vec<Fact>,
    ) -> Result<bool, EvaluationInvariantError> {
        match node {
            ConditionNode::And { children } => {
                let mut scratch = Vec::new();
                for child in children {
                    if !self.eval(child, &mut scratch)? {
                        return Ok(false);
                    }
                }
                out.extend(scratch);
                Ok(true)
            }
            ConditionNode::Or { children } => {
                for child in children {
                    let mut scratch = Vec::new();
                    if self.eval(child, &mut scratch)? {
                        out.extend(scratch);
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            ConditionNode::Not { child } => {
                let mut discarded = Vec::new();
                Ok(!self.eval(child, &mut discarded)?)
            }
            leaf => match self.eval_leaf(leaf)? {
                Some(fact) => {
                    out.push(fact);
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    fn eval_leaf(&self, node: &ConditionNode) -> Result<Option<Fact>, EvaluationInvariantError> {
        let fact = match node {
            ConditionNode::BodyInHouse { body, houses } => {
                let state = self.body(*body)?;
                houses.contains(&state.house).then(|| Fact::BodyInHouse {
                    body: *body,
                    house: state.house,
                })
            }
            ConditionNode::BodyInSign { body, signs } => {
                let state = self.body(*body)?;
                signs.contains(&state.sign).then(|| Fact::BodyInSign {
                    body: *body,
                    sign: state.sign,
                })
            }
            ConditionNode::Aspect { a, b, aspects } => {
                self.body(*a)?;
                self.body(*b)?;
                self.facts
                    .aspect_between(*a, *b)
                    .filter(|edge| aspects.contains(&edge.aspect))
                    .map(|edge| Fact::Aspect {
                        a: edge.a,
                        b: edge.b,
                        aspect: edge.aspect,
                        orb: edge.orb,
                    })
            }
            ConditionNode::Retrograde { body } => self
                .body(*body)?
                .retrograde
                .then(|| Fact::Retrograde { body: *body }),
            ConditionNode::Combust { body } => self
                .body(*body)?
                .combust
                .then(|| Fact::Combust { body: *body }),
            ConditionNode::Dignity { body, dignities } => {
                let state = self.body(*body)?;
                dignities.contains(&state.dignity).then(|| Fact::Dignity {
                    body: *body,
                    dignity: state.dignity,
                })
            }
            ConditionNode::HouseLordIn { house, houses } => {
                let lord = self.house_lord(*house)?;
                let placed_in = self.body(lord)?.house;
                houses.contains(&placed_in).then(|| Fact::HouseLordIn {
                    house: *house,
                    lord,
                    placed_in,
                })
            }
            ConditionNode::AspectsHouse { body, houses } => {
                let from_house = self.body(*body)?.house;
                aspected_houses(*body, from_house)
                    .into_iter()
                    .find(|target| houses.contains(target))
                    .map(|house| Fact::AspectsHouse {
                        body: *body,
                        from_house,
                        house,
                    })
            }
            ConditionNode::SameHouse { bodies } => {
                let mut house = None;
                let mut together = true;
                for body in bodies {
                    let current = self.body(*body)?.house;
                    match house {
                        None => house = Some(current),
                        Some(first) if first != current => together = false,
                        Some(_) => {}
                    }
                }
                match house {
                    Some(house) if together => Some(Fact::SameHouse {
                        bodies: bodies.clone(),
                        house,
                    }),
                    _ => None,
                }
            }
            ConditionNode::DashaLord { level, bodies } => {
                let lord = self.dasha()?.lord(*level);
                bodies.contains(&lord).then(|| Fact::DashaLord {
                    level: *level,
                    lord,
                })
            }
            ConditionNode::DashaLordOwns { level, houses } => {
                let lord = self.dasha()?.lord(*level);
                let mut owned = None;
                for house in houses {
                    if self.house_lord(*house)? == lord {
                        owned = Some(*house);
                        break;
                    }
                }
                owned.map(|house| Fact::DashaLordOwns {
                    level: *level,
                    lord,
                    house,
                })
            }
            ConditionNode::DashaLordDignity { level, dignities } => {
                let lord = self.dasha()?.lord(*level);
                let dignity = self.body(lord)?.dignity;
                dignities.contains(&dignity).then(|| Fact::DashaLordDignity {
                    level: *level,
                    lord,
                    dignity,
                })
            }
            ConditionNode::MutualExchange { bodies } => self.mutual_exchange(bodies)?,
            ConditionNode::KalaSarpa => self.kala_sarpa()?,
            ConditionNode::NeechaBhanga { body } => {
                let candidates = match body {
                    Some(body) => vec![*body],
                    None => self.candidates(&[], None),
                };
                let mut cancelled = None;
                for candidate in candidates {
                    cancelled = self.neecha_bhanga(candidate)?;
                    if cancelled.is_some() {
                        break;
                    }
                }
                cancelled
            }
            ConditionNode::FromMoon { houses, bodies } => {
                let moon_house = self.body(CelestialBody::Moon)?.house;
                let mut found = None;
                for body in self.candidates(bodies, Some(CelestialBody::Moon)) {
                    let nth = count_from(moon_house, self.body(body)?.house);
                    if houses.contains(&nth) {
                        found = Some(Fact::FromMoon { body, nth });
                        break;
                    }
                }
                found
            }
            ConditionNode::BeneficsIn { reference, houses } => {
                self.benefics_in(*reference, houses)?
            }
            ConditionNode::And { .. } | ConditionNode::Or { .. } | ConditionNode::Not { .. } => {
                None
            }
        };
        Ok(fact)
    }

    fn mutual_exchange(
        &self,
        bodies: &[CelestialBody],
    ) -> Result<Option<Fact>, EvaluationInvariantError> {
        let candidates = self.candidates(bodies, None);
        for (i, a) in candidates.iter().enumerate() {
            let a_sign = self.body(*a)?.sign;
            for b in &candidates[i + 1..] {
                let b_sign = self.body(*b)?.sign;
                if a_sign.lord() == *b && b_sign.lord() == *a {
                    let (a, b) = if a <= b { (*a, *b) } else { (*b, *a) };
                    return Ok(Some(Fact::MutualExchange { a, b }));
                }
            }
        }
        Ok(None)
    }

    /// Houses from Rahu's onward up to, but excluding, Ketu's form one side of
    /// the axis. Every planet must fall inside that arc or wholly outside it,
    /// Ketu's own house included as outside only when empty of planets.
    fn kala_sarpa(&self) -> Result<Option<Fact>, EvaluationInvariantError> {
        let rahu_house = self.body(CelestialBody::Rahu)?.house;
        let ketu_house = self.body(CelestialBody::Ketu)?.house;
        if rahu_house == ketu_house {
            return Ok(None);
        }
        let arc: Vec<u8> = (1..=12u8)
            .map(|nth| nth_from(rahu_house, nth))
            .take_while(|house| *house != ketu_house)
            .collect();

        let mut planet_houses = Vec::new();
        for body in CelestialBody::ALL.iter().filter(|body| !body.is_node()) {
            planet_houses.push(self.body(*body)?.house);
        }
        let within = planet_houses.iter().all(|house| arc.contains(house));
        let beyond = planet_houses
            .iter()
            .all(|house| !arc.contains(house) && *house != ketu_house);
        Ok((within || beyond).then_some(Fact::KalaSarpa {
            rahu_house,
            ketu_house,
        }))
    }

    fn neecha_bhanga(&self, body: CelestialBody) -> Result<Option<Fact>, EvaluationInvariantError> {
        let state = self.body(body)?;
        if state.dignity != Dignity::Debilitated {
            return Ok(None);
        }
        let dispositor = state.sign.lord();
        let dispositor_house = self.body(dispositor)?.house;
        if KENDRAS.contains(&dispositor_house) {
            return Ok(Some(Fact::NeechaBhanga {
                body,
                canceller: dispositor,
                canceller_house: dispositor_house,
            }));
        }
        Ok(self
            .facts
            .bodies()
            .find(|(other, facts)| {
                exaltation_sign(*other) == state.sign && KENDRAS.contains(&facts.house)
            })
            .map(|(other, facts)| Fact::NeechaBhanga {
                body,
                canceller: other,
                canceller_house: facts.house,
            }))
    }

    fn benefics_in(
        &self,
        reference: Reference,
        houses: &[u8],
    ) -> Result<Option<Fact>, EvaluationInvariantError> {
        let start = match reference {
            Reference::Lagna => 1,
            Reference::Moon => self.body(CelestialBody::Moon)?.house,
        };
        let mut benefics = Vec::with_capacity(houses.len());
        for nth in houses {
            let target = nth_from(start, *nth);
            let mut occupant = None;
            for benefic in NATURAL_BENEFICS {
                if self.body(benefic)?.house == target {
                    occupant = Some(benefic);
                    break;
                }
            }
            match occupant {
                Some(benefic) => benefics.push(benefic),
                None => return Ok(None),
            }
        }
        Ok(Some(Fact::BeneficsIn {
            reference,
            houses: houses.to_vec(),
            benefics,
        }))
    }
}
