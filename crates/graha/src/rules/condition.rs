use crate::chart::{AspectType, DashaLevel, Dignity, Sign, NATURAL_BENEFICS};
use crate::ephemeris::CelestialBody;
use serde::{Deserialize, Serialize};

/// Condition tree of a rule.
///
/// Leaves test one fact of a [`crate::chart::FactSet`]; combinators compose
/// them. The tree is owned, so it is acyclic by construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConditionNode {
    BodyInHouse {
        body: CelestialBody,
        houses: Vec<u8>,
    },
    BodyInSign {
        body: CelestialBody,
        signs: Vec<Sign>,
    },
    Aspect {
        a: CelestialBody,
        b: CelestialBody,
        aspects: Vec<AspectType>,
    },
    Retrograde {
        body: CelestialBody,
    },
    Combust {
        body: CelestialBody,
    },
    Dignity {
        body: CelestialBody,
        dignities: Vec<Dignity>,
    },
    /// Lord of `house` placed in one of `houses`.
    HouseLordIn {
        house: u8,
        houses: Vec<u8>,
    },
    /// `body` casts its full graha drishti on one of `houses`.
    AspectsHouse {
        body: CelestialBody,
        houses: Vec<u8>,
    },
    /// All `bodies` occupy a single house.
    SameHouse {
        bodies: Vec<CelestialBody>,
    },
    /// The running dasha lord is one of `bodies`.
    DashaLord {
        #[serde(default)]
        level: DashaLevel,
        bodies: Vec<CelestialBody>,
    },
    /// The running dasha lord rules one of `houses`.
    DashaLordOwns {
        #[serde(default)]
        level: DashaLevel,
        houses: Vec<u8>,
    },
    DashaLordDignity {
        #[serde(default)]
        level: DashaLevel,
        dignities: Vec<Dignity>,
    },
    /// Two bodies each occupy a sign ruled by the other (parivartana).
    /// An empty `bodies` matches any pair; otherwise it names the pair.
    MutualExchange {
        #[serde(default)]
        bodies: Vec<CelestialBody>,
    },
    /// Every planet on one side of the Rahu-Ketu axis.
    KalaSarpa,
    /// A debilitated body whose fall is cancelled: the lord of its sign, or
    /// a body exalted there, occupies a kendra. Any debilitated body when
    /// `body` is absent.
    NeechaBhanga {
        #[serde(default)]
        body: Option<CelestialBody>,
    },
    /// A body other than the Moon sits in one of `houses` counted from the
    /// Moon. Restricted to `bodies` when given.
    FromMoon {
        houses: Vec<u8>,
        #[serde(default)]
        bodies: Vec<CelestialBody>,
    },
    /// Every one of `houses`, counted from `reference`, holds a natural
    /// benefic.
    BeneficsIn {
        #[serde(default)]
        reference: Reference,
        houses: Vec<u8>,
    },
    And {
        children: Vec<ConditionNode>,
    },
    Or {
        children: Vec<ConditionNode>,
    },
    Not {
        child: Box<ConditionNode>,
    },
}

/// House that relative counts start from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    #[default]
    Lagna,
    Moon,
}

/// Bounds a catalog is validated against.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogLimits {
    pub max_depth: usize,
    /// Bodies the chart configuration guarantees in every FactSet.
    pub bodies: Vec<CelestialBody>,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            max_depth: 16,
            bodies: CelestialBody::ALL.to_vec(),
        }
    }
}

const SIGN_LORDS: [CelestialBody; 7] = [
    CelestialBody::Sun,
    CelestialBody::Moon,
    CelestialBody::Mars,
    CelestialBody::Mercury,
    CelestialBody::Jupiter,
    CelestialBody::Venus,
    CelestialBody::Saturn,
];

impl ConditionNode {
    /// Height of the tree; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            ConditionNode::And { children } | ConditionNode::Or { children } => {
                1 + children.iter().map(ConditionNode::depth).max().unwrap_or(0)
            }
            ConditionNode::Not { child } => 1 + child.depth(),
            _ => 1,
        }
    }

    /// Structural problems in this tree, described for a catalog report.
    pub fn problems(&self, limits: &CatalogLimits) -> Vec<String> {
        let mut problems = Vec::new();
        let depth = self.depth();
        if depth > limits.max_depth {
            problems.push(format!(
                "condition depth {} exceeds maximum {}",
                depth, limits.max_depth
            ));
        }
        self.collect_problems(limits, &mut problems);
        problems
    }

    fn collect_problems(&self, limits: &CatalogLimits, problems: &mut Vec<String>) {
        let require_body = |body: &CelestialBody, problems: &mut Vec<String>| {
            if !limits.bodies.contains(body) {
                problems.push(format!("{} is not a configured body", body));
            }
        };

        match self {
            ConditionNode::BodyInHouse { body, houses }
            | ConditionNode::AspectsHouse { body, houses } => {
                require_body(body, problems);
                check_houses(houses, problems);
            }
            ConditionNode::BodyInSign { body, signs } => {
                require_body(body, problems);
                if signs.is_empty() {
                    problems.push(format!("empty sign set for {}", body));
                }
            }
            ConditionNode::Aspect { a, b, aspects } => {
                require_body(a, problems);
                require_body(b, problems);
                if a == b {
                    problems.push(format!("aspect between {} and itself", a));
                }
                if aspects.is_empty() {
                    problems.push(format!("empty aspect set for {}-{}", a, b));
                }
            }
            ConditionNode::Retrograde { body } | ConditionNode::Combust { body } => {
                require_body(body, problems);
            }
            ConditionNode::Dignity { body, dignities } => {
                require_body(body, problems);
                if dignities.is_empty() {
                    problems.push(format!("empty dignity set for {}", body));
                }
            }
            ConditionNode::HouseLordIn { house, houses } => {
                if !(1..=12).contains(house) {
                    problems.push(format!("house {} out of range 1-12", house));
                }
                check_houses(houses, problems);
                require_configured(limits, &SIGN_LORDS, "house lord", problems);
            }
            ConditionNode::SameHouse { bodies } => {
                if bodies.len() < 2 {
                    problems.push("same_house needs at least two bodies".to_string());
                }
                for (i, body) in bodies.iter().enumerate() {
                    require_body(body, problems);
                    if bodies[..i].contains(body) {
                        problems.push(format!("{} listed twice in same_house", body));
                    }
                }
            }
            ConditionNode::DashaLord { bodies, .. } => {
                require_configured(limits, &CelestialBody::ALL, "dasha", problems);
                if bodies.is_empty() {
                    problems.push("empty body set for dasha lord".to_string());
                }
            }
            ConditionNode::DashaLordOwns { houses, .. } => {
                require_configured(limits, &CelestialBody::ALL, "dasha", problems);
                check_houses(houses, problems);
            }
            ConditionNode::DashaLordDignity { dignities, .. } => {
                require_configured(limits, &CelestialBody::ALL, "dasha", problems);
                if dignities.is_empty() {
                    problems.push("empty dignity set for dasha lord".to_string());
                }
            }
            ConditionNode::MutualExchange { bodies } => {
                match bodies.as_slice() {
                    [] => {}
                    [a, b] => {
                        if a == b {
                            problems.push(format!("exchange between {} and itself", a));
                        }
                        for body in [a, b] {
                            require_body(body, problems);
                            if body.is_node() {
                                problems.push(format!("{} rules no sign to exchange", body));
                            }
                        }
                    }
                    _ => problems.push("mutual_exchange names zero or two bodies".to_string()),
                }
            }
            ConditionNode::KalaSarpa => {
                require_configured(limits, &CelestialBody::ALL, "kala sarpa", problems);
            }
            ConditionNode::NeechaBhanga { body } => {
                if let Some(body) = body {
                    require_body(body, problems);
                }
                require_configured(limits, &SIGN_LORDS, "neecha bhanga", problems);
            }
            ConditionNode::FromMoon { houses, bodies } => {
                require_configured(limits, &[CelestialBody::Moon], "from moon", problems);
                check_houses(houses, problems);
                for body in bodies {
                    require_body(body, problems);
                    if *body == CelestialBody::Moon {
                        problems.push("the Moon is not counted from itself".to_string());
                    }
                }
            }
            ConditionNode::BeneficsIn { reference, houses } => {
                check_houses(houses, problems);
                require_configured(limits, &NATURAL_BENEFICS, "benefics", problems);
                if *reference == Reference::Moon {
                    require_configured(limits, &[CelestialBody::Moon], "benefics", problems);
                }
            }
            ConditionNode::And { children } | ConditionNode::Or { children } => {
                if children.is_empty() {
                    problems.push("combinator without children".to_string());
                }
                for child in children {
                    child.collect_problems(limits, problems);
                }
            }
            ConditionNode::Not { child } => child.collect_problems(limits, problems),
        }
    }
}

fn require_configured(
    limits: &CatalogLimits,
    bodies: &[CelestialBody],
    test: &str,
    problems: &mut Vec<String>,
) {
    for body in bodies {
        if !limits.bodies.contains(body) {
            problems.push(format!(
                "{} test needs {}, which is not a configured body",
                test, body
            ));
        }
    }
}

fn check_houses(houses: &[u8], problems: &mut Vec<String>) {
    if houses.is_empty() {
        problems.push("empty house set".to_string());
    }
    for house in houses {
        if !(1..=12).contains(house) {
            problems.push(format!("house {} out of range 1-12", house));
        }
    }
}
