use crate::chart::types::{angular_difference, AspectFact, AspectType, ChartConfig};
use crate::ephemeris::CelestialBody;
use std::cmp::Ordering;

/// Aspect calculator
pub struct AspectCalculator;

impl AspectCalculator {
    /// Create a new aspect calculator
    pub fn new() -> Self {
        Self
    }

    /// Tightest aspect between two longitudes, if any falls within its orb.
    ///
    /// `orb_for` gives the allowed orb per aspect type. Returns the aspect and
    /// its deviation from exact. Equal deviations resolve to the aspect
    /// declared first in [`AspectType::ALL`].
    pub fn calculate_aspect<F>(&self, lon1: f64, lon2: f64, orb_for: F) -> Option<(AspectType, f64)>
    where
        F: Fn(AspectType) -> f64,
    {
        let separation = angular_difference(lon1, lon2);

        let mut best: Option<(AspectType, f64)> = None;
        for aspect in AspectType::ALL {
            let deviation = (separation - aspect.angle()).abs();
            if deviation > orb_for(aspect) {
                continue;
            }
            best = match best {
                Some((_, current)) if deviation.total_cmp(&current) != Ordering::Less => best,
                _ => Some((aspect, deviation)),
            };
        }
        best
    }

    /// Aspect graph over every unordered pair of positioned bodies.
    ///
    /// `positions` must be in canonical body order; each recorded fact keeps
    /// the earlier body as `a`.
    pub fn compute_aspect_graph(
        &self,
        positions: &[(CelestialBody, f64)],
        config: &ChartConfig,
    ) -> Vec<AspectFact> {
        let mut facts = Vec::new();
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                let (a, lon_a) = positions[i];
                let (b, lon_b) = positions[j];
                if let Some((aspect, orb)) =
                    self.calculate_aspect(lon_a, lon_b, |kind| config.pair_orb(a, b, kind))
                {
                    facts.push(AspectFact { a, b, aspect, orb });
                }
            }
        }
        facts
    }
}

impl Default for AspectCalculator {
    fn default() -> Self {
        Self::new()
    }
}
