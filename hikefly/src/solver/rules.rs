//! Triangle scoring rules.

use serde::{Deserialize, Serialize};

/// Which triangle shape a rule scores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    /// Free triangle: any shape whose longest leg stays under 45 % of the
    /// total distance.
    Flat,
    /// FAI triangle: shortest leg at least 28 % of the total distance,
    /// rewarded with a higher multiplier.
    Fai,
}

/// Parameters of one triangle scoring rule.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScoringRule {
    pub kind: RuleKind,
    /// Shortest leg must be at least this fraction of total distance.
    pub min_leg_ratio: f64,
    /// Longest leg must be at most this fraction of total distance.
    pub max_leg_ratio: f64,
    /// Closing limit as a fraction of the triangle distance.
    pub closing_distance_relative: f64,
    /// Unconditional closing allowance in meters.
    pub closing_distance_free: f64,
    /// Fixed closing limit in meters.
    pub closing_distance_fixed: f64,
    /// Score multiplier applied after the penalty.
    pub multiplier: f64,
}

impl ScoringRule {
    /// The distance within which the flight's start and end points must
    /// approach a triangle vertex for the triangle to count.
    #[inline]
    pub fn closing_limit_m(&self, distance_m: f64) -> f64 {
        (self.closing_distance_relative * distance_m)
            .max(self.closing_distance_free)
            .max(self.closing_distance_fixed)
    }

    /// Whether three leg lengths satisfy this rule's ratio band.
    #[inline]
    pub fn legs_admissible(&self, legs: [f64; 3], total_m: f64) -> bool {
        if total_m <= 0.0 {
            return false;
        }
        let shortest = legs[0].min(legs[1]).min(legs[2]);
        let longest = legs[0].max(legs[1]).max(legs[2]);
        // Relative tolerance keeps exact-ratio triangles admissible
        let eps = total_m * 1e-9;
        shortest >= self.min_leg_ratio * total_m - eps
            && longest <= self.max_leg_ratio * total_m + eps
    }
}

/// Free-triangle rule.
pub const FLAT_TRIANGLE: ScoringRule = ScoringRule {
    kind: RuleKind::Flat,
    min_leg_ratio: 0.0,
    max_leg_ratio: 0.45,
    closing_distance_relative: 0.8,
    closing_distance_free: 0.0,
    closing_distance_fixed: 0.0,
    multiplier: 1.2,
};

/// FAI-triangle rule.
pub const FAI_TRIANGLE: ScoringRule = ScoringRule {
    kind: RuleKind::Fai,
    min_leg_ratio: 0.28,
    max_leg_ratio: 0.45,
    closing_distance_relative: 0.8,
    closing_distance_free: 0.0,
    closing_distance_fixed: 0.0,
    multiplier: 1.4,
};

/// The rules evaluated for every track, in evaluation order.
pub const ACTIVE_RULES: [ScoringRule; 2] = [FLAT_TRIANGLE, FAI_TRIANGLE];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equilateral_legs_satisfy_both_rules() {
        let legs = [10_000.0, 10_000.0, 10_000.0];
        assert!(FLAT_TRIANGLE.legs_admissible(legs, 30_000.0));
        assert!(FAI_TRIANGLE.legs_admissible(legs, 30_000.0));
    }

    #[test]
    fn test_elongated_triangle_fails_fai_but_passes_flat() {
        // Legs 40/40/20: shortest is 20 % of total
        let legs = [40_000.0, 40_000.0, 20_000.0];
        assert!(FLAT_TRIANGLE.legs_admissible(legs, 100_000.0));
        assert!(!FAI_TRIANGLE.legs_admissible(legs, 100_000.0));
    }

    #[test]
    fn test_collinear_legs_fail_both_rules() {
        // Out-and-back: one leg is half the total
        let legs = [10_000.0, 5_000.0, 5_000.0];
        assert!(!FLAT_TRIANGLE.legs_admissible(legs, 20_000.0));
        assert!(!FAI_TRIANGLE.legs_admissible(legs, 20_000.0));
    }

    #[test]
    fn test_zero_distance_is_never_admissible() {
        assert!(!FLAT_TRIANGLE.legs_admissible([0.0, 0.0, 0.0], 0.0));
    }

    #[test]
    fn test_closing_limit_is_relative_for_active_rules() {
        // With free and fixed allowances at zero the relative term wins
        assert_eq!(FLAT_TRIANGLE.closing_limit_m(30_000.0), 24_000.0);
        assert_eq!(FAI_TRIANGLE.closing_limit_m(0.0), 0.0);
    }

    #[test]
    fn test_fai_multiplier_discriminates() {
        assert!(FAI_TRIANGLE.multiplier > FLAT_TRIANGLE.multiplier);
    }
}
