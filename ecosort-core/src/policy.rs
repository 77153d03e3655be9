//! Configurable policies: points accrual rates and cancellation rules.
//!
//! Both knobs are deliberately data, not code: the source project never
//! documented who may cancel an assigned booking or how many points a waste
//! type is worth, so operators decide via configuration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{Role, WasteType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Which non-admin actor may cancel a booking that is already assigned.
pub enum AssignedCancelPolicy {
    /// Only the resident who created the booking.
    Resident,
    /// Only collectors.
    Collector,
    /// Either of the two.
    Either,
}

impl AssignedCancelPolicy {
    /// Whether the given role is covered by this policy.
    #[must_use]
    pub fn allows(self, role: Role) -> bool {
        match self {
            AssignedCancelPolicy::Resident => role == Role::Resident,
            AssignedCancelPolicy::Collector => role == Role::Collector,
            AssignedCancelPolicy::Either => matches!(role, Role::Resident | Role::Collector),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// Points awarded per kilogram, by waste type slug.
pub struct PointsPolicy {
    /// Per-slug overrides, e.g. `{"e_waste": 25.0}`.
    pub rates: HashMap<String, f64>,
    /// Rate applied when a waste type has no override.
    pub default_rate: f64,
}

impl Default for PointsPolicy {
    fn default() -> Self {
        // 1 kg = 10 points unless configured otherwise.
        Self {
            rates: HashMap::new(),
            default_rate: 10.0,
        }
    }
}

impl PointsPolicy {
    /// Points for a completed pickup of `weight_kg` of the given waste type,
    /// rounded to the nearest whole point and never negative.
    #[must_use]
    pub fn points_for(&self, waste_type: &WasteType, weight_kg: f64) -> i64 {
        let rate = self
            .rates
            .get(waste_type.as_str())
            .copied()
            .unwrap_or(self.default_rate);
        let points = (weight_kg * rate).round();
        if points.is_sign_negative() || !points.is_finite() {
            0
        } else {
            points as i64
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
/// All service-level policy knobs.
pub struct ServicePolicy {
    /// Accrual rates for completed pickups.
    pub points: PointsPolicy,
    /// Who may cancel an assigned booking.
    pub cancel_assigned: AssignedCancelPolicy,
}

impl Default for ServicePolicy {
    fn default() -> Self {
        Self {
            points: PointsPolicy::default(),
            cancel_assigned: AssignedCancelPolicy::Either,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_matches_legacy_formula() {
        let policy = PointsPolicy::default();
        // 3.5 kg at 10 points/kg
        assert_eq!(policy.points_for(&WasteType::Recyclable, 3.5), 35);
    }

    #[test]
    fn per_type_override_takes_precedence() {
        let mut policy = PointsPolicy::default();
        policy.rates.insert("e_waste".to_owned(), 25.0);
        assert_eq!(policy.points_for(&WasteType::EWaste, 2.0), 50);
        assert_eq!(policy.points_for(&WasteType::Recyclable, 2.0), 20);
    }

    #[test]
    fn negative_and_non_finite_weights_award_nothing() {
        let policy = PointsPolicy::default();
        assert_eq!(policy.points_for(&WasteType::Recyclable, -4.0), 0);
        assert_eq!(policy.points_for(&WasteType::Recyclable, f64::NAN), 0);
    }

    #[test]
    fn cancel_policy_covers_the_right_roles() {
        assert!(AssignedCancelPolicy::Either.allows(Role::Resident));
        assert!(AssignedCancelPolicy::Either.allows(Role::Collector));
        assert!(!AssignedCancelPolicy::Either.allows(Role::Admin));
        assert!(!AssignedCancelPolicy::Resident.allows(Role::Collector));
        assert!(!AssignedCancelPolicy::Collector.allows(Role::Resident));
    }
}
