use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// How far (in percentage points) a share may drift from its target before
/// a rebalance is flagged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdPolicy {
    /// Same threshold for every target.
    Fixed { threshold: Decimal },
    /// 3 points for small targets (< 10%), otherwise 10% of the target.
    Sliding,
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        ThresholdPolicy::Fixed {
            threshold: dec!(2.5),
        }
    }
}

impl ThresholdPolicy {
    pub fn max_diff(&self, wanted_share: Decimal) -> Decimal {
        match self {
            ThresholdPolicy::Fixed { threshold } => *threshold,
            ThresholdPolicy::Sliding => {
                if wanted_share < dec!(10) {
                    dec!(3)
                } else {
                    wanted_share * dec!(0.10)
                }
            }
        }
    }

    /// Rebalance exactly when the drift reaches the threshold.
    pub fn should_rebalance(&self, difference: Decimal, wanted_share: Decimal) -> bool {
        difference.abs() >= self.max_diff(wanted_share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_threshold_default() {
        let policy = ThresholdPolicy::default();
        assert_eq!(policy.max_diff(dec!(80)), dec!(2.5));
        assert!(policy.should_rebalance(dec!(-2.5), dec!(80)));
        assert!(policy.should_rebalance(dec!(2.5), dec!(1)));
        assert!(!policy.should_rebalance(dec!(2.49), dec!(80)));
    }

    #[test]
    fn test_sliding_threshold() {
        let policy = ThresholdPolicy::Sliding;
        assert_eq!(policy.max_diff(dec!(8)), dec!(3));
        assert_eq!(policy.max_diff(dec!(9.99)), dec!(3));
        assert_eq!(policy.max_diff(dec!(10)), dec!(1));
        assert_eq!(policy.max_diff(dec!(40)), dec!(4));
    }

    #[test]
    fn test_sliding_boundary_is_inclusive() {
        let policy = ThresholdPolicy::Sliding;
        assert!(policy.should_rebalance(dec!(4), dec!(40)));
        assert!(policy.should_rebalance(dec!(-3), dec!(5)));
        assert!(!policy.should_rebalance(dec!(2), dec!(8)));
    }
}
