//! Public configuration of a lift session: padding width, attribution window and reach rule.
//!
//! All values here are public and must be identical on both parties; the handshake compares
//! their [`LiftParams::fingerprint`] before any private value is shared.

use serde::{Deserialize, Serialize};

/// Thirty days in seconds.
pub const DEFAULT_WINDOW_LENGTH: i64 = 30 * 24 * 60 * 60;

/// How long a conversion may precede the opportunity and still be attributed, in seconds.
pub const DEFAULT_LEAD_TOLERANCE: i64 = 10;

/// The time interval around an opportunity in which a conversion is credited to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionWindow {
    /// Maximum seconds between opportunity and conversion, unbounded if `None`.
    pub length: Option<i64>,
    /// Seconds a conversion may happen before the opportunity (clock skew allowance).
    pub lead_tolerance: i64,
}

impl AttributionWindow {
    /// A window `o <= t <= o + length` without lead tolerance.
    pub fn new(length: i64) -> Self {
        Self {
            length: Some(length),
            lead_tolerance: 0,
        }
    }

    /// Sets the lead tolerance.
    pub fn with_lead_tolerance(mut self, lead_tolerance: i64) -> Self {
        self.lead_tolerance = lead_tolerance;
        self
    }

    /// The plaintext predicate evaluated securely by the input processor.
    pub fn contains(&self, opportunity: i64, conversion: i64) -> bool {
        opportunity > 0
            && opportunity <= conversion + self.lead_tolerance
            && self.length.is_none_or(|l| conversion <= opportunity + l)
    }
}

impl Default for AttributionWindow {
    fn default() -> Self {
        Self {
            length: Some(DEFAULT_WINDOW_LENGTH),
            lead_tolerance: DEFAULT_LEAD_TOLERANCE,
        }
    }
}

/// Which conversions count towards a row's purchase value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributionRule {
    /// Only conversions inside the window around an exposure.
    Window(AttributionWindow),
    /// Every conversion the partner reports, regardless of exposure.
    AllConversions,
}

impl Default for AttributionRule {
    fn default() -> Self {
        AttributionRule::Window(AttributionWindow::default())
    }
}

/// What makes a test-group user count as reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReachRule {
    /// The publisher recorded an exposure (non-zero opportunity timestamp).
    #[default]
    Exposure,
    /// The user has at least one attributed conversion.
    ValidConversion,
}

/// The public parameters of a lift session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LiftParams {
    /// Every conversion list is truncated or padded to exactly this many slots.
    pub num_conversions_per_user: usize,
    /// Which conversions are attributed.
    pub attribution: AttributionRule,
    /// Which test-group users count as reached.
    pub reach: ReachRule,
}

impl Default for LiftParams {
    fn default() -> Self {
        Self {
            num_conversions_per_user: 4,
            attribution: AttributionRule::default(),
            reach: ReachRule::default(),
        }
    }
}

impl LiftParams {
    /// Default parameters with the given padding width.
    pub fn new(num_conversions_per_user: usize) -> Self {
        Self {
            num_conversions_per_user,
            ..Default::default()
        }
    }

    /// Replaces the attribution rule.
    pub fn with_attribution(mut self, attribution: AttributionRule) -> Self {
        self.attribution = attribution;
        self
    }

    /// Replaces the reach rule.
    pub fn with_reach(mut self, reach: ReachRule) -> Self {
        self.reach = reach;
        self
    }

    /// A digest of all parameters, equal on both parties iff their parameters are equal.
    pub fn fingerprint(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(b"private-lift params v1");
        hasher.update(&(self.num_conversions_per_user as u64).to_le_bytes());
        match self.attribution {
            AttributionRule::Window(w) => {
                hasher.update(&[0]);
                match w.length {
                    Some(l) => hasher.update(&[1]).update(&l.to_le_bytes()),
                    None => hasher.update(&[0]),
                };
                hasher.update(&w.lead_tolerance.to_le_bytes());
            }
            AttributionRule::AllConversions => {
                hasher.update(&[1]);
            }
        }
        hasher.update(&[match self.reach {
            ReachRule::Exposure => 0,
            ReachRule::ValidConversion => 1,
        }]);
        *hasher.finalize().as_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_predicate() {
        let w = AttributionWindow::new(100).with_lead_tolerance(10);
        assert!(w.contains(1000, 1000));
        assert!(w.contains(1000, 991));
        assert!(!w.contains(1000, 989));
        assert!(w.contains(1000, 1100));
        assert!(!w.contains(1000, 1101));
        assert!(!w.contains(0, 50));

        let unbounded = AttributionWindow {
            length: None,
            lead_tolerance: 0,
        };
        assert!(unbounded.contains(1, i64::MAX / 2));
    }

    #[test]
    fn fingerprint_distinguishes_params() {
        let base = LiftParams::new(2);
        assert_eq!(base.fingerprint(), LiftParams::new(2).fingerprint());
        let others = [
            LiftParams::new(3),
            base.with_reach(ReachRule::ValidConversion),
            base.with_attribution(AttributionRule::AllConversions),
            base.with_attribution(AttributionRule::Window(AttributionWindow::new(5))),
            base.with_attribution(AttributionRule::Window(AttributionWindow {
                length: None,
                lead_tolerance: DEFAULT_LEAD_TOLERANCE,
            })),
        ];
        for other in others {
            assert_ne!(base.fingerprint(), other.fingerprint(), "{other:?}");
        }
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: LiftParams =
            serde_json::from_str(r#"{ "num_conversions_per_user": 2 }"#).unwrap();
        assert_eq!(params, LiftParams::new(2));

        let params: LiftParams = serde_json::from_str(
            r#"{ "attribution": "AllConversions", "reach": "ValidConversion" }"#,
        )
        .unwrap();
        assert_eq!(params.attribution, AttributionRule::AllConversions);
        assert_eq!(params.num_conversions_per_user, 4);
    }
}
