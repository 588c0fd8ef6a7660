use serde::{Deserialize, Serialize};

/// Display classification of a calibrated angle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleZone {
    Idle,
    Active,
    Danger,
}

impl AngleZone {
    /// Classify against the configured thresholds
    ///
    /// Non-finite angles are `Idle`.
    pub fn classify(angle: f64, wheelie_threshold: f64, danger_threshold: f64) -> Self {
        if !angle.is_finite() {
            AngleZone::Idle
        } else if angle >= danger_threshold {
            AngleZone::Danger
        } else if angle >= wheelie_threshold {
            AngleZone::Active
        } else {
            AngleZone::Idle
        }
    }

    /// Status-line text for the zone
    pub fn status_text(&self) -> &'static str {
        match self {
            AngleZone::Idle => "Ready",
            AngleZone::Active => "WHEELIE!",
            AngleZone::Danger => "WARNING! ANGLE TOO HIGH!",
        }
    }
}

/// Gauge fill-percentage strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GaugeCurve {
    /// `angle / full_scale`, so the default 100° maps degrees straight to percent
    Linear { full_scale: f64 },
    /// `(angle / full_scale) ^ exponent`; exponents below 1 fill faster near zero
    Eased { full_scale: f64, exponent: f64 },
}

impl Default for GaugeCurve {
    fn default() -> Self {
        GaugeCurve::Linear { full_scale: 100.0 }
    }
}

impl GaugeCurve {
    /// Fill percentage in `[0, 100]`
    pub fn fill_percent(&self, angle: f64) -> f64 {
        if !angle.is_finite() || angle <= 0.0 {
            return 0.0;
        }

        let ratio = match *self {
            GaugeCurve::Linear { full_scale } => ratio(angle, full_scale),
            GaugeCurve::Eased {
                full_scale,
                exponent,
            } => ratio(angle, full_scale).powf(exponent),
        };

        if ratio.is_finite() {
            (ratio * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    }
}

fn ratio(angle: f64, full_scale: f64) -> f64 {
    if full_scale <= 0.0 {
        return 1.0;
    }
    (angle / full_scale).min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_zones() {
        assert_eq!(AngleZone::classify(5.0, 20.0, 45.0), AngleZone::Idle);
        assert_eq!(AngleZone::classify(20.0, 20.0, 45.0), AngleZone::Active);
        assert_eq!(AngleZone::classify(44.9, 20.0, 45.0), AngleZone::Active);
        assert_eq!(AngleZone::classify(45.0, 20.0, 45.0), AngleZone::Danger);
        assert_eq!(AngleZone::classify(f64::NAN, 20.0, 45.0), AngleZone::Idle);
    }

    #[test]
    fn test_status_text() {
        assert_eq!(AngleZone::Active.status_text(), "WHEELIE!");
        assert!(AngleZone::Danger.status_text().contains("WARNING"));
    }

    #[test]
    fn test_linear_gauge_matches_degrees() {
        let curve = GaugeCurve::default();
        assert_eq!(curve.fill_percent(0.0), 0.0);
        assert_eq!(curve.fill_percent(37.0), 37.0);
        assert_eq!(curve.fill_percent(140.0), 100.0);
        assert_eq!(curve.fill_percent(f64::NAN), 0.0);
    }

    #[test]
    fn test_eased_gauge_fills_faster_early() {
        let curve = GaugeCurve::Eased {
            full_scale: 60.0,
            exponent: 0.5,
        };
        let linear = GaugeCurve::Linear { full_scale: 60.0 };
        assert!(curve.fill_percent(15.0) > linear.fill_percent(15.0));
        assert!((curve.fill_percent(15.0) - 50.0).abs() < 1e-9);
        assert_eq!(curve.fill_percent(60.0), 100.0);
        assert_eq!(curve.fill_percent(90.0), 100.0);
    }

    #[test]
    fn test_gauge_curve_json() {
        let json = r#"{ "kind": "eased", "full_scale": 50.0, "exponent": 2.0 }"#;
        let curve: GaugeCurve = serde_json::from_str(json).unwrap();
        assert_eq!(
            curve,
            GaugeCurve::Eased {
                full_scale: 50.0,
                exponent: 2.0
            }
        );
        assert_eq!(curve.fill_percent(25.0), 25.0);
    }
}
