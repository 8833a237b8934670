//! Diversification scoring and rebalancing advice.

use super::optimization_model::RiskTolerance;

const CONCENTRATION_THRESHOLD: f64 = 0.4;
const SMALL_POSITION_THRESHOLD: f64 = 0.02;

/// Normalized inverse Herfindahl index in `[0, 1]`.
///
/// 1.0 for equal weights, 0.0 when everything sits in one position. A
/// single-asset portfolio scores 0.0.
pub fn diversification_score(weights: &[f64]) -> f64 {
    let n = weights.len();
    if n <= 1 {
        return 0.0;
    }
    let hhi: f64 = weights.iter().map(|w| w * w).sum();
    let score = (1.0 - hhi) / (1.0 - 1.0 / n as f64);
    if score.is_finite() {
        score.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Human-readable advice, most urgent first.
pub fn rebalancing_suggestions(weights: &[f64], risk_tolerance: RiskTolerance) -> Vec<String> {
    let mut suggestions = Vec::new();

    let largest = weights.iter().copied().fold(0.0_f64, f64::max);
    if largest > CONCENTRATION_THRESHOLD {
        suggestions.push(
            "Consider reducing concentration in top holding to improve diversification"
                .to_string(),
        );
    }

    let smallest = weights
        .iter()
        .copied()
        .filter(|w| *w > 0.0)
        .fold(f64::INFINITY, f64::min);
    if smallest < SMALL_POSITION_THRESHOLD {
        suggestions.push(
            "Consider eliminating positions below 2% to reduce transaction costs".to_string(),
        );
    }

    let cadence = match risk_tolerance {
        RiskTolerance::Conservative => "Consider monthly rebalancing to maintain risk targets",
        RiskTolerance::Aggressive => {
            "Quarterly rebalancing may be sufficient for growth-focused portfolio"
        }
        RiskTolerance::Moderate => {
            "Rebalance quarterly or when allocations drift more than 5% from targets"
        }
    };
    suggestions.push(cadence.to_string());

    suggestions
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_weights_score_one() {
        assert!((diversification_score(&[0.25; 4]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_concentrated_weights_score_zero() {
        assert_eq!(diversification_score(&[1.0, 0.0, 0.0]), 0.0);
        assert_eq!(diversification_score(&[1.0]), 0.0);
    }

    #[test]
    fn test_suggestions_for_concentrated_portfolio() {
        let suggestions = rebalancing_suggestions(&[0.7, 0.29, 0.01], RiskTolerance::Aggressive);
        assert_eq!(
            suggestions,
            vec![
                "Consider reducing concentration in top holding to improve diversification",
                "Consider eliminating positions below 2% to reduce transaction costs",
                "Quarterly rebalancing may be sufficient for growth-focused portfolio",
            ]
        );
    }

    #[test]
    fn test_zero_weights_are_not_small_positions() {
        let suggestions = rebalancing_suggestions(&[0.35, 0.35, 0.3, 0.0], RiskTolerance::Moderate);
        assert_eq!(
            suggestions,
            vec!["Rebalance quarterly or when allocations drift more than 5% from targets"]
        );
    }

    #[test]
    fn test_conservative_cadence() {
        let suggestions = rebalancing_suggestions(&[0.5, 0.5], RiskTolerance::Conservative);
        assert_eq!(
            suggestions.last().map(String::as_str),
            Some("Consider monthly rebalancing to maintain risk targets")
        );
    }
}
