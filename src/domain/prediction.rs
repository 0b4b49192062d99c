//! Prediction result and its display form.

use serde::{Deserialize, Serialize};

/// Label shown before the percentage.
pub const RESULT_LABEL: &str = "Predicted Risk";

/// Probability of an unplanned return to the operating room.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Positive-class probability as returned by the model. Not clamped.
    pub probability: f64,

    /// When the model produced this value.
    pub computed_at: chrono::DateTime<chrono::Utc>,
}

impl Prediction {
    #[must_use]
    pub fn new(probability: f64) -> Self {
        Self {
            probability,
            computed_at: chrono::Utc::now(),
        }
    }

    /// `"27%"` style percentage.
    #[must_use]
    pub fn percent(&self) -> String {
        present(self.probability)
    }

    /// `"Predicted Risk: 27%"`.
    #[must_use]
    pub fn display_line(&self) -> String {
        display_line(self.probability)
    }
}

/// Format a probability as a whole percentage: `round(p * 100)` followed by `%`.
///
/// No clamping is applied; values outside `[0, 1]` print as they are.
#[must_use]
pub fn present(probability: f64) -> String {
    format!("{}%", (probability * 100.0).round())
}

/// Full result line shown under the form.
#[must_use]
pub fn display_line(probability: f64) -> String {
    format!("{RESULT_LABEL}: {}", present(probability))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_present_rounds_to_whole_percent() {
        assert_eq!(present(0.27), "27%");
        assert_eq!(present(0.274), "27%");
        assert_eq!(present(0.276), "28%");
    }

    #[test]
    fn test_present_boundaries() {
        assert_eq!(present(1.0), "100%");
        assert_eq!(present(0.0), "0%");
    }

    #[test]
    fn test_present_does_not_clamp() {
        assert_eq!(present(1.2), "120%");
    }

    #[test]
    fn test_display_line() {
        let prediction = Prediction::new(0.27);
        assert_eq!(prediction.display_line(), "Predicted Risk: 27%");
        assert_eq!(prediction.percent(), "27%");
    }
}
