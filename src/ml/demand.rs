/*!
 * # Demand Forecasting Model
 *
 * Predicts next-day demand for a single product from its daily sales
 * history. The model is a moving average adjusted by a half-over-half
 * trend, blended with the average for the target weekday when the history
 * contains one, and clamped to a non-negative integer. Confidence is
 * derived from the coefficient of variation of the history: steady sellers
 * score near 1.0, erratic ones fall toward the floor.
 */

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::config::ForecastTuning;

/// Confidence never drops below this, even for wildly erratic histories.
const MIN_CONFIDENCE: f64 = 0.1;

/// A single day-ahead prediction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemandForecast {
    /// Predicted units for the target date, never negative
    pub predicted_quantity: i32,
    /// Confidence in [0.1, 1.0], rounded to two decimals
    pub confidence: f64,
}

/// Replenishment urgency derived from stock on hand versus predicted demand.
/// Ordered most urgent first so plans sort naturally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProductionPriority {
    High,
    Medium,
    Low,
}

/// Deterministic demand model.
pub struct DemandModel {
    /// Trailing days averaged for the baseline
    moving_average_window: usize,
    /// Weight of the half-over-half trend added to the baseline
    trend_weight: f64,
    /// Blend weight of the same-weekday average
    weekday_weight: f64,
    /// Coefficient-of-variation scale mapping dispersion to confidence
    cv_scale: f64,
}

impl DemandModel {
    /// Creates a model with the stock tuning.
    pub fn new() -> Self {
        Self::from_tuning(&ForecastTuning::default())
    }

    /// Creates a model from deployment tuning.
    pub fn from_tuning(tuning: &ForecastTuning) -> Self {
        Self {
            moving_average_window: tuning.moving_average_window as usize,
            trend_weight: tuning.trend_weight,
            weekday_weight: tuning.weekday_weight,
            cv_scale: tuning.cv_scale,
        }
    }

    /// Predicts demand for `target` from per-day sales totals.
    ///
    /// `history` must hold one entry per day that had sales, ordered by date
    /// ascending. Callers enforce the minimum-history floor; an empty history
    /// yields a zero forecast at the confidence floor rather than a panic.
    pub fn predict(&self, history: &[(NaiveDate, f64)], target: NaiveDate) -> DemandForecast {
        if history.is_empty() {
            return DemandForecast {
                predicted_quantity: 0,
                confidence: MIN_CONFIDENCE,
            };
        }

        let quantities: Vec<f64> = history.iter().map(|(_, qty)| *qty).collect();

        // Baseline: average of the trailing window only.
        let window = self.moving_average_window.min(quantities.len());
        let moving_avg = mean(&quantities[quantities.len() - window..]);

        // Trend: how the later half of the whole history compares to the
        // earlier half. A single data point has no direction.
        let trend = if quantities.len() >= 2 {
            let mid = quantities.len() / 2;
            mean(&quantities[mid..]) - mean(&quantities[..mid])
        } else {
            0.0
        };

        let base = moving_avg + self.trend_weight * trend;

        // Weekday blend: only when the history actually saw that weekday.
        let weekday_values: Vec<f64> = history
            .iter()
            .filter(|(date, _)| date.weekday() == target.weekday())
            .map(|(_, qty)| *qty)
            .collect();

        let prediction = if weekday_values.is_empty() {
            base
        } else {
            (1.0 - self.weekday_weight) * base + self.weekday_weight * mean(&weekday_values)
        };

        let predicted_quantity = prediction.max(0.0).round() as i32;

        DemandForecast {
            predicted_quantity,
            confidence: self.confidence(&quantities),
        }
    }

    /// Confidence from the dispersion of the full history.
    fn confidence(&self, quantities: &[f64]) -> f64 {
        let mean_all = mean(quantities);
        let cv = if mean_all <= 0.0 {
            1.0
        } else {
            population_variance(quantities, mean_all).sqrt() / mean_all
        };

        let confidence = (1.0 - cv / self.cv_scale).clamp(MIN_CONFIDENCE, 1.0);
        (confidence * 100.0).round() / 100.0
    }
}

impl Default for DemandModel {
    fn default() -> Self {
        Self::new()
    }
}

/// Mean absolute percentage error over `(predicted, actual)` pairs.
///
/// Pairs with a non-positive actual are excluded; returns `None` when no
/// pair is eligible.
pub fn mape(pairs: &[(f64, f64)]) -> Option<f64> {
    let errors: Vec<f64> = pairs
        .iter()
        .filter(|(_, actual)| *actual > 0.0)
        .map(|(predicted, actual)| (predicted - actual).abs() / actual)
        .collect();

    if errors.is_empty() {
        None
    } else {
        Some(mean(&errors))
    }
}

/// Classifies replenishment urgency for one product.
///
/// Stock under `high_ratio` of predicted demand is urgent; stock covering
/// the whole prediction is not. The classification is derived on read and
/// never stored.
pub fn classify_priority(stock: f64, predicted: i32, high_ratio: f64) -> ProductionPriority {
    let predicted = f64::from(predicted);
    if stock < high_ratio * predicted {
        ProductionPriority::High
    } else if stock >= predicted {
        ProductionPriority::Low
    } else {
        ProductionPriority::Medium
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_variance(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values
        .iter()
        .map(|v| {
            let d = v - mean;
            d * d
        })
        .sum::<f64>()
        / values.len() as f64
}
