use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Good,
    Warning,
    Critical,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Good => "good",
            Self::Warning => "warning",
            Self::Critical => "critical",
        }
    }
}

/// Upper bounds for a "lower is better" metric.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Threshold {
    pub good: f64,
    pub warning: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct HealthThresholds {
    /// Hours
    pub lead_time: Threshold,
    /// Percent
    pub change_failure_rate: Threshold,
    /// Hours
    pub cycle_time: Threshold,
    /// Hours
    pub time_to_first_review: Threshold,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            lead_time: Threshold {
                good: 24.0,
                warning: 168.0,
            },
            change_failure_rate: Threshold {
                good: 5.0,
                warning: 15.0,
            },
            cycle_time: Threshold {
                good: 48.0,
                warning: 120.0,
            },
            time_to_first_review: Threshold {
                good: 4.0,
                warning: 24.0,
            },
        }
    }
}

pub fn evaluate_metric(value: Option<f64>, threshold: &Threshold) -> Option<HealthStatus> {
    let value = value?;
    Some(if value <= threshold.good {
        HealthStatus::Good
    } else if value <= threshold.warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Critical
    })
}

/// The worst of the evaluated statuses. Unevaluated metrics are ignored; `Good`
/// when nothing was evaluated.
pub fn select_worst_status(statuses: &[Option<HealthStatus>]) -> HealthStatus {
    statuses
        .iter()
        .flatten()
        .copied()
        .max()
        .unwrap_or(HealthStatus::Good)
}

/// Figures that feed the overall health of a repository.
#[derive(Debug, Clone, Copy, Default)]
pub struct HealthInputs {
    pub lead_time_hours: Option<f64>,
    pub change_failure_rate: Option<f64>,
    pub cycle_time_hours: Option<f64>,
    pub time_to_first_review_hours: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
    pub lead_time: Option<HealthStatus>,
    pub change_failure_rate: Option<HealthStatus>,
    pub cycle_time: Option<HealthStatus>,
    pub time_to_first_review: Option<HealthStatus>,
    pub overall: HealthStatus,
}

pub fn evaluate_health(inputs: &HealthInputs, thresholds: &HealthThresholds) -> HealthReport {
    let lead_time = evaluate_metric(inputs.lead_time_hours, &thresholds.lead_time);
    let change_failure_rate =
        evaluate_metric(inputs.change_failure_rate, &thresholds.change_failure_rate);
    let cycle_time = evaluate_metric(inputs.cycle_time_hours, &thresholds.cycle_time);
    let time_to_first_review = evaluate_metric(
        inputs.time_to_first_review_hours,
        &thresholds.time_to_first_review,
    );

    HealthReport {
        lead_time,
        change_failure_rate,
        cycle_time,
        time_to_first_review,
        overall: select_worst_status(&[
            lead_time,
            change_failure_rate,
            cycle_time,
            time_to_first_review,
        ]),
    }
}
