mod coding_time;
mod cycle_time;
mod dora;
mod filters;
mod health;
mod pr_cycle_time;
mod pr_size;
mod review_efficiency;
mod rework;
mod stats;

pub use coding_time::{calculate_coding_time, CodingTimeMetrics};
pub use cycle_time::{calculate_cycle_time, CycleTimeMetrics};
pub use dora::{calculate_dora, DataSource, DoraInputs, DoraMetrics};
pub use filters::{exclude_base_branches, filter_issues};
pub use health::{evaluate_health, HealthInputs, HealthReport, HealthStatus, HealthThresholds};
pub use pr_cycle_time::{calculate_pr_cycle_time, PrCycleTimeMetrics};
pub use pr_size::{calculate_pr_size, PrSizeMetrics};
pub use review_efficiency::{calculate_review_efficiency, ReviewEfficiencyMetrics};
pub use rework::{calculate_rework_rate, ReworkRateMetrics};
pub use stats::Stats;
