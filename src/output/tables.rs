use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color as TableColor, ContentArrangement, Table};

use crate::metrics::{HealthStatus, Stats};

/// Table and cell creation helpers
pub fn create_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

pub fn cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

pub fn format_hours(hours: Option<f64>) -> String {
    hours.map_or_else(|| "N/A".to_string(), |h| format!("{h:.1}h"))
}

pub fn format_percent(rate: Option<f64>) -> String {
    rate.map_or_else(|| "N/A".to_string(), |r| format!("{r:.1}%"))
}

pub fn format_number(value: Option<f64>) -> String {
    value.map_or_else(|| "N/A".to_string(), |v| format!("{v:.1}"))
}

/// Cell coloured by health status; metrics without data stay uncoloured.
pub fn health_cell(text: String, status: Option<HealthStatus>) -> Cell {
    match status {
        Some(HealthStatus::Good) => Cell::new(text).fg(TableColor::Green),
        Some(HealthStatus::Warning) => Cell::new(text).fg(TableColor::Yellow),
        Some(HealthStatus::Critical) => Cell::new(text).fg(TableColor::Red),
        None => Cell::new(text).fg(TableColor::DarkGrey),
    }
}

pub fn status_cell(status: Option<HealthStatus>) -> Cell {
    health_cell(status.map_or("no data", HealthStatus::as_str).to_string(), status)
}

/// Row of `label, count, avg, median, min, max` formatted with `format`.
pub fn stats_row(label: &str, count: usize, stats: &Stats, format: fn(Option<f64>) -> String) -> Vec<Cell> {
    vec![
        Cell::new(label),
        Cell::new(count),
        Cell::new(format(stats.avg)),
        Cell::new(format(stats.median)),
        Cell::new(format(stats.min)),
        Cell::new(format(stats.max)),
    ]
}
