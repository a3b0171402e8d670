use console::{style, StyledObject};

use crate::metrics::HealthStatus;

/// Styling helpers for terminal output
pub fn bright_yellow(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().yellow()
}

pub fn bright_green(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().green()
}

pub fn bright_red(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright().red()
}

pub fn cyan(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).cyan()
}

pub fn dim(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).dim()
}

pub fn bright(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).bright()
}

pub fn magenta_bold(text: impl std::fmt::Display) -> StyledObject<String> {
    style(text.to_string()).magenta().bold()
}

/// Colours text by health: green, yellow or red.
pub fn health(text: impl std::fmt::Display, status: HealthStatus) -> StyledObject<String> {
    match status {
        HealthStatus::Good => bright_green(text),
        HealthStatus::Warning => bright_yellow(text),
        HealthStatus::Critical => bright_red(text),
    }
}
