mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_report;
pub use progress::PhaseProgress;
use styling::{dim, magenta_bold};

/// Prints the `DoraLens` banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("📈 DoraLens"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("DORA and flow metrics for GitHub repositories")
    );
}
