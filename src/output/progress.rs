use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// Progress spinners for the fetch and compute phases of a GitHub run.
pub struct PhaseProgress {
    pb: ProgressBar,
    repositories: usize,
}

impl PhaseProgress {
    pub fn start_fetching(repositories: usize) -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());
        let pb = create_spinner(
            bright_yellow(format!("Phase 1/2: Fetching {repositories} repositories")).to_string(),
        );
        Self { pb, repositories }
    }

    /// Shows which repository is being fetched.
    pub fn fetching(&self, index: usize, repository: &str) {
        self.pb.set_message(
            bright_yellow(format!(
                "Phase 1/2: Fetching {repository} ({}/{})",
                index + 1,
                self.repositories
            ))
            .to_string(),
        );
    }

    pub fn finish_fetching_start_computing(self) -> Self {
        self.pb.finish_with_message(
            bright_green(format!(
                "Phase 1/2: Fetched {} repositories ✓",
                self.repositories
            ))
            .to_string(),
        );
        let pb = create_spinner(
            bright_yellow("Phase 2/2: Tracking PR chains and computing metrics").to_string(),
        );
        Self {
            pb,
            repositories: self.repositories,
        }
    }

    pub fn finish_computing(self) {
        self.pb
            .finish_with_message(bright_green("Phase 2/2: Metrics computed ✓").to_string());
        eprintln!();
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
