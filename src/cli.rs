use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::auth::Token;
use crate::config::{Config, OutputFormat};
use crate::model::Snapshot;
use crate::output::{export_report, PhaseProgress};
use crate::providers::{FetchOptions, GitHubProvider, RetryPolicy};
use crate::report::{build_report, MetricsReport};

#[derive(Parser)]
#[command(name = "doralens")]
#[command(author, version, about = "DORA and flow metrics for GitHub repositories", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./doralens.{toml,json,yaml,yml})
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the report to a file instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, value_enum)]
    format: Option<OutputFormat>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// Length of the analysed period in days
    #[arg(short, long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    days: Option<u32>,

    /// Substring identifying the production branch
    #[arg(long, global = true)]
    production_pattern: Option<String>,

    /// Substring identifying the production deployment environment
    #[arg(long, global = true)]
    production_environment: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute metrics from previously saved snapshot files
    Snapshot {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
    },
    /// Fetch data from GitHub and compute metrics
    Github {
        #[arg(short, long, env = "GITHUB_TOKEN", hide_env_values = true)]
        token: Option<String>,

        /// API base URL, for GitHub Enterprise
        #[arg(short, long)]
        url: Option<String>,

        /// Repository in `owner/repo` form; repeat for several
        #[arg(short, long = "repo")]
        repos: Vec<String>,

        /// Only analyse issues carrying these labels
        #[arg(short, long = "label")]
        labels: Vec<String>,

        /// Disable the pull request cache
        #[arg(long, default_value_t = false)]
        no_cache: bool,

        /// Save the fetched snapshots into this directory
        #[arg(long)]
        save_snapshots: Option<PathBuf>,
    },
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(days) = self.days {
            config.github.days = days;
        }
        if let Some(pattern) = &self.production_pattern {
            config.metrics.production_branch_pattern.clone_from(pattern);
        }
        if let Some(environment) = &self.production_environment {
            config.metrics.production_environment.clone_from(environment);
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.pretty {
            config.output.pretty = true;
        }

        if let Commands::Github {
            url,
            repos,
            labels,
            no_cache,
            ..
        } = &self.command
        {
            if let Some(url) = url {
                config.github.base_url.clone_from(url);
            }
            if !repos.is_empty() {
                config.github.repositories.clone_from(repos);
            }
            if !labels.is_empty() {
                config.github.labels.clone_from(labels);
            }
            if *no_cache {
                config.github.no_cache = true;
            }
        }
    }

    async fn execute_github(
        &self,
        config: &Config,
        token: Option<Token>,
        save_snapshots: Option<&Path>,
    ) -> Result<MetricsReport> {
        let github = &config.github;
        if github.repositories.is_empty() {
            anyhow::bail!("No repositories given; use --repo or github.repositories in the config file");
        }

        let until = Utc::now();
        let since = until - Duration::days(i64::from(github.days));
        let options = FetchOptions {
            since,
            until,
            labels: &github.labels,
            production_environment: &config.metrics.production_environment,
        };
        let retry = RetryPolicy {
            max_retries: github.max_retries,
            delay: std::time::Duration::from_secs(github.retry_delay_seconds),
        };

        info!(
            "Collecting metrics for {} repositories over {} days",
            github.repositories.len(),
            github.days
        );

        let progress = PhaseProgress::start_fetching(github.repositories.len());
        let mut snapshots = Vec::new();

        for (index, repository) in github.repositories.iter().enumerate() {
            progress.fetching(index, repository);

            let provider = GitHubProvider::new(
                &github.base_url,
                repository,
                token.clone(),
                retry,
                !github.no_cache,
            )?;

            match provider.fetch_snapshot(&options).await {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => warn!("[{}] Skipping repository: {e}", provider.repository()),
            }
        }

        if snapshots.is_empty() {
            anyhow::bail!("No repository data could be fetched");
        }

        if let Some(dir) = save_snapshots {
            save_snapshot_files(&snapshots, dir)?;
        }

        let progress = progress.finish_fetching_start_computing();
        let report = build_report(snapshots, config);
        progress.finish_computing();

        Ok(report)
    }

    fn write_report(&self, report: &MetricsReport, config: &Config) -> Result<()> {
        let format = config.output.format;
        let pretty = config.output.pretty;

        if let Some(output_path) = &self.output {
            let file = File::create(output_path)
                .with_context(|| format!("Failed to create {}", output_path.display()))?;
            let mut writer = BufWriter::new(file);
            export_report(report, format, pretty, &mut writer)?;
            writer.flush()?;
            info!("Report written to: {}", output_path.display());
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            export_report(report, format, pretty, &mut handle)?;
        }

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let mut config = Config::load(self.config.as_deref())?;
        self.apply_overrides(&mut config);

        let report = match &self.command {
            Commands::Snapshot { inputs } => {
                let snapshots = load_snapshot_files(inputs)?;
                build_report(snapshots, &config)
            }
            Commands::Github {
                token,
                save_snapshots,
                ..
            } => {
                let token = token
                    .as_deref()
                    .or(config.github.token.as_deref())
                    .map(Token::from);
                self.execute_github(&config, token, save_snapshots.as_deref())
                    .await?
            }
        };

        self.write_report(&report, &config)
    }
}

fn load_snapshot_files(inputs: &[PathBuf]) -> Result<Vec<Snapshot>> {
    inputs
        .iter()
        .map(|path| {
            info!("Loading snapshot: {}", path.display());
            Snapshot::load(path)
                .with_context(|| format!("Failed to load snapshot {}", path.display()))
        })
        .collect()
}

fn save_snapshot_files(snapshots: &[Snapshot], dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for snapshot in snapshots {
        let path = dir.join(snapshot.repository.replace('/', "-") + ".json");
        snapshot
            .save(&path)
            .with_context(|| format!("Failed to save snapshot {}", path.display()))?;
        info!("Snapshot saved to: {}", path.display());
    }

    Ok(())
}
