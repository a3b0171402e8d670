use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::metrics::HealthThresholds;

/// Configuration file structure for DoraLens.
///
/// Configuration files are loaded from the current directory or a specified
/// path. Every section is optional; missing values fall back to defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// GitHub data source settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Metric calculation settings
    #[serde(default)]
    pub metrics: MetricsConfig,

    /// Base branches excluded per metric
    #[serde(default)]
    pub exclude_branches: ExcludeBranchesConfig,

    /// Health thresholds
    #[serde(default)]
    pub health: HealthThresholds,

    /// Output format preferences
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GitHubConfig {
    /// GitHub personal access token
    pub token: Option<String>,

    /// GitHub API base URL
    #[serde(default = "default_github_base_url")]
    pub base_url: String,

    /// Repositories to analyse (e.g., 'owner/repo')
    #[serde(default)]
    pub repositories: Vec<String>,

    /// Length of the analysed period in days
    #[serde(default = "default_days")]
    pub days: u32,

    /// Only analyse issues carrying one of these labels
    #[serde(default)]
    pub labels: Vec<String>,

    /// Retries for rate-limited or failing requests
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay between retries
    #[serde(default = "default_retry_delay_seconds")]
    pub retry_delay_seconds: u64,

    /// Disable the pull request cache
    #[serde(default)]
    pub no_cache: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MetricsConfig {
    /// Substring identifying the production branch
    #[serde(default = "default_production_branch_pattern")]
    pub production_branch_pattern: String,

    /// Substring identifying the production deployment environment
    #[serde(default = "default_production_environment")]
    pub production_environment: String,

    /// Workflow name substrings that mark a run as a deployment
    #[serde(default = "default_deploy_workflow_patterns")]
    pub deploy_workflow_patterns: Vec<String>,

    /// Issues carrying one of these labels are left out of issue metrics
    #[serde(default = "default_exclude_metrics_labels")]
    pub exclude_metrics_labels: Vec<String>,
}

/// Base-branch substrings to exclude, per metric.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExcludeBranchesConfig {
    pub cycle_time: Vec<String>,
    pub coding_time: Vec<String>,
    pub rework_rate: Vec<String>,
    pub review_efficiency: Vec<String>,
    pub pr_size: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Default output format
    #[serde(default)]
    pub format: OutputFormat,

    /// Pretty-print JSON output
    #[serde(default)]
    pub pretty: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Summary,
    Json,
    Csv,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            base_url: default_github_base_url(),
            repositories: Vec::new(),
            days: default_days(),
            labels: Vec::new(),
            max_retries: default_max_retries(),
            retry_delay_seconds: default_retry_delay_seconds(),
            no_cache: false,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            production_branch_pattern: default_production_branch_pattern(),
            production_environment: default_production_environment(),
            deploy_workflow_patterns: default_deploy_workflow_patterns(),
            exclude_metrics_labels: default_exclude_metrics_labels(),
        }
    }
}

fn default_github_base_url() -> String {
    "https://api.github.com".to_string()
}

fn default_days() -> u32 {
    30
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay_seconds() -> u64 {
    10
}

fn default_production_branch_pattern() -> String {
    "production".to_string()
}

fn default_production_environment() -> String {
    "production".to_string()
}

fn default_deploy_workflow_patterns() -> Vec<String> {
    vec!["deploy".to_string()]
}

fn default_exclude_metrics_labels() -> Vec<String> {
    vec!["exclude-metrics".to_string()]
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./doralens.toml
    /// 3. ./doralens.json
    /// 4. ./doralens.yaml
    /// 5. ./doralens.yml
    ///
    /// Returns default configuration if no file is found.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let candidates = ["doralens.toml", "doralens.json", "doralens.yaml", "doralens.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|ext| ext.to_str()).unwrap_or("");

        let config: Self = match extension {
            "toml" => toml::from_str(&contents)
                .with_context(|| format!("Failed to parse TOML config: {}", path.display()))?,
            "json" => serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .with_context(|| format!("Failed to parse YAML config: {}", path.display()))?,
            _ => toml::from_str(&contents)
                .or_else(|_| serde_json::from_str(&contents))
                .or_else(|_| serde_yaml::from_str(&contents))
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?,
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.github.days == 0 {
            anyhow::bail!("github.days must be at least 1");
        }
        for (name, threshold) in [
            ("lead-time", self.health.lead_time),
            ("change-failure-rate", self.health.change_failure_rate),
            ("cycle-time", self.health.cycle_time),
            ("time-to-first-review", self.health.time_to_first_review),
        ] {
            if threshold.good > threshold.warning {
                anyhow::bail!("health.{name}: good threshold exceeds warning threshold");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.github.days, 30);
        assert_eq!(config.github.max_retries, 5);
        assert_eq!(config.metrics.production_branch_pattern, "production");
        assert_eq!(config.metrics.deploy_workflow_patterns, vec!["deploy"]);
        assert_eq!(config.metrics.exclude_metrics_labels, vec!["exclude-metrics"]);
        assert_eq!(config.health.lead_time.good, 24.0);
        assert!(config.exclude_branches.pr_size.is_empty());
    }

    #[test]
    fn test_load_toml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        let toml_content = r#"
[github]
token = "ghp-test-token"
repositories = ["acme/api", "acme/web"]
days = 14

[metrics]
production-branch-pattern = "release"
deploy-workflow-patterns = ["deploy", "ship"]

[exclude-branches]
pr-size = ["dependabot"]

[health.cycle-time]
good = 24
warning = 72

[output]
format = "json"
pretty = true
"#;
        write!(temp_file, "{toml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.github.token, Some("ghp-test-token".to_string()));
        assert_eq!(config.github.repositories, vec!["acme/api", "acme/web"]);
        assert_eq!(config.github.days, 14);
        assert_eq!(config.github.base_url, "https://api.github.com");
        assert_eq!(config.metrics.production_branch_pattern, "release");
        assert_eq!(config.metrics.production_environment, "production");
        assert_eq!(config.exclude_branches.pr_size, vec!["dependabot"]);
        assert_eq!(config.health.cycle_time.warning, 72.0);
        assert_eq!(config.health.lead_time.warning, 168.0);
        assert_eq!(config.output.format, OutputFormat::Json);
        assert!(config.output.pretty);
    }

    #[test]
    fn test_load_json_config() {
        let mut temp_file = NamedTempFile::with_suffix(".json").unwrap();
        let json_content = r#"{
  "github": { "base-url": "https://github.example.com/api/v3" },
  "output": { "format": "csv" }
}"#;
        write!(temp_file, "{json_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.github.base_url, "https://github.example.com/api/v3");
        assert_eq!(config.output.format, OutputFormat::Csv);
    }

    #[test]
    fn test_load_yaml_config() {
        let mut temp_file = NamedTempFile::with_suffix(".yaml").unwrap();
        let yaml_content = r#"
metrics:
  exclude-metrics-labels: ["skip", "wontfix"]
exclude-branches:
  cycle-time: ["hotfix"]
"#;
        write!(temp_file, "{yaml_content}").unwrap();

        let config = Config::load_from_path(temp_file.path()).unwrap();
        assert_eq!(config.metrics.exclude_metrics_labels, vec!["skip", "wontfix"]);
        assert_eq!(config.exclude_branches.cycle_time, vec!["hotfix"]);
    }

    #[test]
    fn test_missing_explicit_config_is_an_error() {
        assert!(Config::load(Some(Path::new("nonexistent.toml"))).is_err());
    }

    #[test]
    fn test_rejects_zero_day_period() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[github]\ndays = 0\n").unwrap();

        assert!(Config::load_from_path(temp_file.path()).is_err());
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let mut temp_file = NamedTempFile::with_suffix(".toml").unwrap();
        write!(temp_file, "[health.lead-time]\ngood = 200\nwarning = 100\n").unwrap();

        let err = Config::load_from_path(temp_file.path()).unwrap_err();
        assert!(err.to_string().contains("lead-time"));
    }

    #[test]
    fn test_config_roundtrips_through_toml() {
        let mut config = Config::default();
        config.github.repositories = vec!["acme/api".to_string()];
        config.metrics.production_environment = "prod".to_string();

        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("acme/api"));
        assert!(toml.contains("production-environment = \"prod\""));

        let parsed: Config = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.metrics.production_environment, "prod");
    }
}
