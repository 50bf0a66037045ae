use serde::Deserialize;
use std::env;
use std::path::Path;
use tracing::info;

use crate::error::DeepdiveError;

/// Tunables for the research loop. Loaded from the `[agent]` table of an
/// optional TOML file, then overridden by `AGENT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Upper bound on search → fetch → extract → reflect cycles per run.
    pub max_iterations: u32,
    /// Max URLs processed concurrently per iteration (coerced to ≥1 at use).
    pub scrape_concurrency: usize,
    /// Facts whose cosine similarity to a stored fact exceeds this are redundant.
    pub similarity_threshold: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            scrape_concurrency: 3,
            similarity_threshold: 0.9,
        }
    }
}

impl AgentConfig {
    /// Apply `AGENT_MAX_ITERATIONS`, `AGENT_SCRAPE_CONCURRENCY` and
    /// `AGENT_SIMILARITY_THRESHOLD` overrides from `lookup`.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DeepdiveError> {
        if let Some(v) = lookup("AGENT_MAX_ITERATIONS") {
            self.max_iterations = parse_var("AGENT_MAX_ITERATIONS", &v)?;
        }
        if let Some(v) = lookup("AGENT_SCRAPE_CONCURRENCY") {
            self.scrape_concurrency = parse_var("AGENT_SCRAPE_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("AGENT_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = parse_var("AGENT_SIMILARITY_THRESHOLD", &v)?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), DeepdiveError> {
        if self.max_iterations == 0 {
            return Err(DeepdiveError::Config(
                "max_iterations must be at least 1".into(),
            ));
        }
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(DeepdiveError::Config(format!(
                "similarity_threshold must be within [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// Provider credentials and model names. Secrets stay in the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_embedding_model: String,
    pub openai_base_url: Option<String>,
    pub brave_api_key: String,
}

impl ApiConfig {
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DeepdiveError> {
        Ok(Self {
            openai_api_key: required(&lookup, "OPENAI_API_KEY")?,
            openai_model: lookup("OPENAI_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            openai_embedding_model: lookup("OPENAI_EMBEDDING_MODEL")
                .unwrap_or_else(|| "text-embedding-3-small".to_string()),
            openai_base_url: lookup("OPENAI_BASE_URL").filter(|v| !v.trim().is_empty()),
            brave_api_key: required(&lookup, "BRAVE_API_KEY")?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    agent: AgentConfig,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub agent: AgentConfig,
    pub api: ApiConfig,
}

impl Config {
    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, DeepdiveError> {
        Self::resolve(AgentConfig::default(), |key| env::var(key).ok())
    }

    /// Load agent tunables from a TOML file, then layer the environment on top.
    pub fn load(path: &Path) -> Result<Self, DeepdiveError> {
        let agent = load_agent_file(path)?;
        Self::resolve(agent, |key| env::var(key).ok())
    }

    fn resolve(
        agent: AgentConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, DeepdiveError> {
        let agent = agent.with_overrides(&lookup)?;
        agent.validate()?;
        let api = ApiConfig::from_lookup(&lookup)?;
        Ok(Self { agent, api })
    }

    /// Log the effective configuration with secrets masked.
    pub fn log_redacted(&self) {
        info!(
            max_iterations = self.agent.max_iterations,
            scrape_concurrency = self.agent.scrape_concurrency,
            similarity_threshold = self.agent.similarity_threshold,
            openai_model = self.api.openai_model.as_str(),
            openai_embedding_model = self.api.openai_embedding_model.as_str(),
            openai_base_url = self.api.openai_base_url.as_deref().unwrap_or("default"),
            openai_api_key = redact(&self.api.openai_api_key).as_str(),
            brave_api_key = redact(&self.api.brave_api_key).as_str(),
            "Loaded configuration"
        );
    }
}

/// Parse the `[agent]` table of a TOML config file.
pub fn load_agent_file(path: &Path) -> Result<AgentConfig, DeepdiveError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        DeepdiveError::Config(format!("Failed to read config file {}: {e}", path.display()))
    })?;
    let file: FileConfig = toml::from_str(&content).map_err(|e| {
        DeepdiveError::Config(format!("Failed to parse config file {}: {e}", path.display()))
    })?;
    Ok(file.agent)
}

fn required(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<String, DeepdiveError> {
    lookup(key)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| DeepdiveError::Config(format!("{key} environment variable is required")))
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, DeepdiveError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| DeepdiveError::Config(format!("{key} is invalid ({value}): {e}")))
}

fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "<unset>".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{prefix}****")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let agent = AgentConfig::default();
        assert!(agent.validate().is_ok());
        assert_eq!(agent.max_iterations, 3);
    }

    #[test]
    fn env_overrides_agent_tunables() {
        let lookup = lookup_from(&[
            ("AGENT_MAX_ITERATIONS", "5"),
            ("AGENT_SIMILARITY_THRESHOLD", "0.8"),
        ]);
        let agent = AgentConfig::default().with_overrides(lookup).unwrap();
        assert_eq!(agent.max_iterations, 5);
        assert_eq!(agent.scrape_concurrency, 3);
        assert!((agent.similarity_threshold - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn unparsable_override_is_config_error() {
        let lookup = lookup_from(&[("AGENT_SCRAPE_CONCURRENCY", "many")]);
        let err = AgentConfig::default().with_overrides(lookup).unwrap_err();
        assert!(matches!(err, DeepdiveError::Config(_)));
    }

    #[test]
    fn zero_iterations_rejected() {
        let agent = AgentConfig {
            max_iterations: 0,
            ..AgentConfig::default()
        };
        assert!(agent.validate().is_err());
    }

    #[test]
    fn api_config_requires_keys() {
        let err = ApiConfig::from_lookup(lookup_from(&[("OPENAI_API_KEY", "sk-1")])).unwrap_err();
        assert!(err.to_string().contains("BRAVE_API_KEY"));
    }

    #[test]
    fn api_config_defaults_models() {
        let api = ApiConfig::from_lookup(lookup_from(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("BRAVE_API_KEY", "brave"),
        ]))
        .unwrap();
        assert_eq!(api.openai_model, "gpt-4o-mini");
        assert_eq!(api.openai_embedding_model, "text-embedding-3-small");
        assert!(api.openai_base_url.is_none());
    }

    #[test]
    fn resolve_layers_env_over_file_values() {
        let file_agent = AgentConfig {
            max_iterations: 7,
            ..AgentConfig::default()
        };
        let config = Config::resolve(
            file_agent,
            lookup_from(&[
                ("OPENAI_API_KEY", "sk-1"),
                ("BRAVE_API_KEY", "brave"),
                ("AGENT_SCRAPE_CONCURRENCY", "6"),
            ]),
        )
        .unwrap();
        assert_eq!(config.agent.max_iterations, 7);
        assert_eq!(config.agent.scrape_concurrency, 6);
    }

    #[test]
    fn agent_table_loads_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_iterations = 2\nsimilarity_threshold = 0.75").unwrap();
        let agent = load_agent_file(file.path()).unwrap();
        assert_eq!(agent.max_iterations, 2);
        assert_eq!(agent.scrape_concurrency, 3);
        assert!((agent.similarity_threshold - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[agent]\nmax_iteration = 2").unwrap();
        assert!(load_agent_file(file.path()).is_err());
    }

    #[test]
    fn redact_masks_secret() {
        assert_eq!(redact("sk-abcdef"), "sk-a****");
        assert_eq!(redact(""), "<unset>");
    }
}
