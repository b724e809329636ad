use anyhow::{Context, Result};
use entity_query_core::filters::{
    DEFAULT_LIST_LIMIT, DEFAULT_MAX_CHUNKS, DEFAULT_MAX_RELATED_ENTITIES, DEFAULT_SEARCH_LIMIT,
};
use entity_query_core::QueryDefaults;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub query: QueryConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueryConfig {
    #[serde(default = "default_list_limit")]
    pub default_list_limit: i64,
    #[serde(default = "default_max_list_limit")]
    pub max_list_limit: i64,
    #[serde(default = "default_search_limit")]
    pub default_search_limit: i64,
    #[serde(default = "default_max_search_limit")]
    pub max_search_limit: i64,
    #[serde(default = "default_max_chunks")]
    pub default_max_chunks: i64,
    #[serde(default = "default_max_related_entities")]
    pub max_related_entities: i64,
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_list_limit: DEFAULT_LIST_LIMIT,
            max_list_limit: default_max_list_limit(),
            default_search_limit: DEFAULT_SEARCH_LIMIT,
            max_search_limit: default_max_search_limit(),
            default_max_chunks: DEFAULT_MAX_CHUNKS,
            max_related_entities: DEFAULT_MAX_RELATED_ENTITIES,
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl QueryConfig {
    /// Request defaults handed to the engine at startup.
    pub fn defaults(&self) -> QueryDefaults {
        QueryDefaults {
            list_limit: self.default_list_limit,
            max_list_limit: self.max_list_limit,
            search_limit: self.default_search_limit,
            max_search_limit: self.max_search_limit,
            max_chunks: self.default_max_chunks,
            max_related_entities: self.max_related_entities,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_list_limit() -> i64 {
    DEFAULT_LIST_LIMIT
}
fn default_max_list_limit() -> i64 {
    1000
}
fn default_search_limit() -> i64 {
    DEFAULT_SEARCH_LIMIT
}
fn default_max_search_limit() -> i64 {
    100
}
fn default_max_chunks() -> i64 {
    DEFAULT_MAX_CHUNKS
}
fn default_max_related_entities() -> i64 {
    DEFAULT_MAX_RELATED_ENTITIES
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    let q = &config.query;

    for (name, value) in [
        ("query.default_list_limit", q.default_list_limit),
        ("query.max_list_limit", q.max_list_limit),
        ("query.default_search_limit", q.default_search_limit),
        ("query.max_search_limit", q.max_search_limit),
        ("query.default_max_chunks", q.default_max_chunks),
        ("query.max_related_entities", q.max_related_entities),
    ] {
        if value < 1 {
            anyhow::bail!("{} must be >= 1", name);
        }
    }

    if q.default_list_limit > q.max_list_limit {
        anyhow::bail!("query.default_list_limit cannot exceed query.max_list_limit");
    }
    if q.default_search_limit > q.max_search_limit {
        anyhow::bail!("query.default_search_limit cannot exceed query.max_search_limit");
    }

    if q.request_timeout_secs == 0 {
        anyhow::bail!("query.request_timeout_secs must be >= 1");
    }

    if config.logging.level.trim().is_empty() {
        anyhow::bail!("logging.level must not be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg = parse("[db]\npath = \"./data/graph.sqlite\"\n").unwrap();
        assert_eq!(cfg.query.default_list_limit, 100);
        assert_eq!(cfg.query.max_list_limit, 1000);
        assert_eq!(cfg.query.default_search_limit, 20);
        assert_eq!(cfg.query.request_timeout_secs, 30);
        assert_eq!(cfg.server.bind, "127.0.0.1:7341");
        assert_eq!(cfg.logging.level, "info");
        assert_eq!(cfg.query.defaults(), QueryDefaults::default());
    }

    #[test]
    fn partial_query_section_keeps_other_defaults() {
        let cfg = parse(
            r#"
[db]
path = "g.sqlite"

[query]
default_search_limit = 5
"#,
        )
        .unwrap();
        assert_eq!(cfg.query.default_search_limit, 5);
        assert_eq!(cfg.query.max_search_limit, 100);
        assert_eq!(cfg.query.defaults().search_limit, 5);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse("[db]\npath = \"g\"\n[query]\ndefault_list_limit = 0\n").is_err());
        assert!(parse("[db]\npath = \"g\"\n[query]\ndefault_list_limit = 2000\n").is_err());
        assert!(parse("[db]\npath = \"g\"\n[query]\nrequest_timeout_secs = 0\n").is_err());
        assert!(parse("[db]\npath = \"g\"\n[logging]\nlevel = \"\"\n").is_err());
    }

    #[test]
    fn missing_db_section_is_an_error() {
        assert!(toml::from_str::<Config>("[query]\n").is_err());
    }

    #[test]
    fn load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/eqe.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
