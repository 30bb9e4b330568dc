use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    oracle::UciEngineFactory,
};

/// Names the JSON config file, if any.
pub const CONFIG_FILE_VAR: &str = "RANKER_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankerConfig {
    /// UCI engine executable.
    pub engine_path: PathBuf,
    pub bind: SocketAddr,
    /// Maximum number of engine processes alive at once.
    pub pool_size: usize,
    /// Budget for a whole ranking request.
    pub timeout_secs: u64,
    pub max_depth: u32,
    pub engine_threads: u32,
    pub engine_hash_mb: u32,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            engine_path: PathBuf::from("stockfish"),
            bind: SocketAddr::from(([127, 0, 0, 1], 5000)),
            pool_size: std::thread::available_parallelism().map_or(4, usize::from),
            timeout_secs: 120,
            max_depth: 30,
            engine_threads: 1,
            engine_hash_mb: 16,
        }
    }
}

impl RankerConfig {
    pub fn load_from_json(json_str: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json_str)
    }

    /// Defaults, then the file named by `RANKER_CONFIG`, then individual
    /// `RANKER_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(CONFIG_FILE_VAR) {
            Some(path) => {
                let json = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                    path: path.clone(),
                    source,
                })?;
                Self::load_from_json(&json).map_err(|source| ConfigError::Parse { path, source })?
            }
            None => Self::default(),
        };

        // STOCKFISH_PATH is what older deployments set.
        if let Some(path) = lookup("RANKER_ENGINE_PATH").or_else(|| lookup("STOCKFISH_PATH")) {
            config.engine_path = PathBuf::from(path);
        }
        override_with(&lookup, "RANKER_BIND", &mut config.bind)?;
        override_with(&lookup, "RANKER_POOL_SIZE", &mut config.pool_size)?;
        override_with(&lookup, "RANKER_TIMEOUT_SECS", &mut config.timeout_secs)?;
        override_with(&lookup, "RANKER_MAX_DEPTH", &mut config.max_depth)?;
        override_with(&lookup, "RANKER_ENGINE_THREADS", &mut config.engine_threads)?;
        override_with(&lookup, "RANKER_ENGINE_HASH_MB", &mut config.engine_hash_mb)?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("pool_size", self.pool_size == 0, self.pool_size.to_string()),
            ("timeout_secs", self.timeout_secs == 0, self.timeout_secs.to_string()),
            ("max_depth", self.max_depth == 0, self.max_depth.to_string()),
            ("engine_threads", self.engine_threads == 0, self.engine_threads.to_string()),
        ];
        match checks.into_iter().find(|(_, bad, _)| *bad) {
            Some((key, _, value)) => Err(ConfigError::InvalidValue { key, value }),
            None => Ok(()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Factory for engine sessions carrying this config's UCI options.
    pub fn engine_factory(&self) -> UciEngineFactory {
        UciEngineFactory::new(&self.engine_path)
            .with_option("Threads", self.engine_threads)
            .with_option("Hash", self.engine_hash_mb)
    }
}

fn override_with<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    slot: &mut T,
) -> Result<(), ConfigError> {
    if let Some(raw) = lookup(key) {
        *slot = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: raw })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_load_config_default() {
        let config = RankerConfig::load_from_json("{}").unwrap();
        assert_eq!(config, RankerConfig::default());
        assert_eq!(config.request_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_load_config_partial() {
        let config =
            RankerConfig::load_from_json(r#"{ "engine_path": "/opt/sf", "max_depth": 20 }"#)
                .unwrap();
        assert_eq!(config.engine_path, PathBuf::from("/opt/sf"));
        assert_eq!(config.max_depth, 20);
        assert_eq!(config.engine_hash_mb, 16);
    }

    #[test]
    fn test_load_config_invalid_json() {
        assert!(RankerConfig::load_from_json("{ invalid json }").is_err());
    }

    #[test]
    fn env_overrides_defaults() {
        let config = RankerConfig::from_lookup(lookup(&[
            ("STOCKFISH_PATH", "/usr/games/stockfish"),
            ("RANKER_BIND", "0.0.0.0:8080"),
            ("RANKER_POOL_SIZE", "3"),
            ("RANKER_TIMEOUT_SECS", " 30 "),
        ]))
        .unwrap();
        assert_eq!(config.engine_path, PathBuf::from("/usr/games/stockfish"));
        assert_eq!(config.bind.port(), 8080);
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn engine_path_prefers_ranker_variable() {
        let config = RankerConfig::from_lookup(lookup(&[
            ("STOCKFISH_PATH", "/a"),
            ("RANKER_ENGINE_PATH", "/b"),
        ]))
        .unwrap();
        assert_eq!(config.engine_factory().path(), std::path::Path::new("/b"));
    }

    #[test]
    fn rejects_bad_values() {
        let err = RankerConfig::from_lookup(lookup(&[("RANKER_MAX_DEPTH", "deep")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "RANKER_MAX_DEPTH", .. }));

        let err = RankerConfig::from_lookup(lookup(&[("RANKER_POOL_SIZE", "0")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: "pool_size", .. }));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let err = RankerConfig::from_lookup(lookup(&[(CONFIG_FILE_VAR, "/nonexistent/ranker.json")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
