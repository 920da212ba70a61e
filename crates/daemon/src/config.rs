//! Daemon configuration.

use std::path::PathBuf;

use engine::PlanOptions;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 3333;
pub const DEFAULT_SOURCE_DIRS: &str = "_source/film-grab,_source/shot-cafe";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Data root: `index.json`, `scenes/` and the static files live here.
    pub root: PathBuf,
    pub host: String,
    pub port: u16,
    /// Prefix turning catalog image paths into absolute reference URLs.
    pub asset_base_url: String,
    /// Tagged-shot source directories, relative to `root`.
    pub source_dirs: Vec<PathBuf>,
}

impl Config {
    /// Create config from `SHOTDECK_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let port = lookup("SHOTDECK_PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        Self {
            root: lookup("SHOTDECK_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
            host: lookup("SHOTDECK_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            asset_base_url: lookup("SHOTDECK_ASSET_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            source_dirs: lookup("SHOTDECK_SOURCE_DIRS")
                .unwrap_or_else(|| DEFAULT_SOURCE_DIRS.to_string())
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
                .collect(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn plan_options(&self) -> PlanOptions {
        PlanOptions {
            asset_base_url: self.asset_base_url.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.root, PathBuf::from("."));
        assert_eq!(config.bind_addr(), "127.0.0.1:3333");
        assert_eq!(config.asset_base_url, "http://localhost:3333");
        assert_eq!(
            config.source_dirs,
            vec![PathBuf::from("_source/film-grab"), PathBuf::from("_source/shot-cafe")]
        );
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("SHOTDECK_ROOT", "/data/shots"),
            ("SHOTDECK_PORT", "8080"),
            ("SHOTDECK_ASSET_BASE_URL", "https://cdn.example.com/"),
            ("SHOTDECK_SOURCE_DIRS", " stills , ,grabs"),
        ]);
        assert_eq!(config.root, PathBuf::from("/data/shots"));
        assert_eq!(config.port, 8080);
        assert_eq!(config.plan_options().asset_base_url, "https://cdn.example.com");
        assert_eq!(config.source_dirs, vec![PathBuf::from("stills"), PathBuf::from("grabs")]);
    }

    #[test]
    fn test_bad_port_falls_back() {
        let config = config(&[("SHOTDECK_PORT", "http")]);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.asset_base_url, "http://localhost:3333");
    }
}
