use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use library::{song_roots_from_vars, IndexPolicy, SONG_ROOT_VAR};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub song_roots: Vec<String>,
    pub playlist_cache_dir: String,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub companion_port: Option<u16>,
    pub spotify_client_id: String,
    #[serde(default, skip_serializing)]
    pub spotify_client_secret: String,
    pub index_mode: IndexPolicy,
    pub index_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            song_roots: Vec::new(),
            playlist_cache_dir: "playlist_cache".to_string(),
            port: DEFAULT_PORT,
            companion_port: None,
            spotify_client_id: String::new(),
            spotify_client_secret: String::new(),
            index_mode: IndexPolicy::Additive,
            index_workers: 0,
        }
    }
}

impl ServerConfig {
    pub fn has_spotify_credentials(&self) -> bool {
        !self.spotify_client_id.trim().is_empty() && !self.spotify_client_secret.trim().is_empty()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Yaml(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(err) => write!(f, "io error: {}", err),
            ConfigError::Yaml(err) => write!(f, "yaml error: {}", err),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Yaml(err)
    }
}

pub fn config_path_from_env() -> PathBuf {
    match env::var("SONGBOOK_CONFIG") {
        Ok(value) if !value.trim().is_empty() => PathBuf::from(value),
        _ => default_config_path(),
    }
}

fn default_config_path() -> PathBuf {
    match env::current_exe() {
        Ok(exe) => exe
            .parent()
            .map(|dir| dir.join("config.yaml"))
            .unwrap_or_else(|| PathBuf::from("config.yaml")),
        Err(_) => PathBuf::from("config.yaml"),
    }
}

/// Loads the YAML file at `path` if present, then applies the process
/// environment. Returns whether a file was read.
pub fn load_config(path: &Path) -> Result<(ServerConfig, bool), ConfigError> {
    let (mut config, from_file) = if path.exists() {
        let contents = fs::read_to_string(path)?;
        (serde_yaml::from_str::<ServerConfig>(&contents)?, true)
    } else {
        (ServerConfig::default(), false)
    };
    apply_env_overrides(&mut config, env::vars());
    if config.port == 0 {
        config.port = DEFAULT_PORT;
    }
    if config.playlist_cache_dir.trim().is_empty() {
        config.playlist_cache_dir = "playlist_cache".to_string();
    }
    Ok((config, from_file))
}

pub fn apply_env_overrides<I>(config: &mut ServerConfig, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: Vec<(String, String)> = vars.into_iter().collect();
    let roots = song_roots_from_vars(vars.iter().cloned());
    if !roots.is_empty() {
        config.song_roots = roots;
    }

    for (key, value) in vars {
        if key.starts_with(SONG_ROOT_VAR) {
            continue;
        }
        let value = value.trim().to_string();
        match key.as_str() {
            "PLAYLIST_CACHE_DIR_PATH" if !value.is_empty() => config.playlist_cache_dir = value,
            "SPOTIFY_CLIENT_ID" => config.spotify_client_id = value,
            "SPOTIFY_CLIENT_SECRET" => config.spotify_client_secret = value,
            "ULTRA_STAR_COMPANION_PORT" if !value.is_empty() => match value.parse::<u16>() {
                Ok(port) => config.companion_port = Some(port),
                Err(_) => warn!("Ignoring invalid ULTRA_STAR_COMPANION_PORT {:?}", value),
            },
            "PORT" if !value.is_empty() => match value.parse::<u16>() {
                Ok(port) => config.port = port,
                Err(_) => warn!("Ignoring invalid PORT {:?}", value),
            },
            "SONGBOOK_INDEX_MODE" if !value.is_empty() => match IndexPolicy::from_name(&value) {
                Some(policy) => config.index_mode = policy,
                None => warn!("Ignoring unknown SONGBOOK_INDEX_MODE {:?}", value),
            },
            "SONGBOOK_INDEX_WORKERS" if !value.is_empty() => match value.parse::<usize>() {
                Ok(workers) => config.index_workers = workers,
                Err(_) => warn!("Ignoring invalid SONGBOOK_INDEX_WORKERS {:?}", value),
            },
            _ => {}
        }
    }
}

/// Maps `LOG_LEVEL` to a tracing filter directive.
pub fn log_level_directive(value: &str) -> Option<&'static str> {
    match value.trim() {
        "DEBUG" => Some("debug"),
        "INFO" => Some("info"),
        "WARN" => Some("warn"),
        "ERROR" => Some("error"),
        _ => None,
    }
}

pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let raw = PathBuf::from(value);
    if raw.is_absolute() {
        return raw;
    }
    let base = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    base.join(raw)
}

pub fn resolve_song_roots(config_path: &Path, config: &ServerConfig) -> Vec<PathBuf> {
    config
        .song_roots
        .iter()
        .map(|root| root.trim())
        .filter(|root| !root.is_empty())
        .map(|root| resolve_path(config_path, root))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn numbered_roots_sort_numerically() {
        let mut config = ServerConfig::default();
        apply_env_overrides(
            &mut config,
            vars(&[
                ("ULTRA_START_SONGS_DIR_PATH10", "/ten"),
                ("ULTRA_START_SONGS_DIR_PATH2", "/two"),
                ("ULTRA_START_SONGS_DIR_PATH1", "/one"),
                ("ULTRA_START_SONGS_DIR_PATHX", "/ignored"),
                ("ULTRA_START_SONGS_DIR_PATH3", ""),
            ]),
        );
        assert_eq!(config.song_roots, vec!["/one", "/two", "/ten"]);
    }

    #[test]
    fn plain_root_is_appended_once() {
        let mut config = ServerConfig::default();
        apply_env_overrides(
            &mut config,
            vars(&[
                ("ULTRA_START_SONGS_DIR_PATH", "/songs"),
                ("ULTRA_START_SONGS_DIR_PATH1", "/songs"),
            ]),
        );
        assert_eq!(config.song_roots, vec!["/songs"]);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config: ServerConfig = serde_yaml::from_str(
            "song_roots: [/from/file]\nport: 8080\nindex_mode: replace_on_change\n",
        )
        .unwrap();
        assert_eq!(config.index_mode, IndexPolicy::ReplaceOnChange);
        apply_env_overrides(
            &mut config,
            vars(&[
                ("PORT", "4000"),
                ("PLAYLIST_CACHE_DIR_PATH", "/cache"),
                ("SPOTIFY_CLIENT_ID", "id"),
                ("SPOTIFY_CLIENT_SECRET", "secret"),
                ("ULTRA_STAR_COMPANION_PORT", "5123"),
                ("SONGBOOK_INDEX_MODE", "additive"),
                ("SONGBOOK_INDEX_WORKERS", "3"),
            ]),
        );
        assert_eq!(config.song_roots, vec!["/from/file"]);
        assert_eq!(config.port, 4000);
        assert_eq!(config.playlist_cache_dir, "/cache");
        assert!(config.has_spotify_credentials());
        assert_eq!(config.companion_port, Some(5123));
        assert_eq!(config.index_mode, IndexPolicy::Additive);
        assert_eq!(config.index_workers, 3);
    }

    #[test]
    fn invalid_numbers_are_ignored() {
        let mut config = ServerConfig::default();
        apply_env_overrides(
            &mut config,
            vars(&[("PORT", "http"), ("ULTRA_STAR_COMPANION_PORT", "99999")]),
        );
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.companion_port, None);
        assert!(!config.has_spotify_credentials());
    }

    #[test]
    fn log_levels_map_to_directives() {
        assert_eq!(log_level_directive("DEBUG"), Some("debug"));
        assert_eq!(log_level_directive("ERROR"), Some("error"));
        assert_eq!(log_level_directive("verbose"), None);
    }

    #[test]
    fn relative_roots_resolve_against_config_dir() {
        let config = ServerConfig {
            song_roots: vec!["songs".to_string(), "/abs".to_string(), " ".to_string()],
            ..ServerConfig::default()
        };
        let roots = resolve_song_roots(Path::new("/etc/songbook/config.yaml"), &config);
        assert_eq!(
            roots,
            vec![PathBuf::from("/etc/songbook/songs"), PathBuf::from("/abs")]
        );
    }

    #[test]
    fn missing_file_uses_defaults() {
        let tmp = tempfile::TempDir::new().unwrap();
        let (config, from_file) = load_config(&tmp.path().join("nope.yaml")).unwrap();
        assert!(!from_file);
        assert_ne!(config.port, 0);
        assert!(!config.playlist_cache_dir.is_empty());
    }
}
