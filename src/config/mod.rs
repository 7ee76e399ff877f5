use std::env;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::Serialize;

/// Values read from `config.yml`. Anything left out falls back to the
/// command line or the built-in default.
#[derive(Debug, Default, Deserialize, Serialize, Clone, PartialEq)]
pub struct ConfigFile {
    #[serde(alias = "url")]
    pub base_url: Option<String>,
    #[serde(alias = "token")]
    pub api_token: Option<String>,
    pub timeout: Option<u64>,
    pub proxy: Option<String>,
    pub delay: Option<u32>,
    pub debounce_ms: Option<u64>,
    pub poll_interval: Option<u64>,
    pub no_color: Option<bool>,
    pub output_format: Option<String>,
}

fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("USERPROFILE").map(PathBuf::from))
        .or_else(|| {
            let drive = env::var_os("HOMEDRIVE")?;
            let path = env::var_os("HOMEPATH")?;
            Some(PathBuf::from(drive).join(path))
        })
}

pub fn default_config_path() -> Option<PathBuf> {
    Some(home_dir()?.join(".prospectlab").join("config.yml"))
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        if let Some(home) = home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

pub fn parse_config(contents: &str, origin: &Path) -> Result<ConfigFile, String> {
    // an all-comment file deserializes as null
    if contents.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with('#')
    }) {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str::<ConfigFile>(contents)
        .map_err(|e| format!("failed to parse config '{}': {e}", origin.display()))
}

pub fn load_config(path: &Path, allow_missing: bool) -> Result<ConfigFile, String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents, path),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && allow_missing => {
            Ok(ConfigFile::default())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(format!("config file not found '{}'", path.display()))
        }
        Err(e) => Err(format!("failed to read config '{}': {e}", path.display())),
    }
}

fn default_config_yaml() -> String {
    r#"# ProspectLab client config
#
# Location (default):
#   ~/.prospectlab/config.yml

# Server
base_url: http://127.0.0.1:5000
# api_token: changeme
timeout: 10
# proxy: http://127.0.0.1:8080

# Campaigns
# Seconds between two emails of the same campaign.
delay: 2

# Milliseconds to wait after the last criteria edit before reloading.
debounce_ms: 500

# Seconds between two refreshes of `results --follow`.
poll_interval: 5

# Output
output_format: text
no_color: false
"#
    .to_string()
}

/// Writes the commented default config to `path` unless something is
/// already there. Returns whether a file was created.
pub fn ensure_default_config_file(path: &Path) -> Result<bool, String> {
    if path.exists() {
        return Ok(false);
    }
    let parent = path
        .parent()
        .ok_or_else(|| format!("invalid config path '{}'", path.display()))?;
    std::fs::create_dir_all(parent).map_err(|e| {
        format!(
            "failed to create config directory '{}': {e}",
            parent.display()
        )
    })?;
    std::fs::write(path, default_config_yaml())
        .map_err(|e| format!("failed to write config file '{}': {e}", path.display()))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_file_parses_to_builtin_values() {
        let cfg = parse_config(&default_config_yaml(), Path::new("default")).unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://127.0.0.1:5000"));
        assert_eq!(cfg.timeout, Some(10));
        assert_eq!(cfg.delay, Some(2));
        assert_eq!(cfg.debounce_ms, Some(500));
        assert_eq!(cfg.poll_interval, Some(5));
        assert_eq!(cfg.api_token, None);
        assert_eq!(cfg.no_color, Some(false));
    }

    #[test]
    fn comment_only_file_is_empty() {
        let cfg = parse_config("# nothing\n\n", Path::new("x")).unwrap();
        assert_eq!(cfg, ConfigFile::default());
    }

    #[test]
    fn aliases_and_errors() {
        let cfg = parse_config("url: http://crm.local\ntoken: abc\n", Path::new("x")).unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://crm.local"));
        assert_eq!(cfg.api_token.as_deref(), Some("abc"));

        let err = parse_config("timeout: soon\n", Path::new("bad.yml")).unwrap_err();
        assert!(err.contains("bad.yml"));
    }

    #[test]
    fn missing_file_handling() {
        let path = env::temp_dir().join("prospectlab-missing-config.yml");
        let _ = std::fs::remove_file(&path);
        assert_eq!(load_config(&path, true).unwrap(), ConfigFile::default());
        assert!(load_config(&path, false).unwrap_err().contains("not found"));
    }

    #[test]
    fn ensure_writes_once() {
        let dir = env::temp_dir().join(format!("prospectlab-cfg-{}", std::process::id()));
        let path = dir.join("config.yml");
        let _ = std::fs::remove_dir_all(&dir);
        assert!(ensure_default_config_file(&path).unwrap());
        assert!(!ensure_default_config_file(&path).unwrap());
        assert_eq!(load_config(&path, false).unwrap().delay, Some(2));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tilde_paths_expand_under_home() {
        if let Some(home) = home_dir() {
            assert_eq!(expand_tilde("~/a.yml"), home.join("a.yml"));
        }
        assert_eq!(expand_tilde("/etc/a.yml"), PathBuf::from("/etc/a.yml"));
    }
}
