//! Configuration management for lxc-local.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over the .env file.

use std::collections::HashMap;
use std::path::PathBuf;

/// Compat level of the LXC configuration schema this build emits.
pub const DEFAULT_COMPAT_LEVEL: u32 = 5;

/// Hook directory baked in at build time.
pub const DEFAULT_HOOK_DIR: &str = match option_env!("LXC_HOOK_DIR") {
    Some(dir) => dir,
    None => "/usr/share/lxc/hooks",
};

/// Template configuration directory baked in at build time.
pub const DEFAULT_TEMPLATE_CONFIG: &str = match option_env!("LXC_TEMPLATE_CONFIG") {
    Some(dir) => dir,
    None => "/usr/share/lxc/config",
};

/// lxc-local configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Directory holding LXC hook scripts (substituted for `LXC_HOOK_DIR`)
    pub hook_dir: PathBuf,
    /// Directory holding shared LXC config snippets (substituted for `LXC_TEMPLATE_CONFIG`)
    pub template_config: PathBuf,
    /// Metadata compat level preferred by the file resolver
    pub compat_level: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hook_dir: PathBuf::from(DEFAULT_HOOK_DIR),
            template_config: PathBuf::from(DEFAULT_TEMPLATE_CONFIG),
            compat_level: DEFAULT_COMPAT_LEVEL,
        }
    }
}

impl Config {
    /// Load configuration from .env file and environment.
    pub fn load() -> Self {
        let mut env_vars = HashMap::new();

        // .env values first, so the real environment overrides them
        if let Ok(iter) = dotenvy::dotenv_iter() {
            for (key, value) in iter.flatten() {
                env_vars.insert(key, value);
            }
        }

        for (key, value) in std::env::vars() {
            env_vars.insert(key, value);
        }

        Self::from_vars(&env_vars)
    }

    /// Build config from an explicit variable map, applying defaults.
    pub fn from_vars(env_vars: &HashMap<String, String>) -> Self {
        let defaults = Self::default();

        let hook_dir = env_vars
            .get("LXC_LOCAL_HOOK_DIR")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.hook_dir);

        let template_config = env_vars
            .get("LXC_LOCAL_TEMPLATE_CONFIG")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.template_config);

        let compat_level = match env_vars.get("LXC_LOCAL_COMPAT_LEVEL") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(level) => level,
                Err(_) => {
                    tracing::warn!(
                        "Ignoring LXC_LOCAL_COMPAT_LEVEL={:?}: not a number, using {}",
                        raw,
                        defaults.compat_level
                    );
                    defaults.compat_level
                }
            },
            None => defaults.compat_level,
        };

        Self {
            hook_dir,
            template_config,
            compat_level,
        }
    }

    /// Log configuration for debugging.
    pub fn log(&self) {
        tracing::debug!("Configuration:");
        tracing::debug!("  LXC_LOCAL_HOOK_DIR: {}", self.hook_dir.display());
        tracing::debug!(
            "  LXC_LOCAL_TEMPLATE_CONFIG: {}",
            self.template_config.display()
        );
        tracing::debug!("  LXC_LOCAL_COMPAT_LEVEL: {}", self.compat_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(&HashMap::new());
        assert_eq!(config, Config::default());
        assert_eq!(config.compat_level, 5);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(&vars(&[
            ("LXC_LOCAL_HOOK_DIR", "/opt/lxc/hooks"),
            ("LXC_LOCAL_TEMPLATE_CONFIG", "/opt/lxc/config"),
            ("LXC_LOCAL_COMPAT_LEVEL", "6"),
        ]));
        assert_eq!(config.hook_dir, PathBuf::from("/opt/lxc/hooks"));
        assert_eq!(config.template_config, PathBuf::from("/opt/lxc/config"));
        assert_eq!(config.compat_level, 6);
    }

    #[test]
    fn test_bad_compat_level_falls_back() {
        let config = Config::from_vars(&vars(&[("LXC_LOCAL_COMPAT_LEVEL", "five")]));
        assert_eq!(config.compat_level, DEFAULT_COMPAT_LEVEL);
    }

    #[test]
    fn test_empty_dirs_use_defaults() {
        let config = Config::from_vars(&vars(&[("LXC_LOCAL_HOOK_DIR", "")]));
        assert_eq!(config.hook_dir, PathBuf::from(DEFAULT_HOOK_DIR));
    }
}
