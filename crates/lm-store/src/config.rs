//! On-disk layout and TOML configuration.
//!
//! ```toml
//! [decay]
//! active_rate = 0.0001
//!
//! [lifecycle]
//! dormancy_threshold = 0.15
//! ```
//!
//! Sections mirror `lm_core::MemoryConfig`; anything omitted keeps its default.

use std::path::{Path, PathBuf};
use std::{env, fs};

use lm_core::MemoryConfig;

use crate::error::Result;

pub const DATA_DIR_ENV: &str = "LM_DATA_DIR";
pub const CONFIG_FILE: &str = "config.toml";
pub const DB_FILE: &str = "memory.db";

fn dirs_home() -> PathBuf {
    env::var("HOME")
        .or_else(|_| env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

pub fn default_data_dir() -> PathBuf {
    dirs_home().join(".liquidity-memory")
}

/// `--data-dir` flag, then `LM_DATA_DIR`, then `~/.liquidity-memory`.
pub fn resolve_data_dir(flag: Option<&Path>) -> PathBuf {
    pick_data_dir(flag, env::var(DATA_DIR_ENV).ok())
}

fn pick_data_dir(flag: Option<&Path>, from_env: Option<String>) -> PathBuf {
    if let Some(dir) = flag {
        return dir.to_path_buf();
    }
    match from_env {
        Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
        _ => default_data_dir(),
    }
}

/// Create the data directory if needed and return the database path inside it.
pub fn ensure_db_path(data_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(data_dir)?;
    Ok(data_dir.join(DB_FILE))
}

pub fn default_config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Read a TOML config. A missing file yields the defaults; a malformed one
/// is an error.
pub fn load_config(path: &Path) -> Result<MemoryConfig> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(MemoryConfig::default());
    }
    let text = fs::read_to_string(path)?;
    parse_config(&text)
}

pub fn parse_config(text: &str) -> Result<MemoryConfig> {
    Ok(toml::from_str(text)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use lm_core::{DecayConfig, SequenceConfig};

    #[test]
    fn test_flag_wins() {
        let dir = pick_data_dir(Some(Path::new("/tmp/a")), Some("/tmp/b".into()));
        assert_eq!(dir, PathBuf::from("/tmp/a"));
    }

    #[test]
    fn test_env_before_home() {
        let dir = pick_data_dir(None, Some("/tmp/b".into()));
        assert_eq!(dir, PathBuf::from("/tmp/b"));
    }

    #[test]
    fn test_blank_env_falls_back() {
        let dir = pick_data_dir(None, Some("  ".into()));
        assert!(dir.ends_with(".liquidity-memory"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(cfg, MemoryConfig::default());
    }

    #[test]
    fn test_partial_toml() {
        let cfg = parse_config(
            r#"
            [decay]
            active_rate = 0.0002

            [lifecycle]
            dormancy_threshold = 0.2
            "#,
        )
        .unwrap();
        assert_eq!(cfg.decay.active_rate, 0.0002);
        assert_eq!(
            cfg.decay.dormant_divisor,
            DecayConfig::default().dormant_divisor
        );
        assert_eq!(cfg.lifecycle.dormancy_threshold, 0.2);
        assert_eq!(cfg.sequence, SequenceConfig::default());
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[decay\nactive_rate = ").unwrap();
        assert!(matches!(load_config(&path), Err(StoreError::Toml(_))));
    }

    #[test]
    fn test_ensure_db_path_creates_dir() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let db = ensure_db_path(&nested).unwrap();
        assert!(nested.is_dir());
        assert_eq!(db, nested.join(DB_FILE));
    }
}
