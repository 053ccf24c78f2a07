use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_POLL_MS: u64 = 500;

pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub identity_path: PathBuf,
    pub poll_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os("MACROLOG_DATA_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => ProjectDirs::from("", "", "macrolog")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        let poll_interval = parse_poll_ms(std::env::var("MACROLOG_POLL_MS").ok().as_deref())?;
        Self::in_dir(data_dir, poll_interval)
    }

    fn in_dir(data_dir: PathBuf, poll_interval: Duration) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        Ok(Config {
            db_path: data_dir.join("macrolog.db"),
            identity_path: data_dir.join("identity"),
            data_dir,
            poll_interval,
        })
    }

    /// Load the API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)`.
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        tracing::info!(path = %path.display(), "generated new API key");
        Ok((key, true))
    }
}

fn parse_poll_ms(raw: Option<&str>) -> Result<Duration> {
    let Some(raw) = raw else {
        return Ok(Duration::from_millis(DEFAULT_POLL_MS));
    };
    let ms: u64 = raw
        .trim()
        .parse()
        .with_context(|| format!("Invalid MACROLOG_POLL_MS '{raw}'. Use milliseconds"))?;
    Ok(Duration::from_millis(ms.max(1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_interval_default() {
        assert_eq!(parse_poll_ms(None).unwrap(), Duration::from_millis(500));
    }

    #[test]
    fn test_poll_interval_override() {
        assert_eq!(parse_poll_ms(Some("250")).unwrap(), Duration::from_millis(250));
        assert_eq!(parse_poll_ms(Some("0")).unwrap(), Duration::from_millis(1));
        assert!(parse_poll_ms(Some("fast")).is_err());
    }

    #[test]
    fn test_paths_live_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("nested");
        let config = Config::in_dir(data_dir.clone(), Duration::from_millis(500)).unwrap();
        assert!(data_dir.is_dir());
        assert_eq!(config.db_path, data_dir.join("macrolog.db"));
        assert_eq!(config.identity_path, data_dir.join("identity"));
    }

    #[test]
    fn test_api_key_is_stable() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::in_dir(dir.path().to_path_buf(), Duration::from_millis(500)).unwrap();

        let (key, created) = config.load_or_create_api_key().unwrap();
        assert!(created);
        assert_eq!(key.len(), 64);

        let (again, created) = config.load_or_create_api_key().unwrap();
        assert!(!created);
        assert_eq!(again, key);
    }
}
