use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// 永続ストアの接続設定。
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// ドキュメントストアのディレクトリ。未設定ならインメモリで起動する。
    pub location: Option<PathBuf>,
    /// テスト実行中なら接続を試みずインメモリに固定する。
    pub test_mode: bool,
    pub connect_timeout: Duration,
    pub io_timeout: Duration,
}

/// API外の静的ファイル。中身には関与しない。
#[derive(Debug, Clone)]
pub struct StaticAssets {
    pub public_dir: PathBuf,
    pub index_page: PathBuf,
}

impl Default for StaticAssets {
    fn default() -> Self {
        Self {
            public_dir: PathBuf::from("public"),
            index_page: PathBuf::from("views/index.html"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub store: StoreConfig,
    pub assets: StaticAssets,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// キーから値を引く関数で設定を組み立てる。未設定のキーは既定値になる。
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let vars = Vars(lookup);
        let port = vars
            .string("PORT", "3000")
            .parse::<u16>()
            .context("PORT must be a valid port number")?;

        let location = vars
            .get("DB")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let store = StoreConfig {
            location,
            test_mode: vars.string("APP_ENV", "") == "test",
            connect_timeout: vars.millis("DB_CONNECT_TIMEOUT_MS", 5_000)?,
            io_timeout: vars.millis("DB_IO_TIMEOUT_MS", 45_000)?,
        };

        Ok(Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)),
            store,
            assets: StaticAssets {
                public_dir: PathBuf::from(vars.string("PUBLIC_DIR", "public")),
                index_page: PathBuf::from(vars.string("INDEX_PAGE", "views/index.html")),
            },
        })
    }
}

struct Vars<F>(F);

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or_else(|| default.to_string())
    }

    fn millis(&self, key: &str, default: u64) -> Result<Duration> {
        let millis = match self.get(key) {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("{key} must be a number of milliseconds"))?,
            None => default,
        };
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_addr.port(), 3000);
        assert!(config.store.location.is_none());
        assert!(!config.store.test_mode);
        assert_eq!(config.store.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.store.io_timeout, Duration::from_secs(45));
        assert_eq!(config.assets.public_dir, PathBuf::from("public"));
        assert_eq!(config.assets.index_page, PathBuf::from("views/index.html"));
    }

    #[test]
    fn store_settings_are_read() {
        let config = load(&[
            ("PORT", "8080"),
            ("DB", "/var/lib/library"),
            ("APP_ENV", "test"),
            ("DB_CONNECT_TIMEOUT_MS", "250"),
            ("DB_IO_TIMEOUT_MS", "1000"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.store.location, Some(PathBuf::from("/var/lib/library")));
        assert!(config.store.test_mode);
        assert_eq!(config.store.connect_timeout, Duration::from_millis(250));
        assert_eq!(config.store.io_timeout, Duration::from_secs(1));
    }

    #[test]
    fn blank_db_means_no_persistent_store() {
        for blank in ["", "   "] {
            let config = load(&[("DB", blank)]).unwrap();
            assert!(config.store.location.is_none());
        }
    }

    #[test]
    fn only_exact_test_env_enables_test_mode() {
        for env in ["production", "TEST", "testing"] {
            assert!(!load(&[("APP_ENV", env)]).unwrap().store.test_mode);
        }
    }

    #[test]
    fn malformed_numbers_are_rejected_with_the_key() {
        let err = load(&[("DB_CONNECT_TIMEOUT_MS", "soon")]).unwrap_err();
        assert!(err.to_string().contains("DB_CONNECT_TIMEOUT_MS"));

        let err = load(&[("DB_IO_TIMEOUT_MS", "-1")]).unwrap_err();
        assert!(err.to_string().contains("DB_IO_TIMEOUT_MS"));

        let err = load(&[("PORT", "70000")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
