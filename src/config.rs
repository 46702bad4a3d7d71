//! Process configuration from `CHAMUYO_*` environment variables

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::catalog::{Catalog, CatalogError};
use crate::store::{MemoryStore, SqliteStore, Store, StoreError};
use crate::types::GameRules;

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_DB_PATH: &str = "chamuyo.db";

/// Which storage backend holds the rooms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreKind {
    Memory,
    Sqlite(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: SocketAddr,
    pub store: StoreKind,
    /// Catalog file; the built-in catalog is used when unset
    pub catalog_path: Option<PathBuf>,
    /// Directory served for every path that is not part of the API
    pub static_dir: Option<PathBuf>,
    pub rules: GameRules,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            store: StoreKind::Memory,
            catalog_path: None,
            static_dir: None,
            rules: GameRules::default(),
        }
    }
}

fn default_bind() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 8080))
}

/// Non-empty trimmed value of an environment variable
fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl Config {
    /// Read configuration from the environment, falling back to defaults
    /// (with a warning) for anything unparseable
    pub fn from_env() -> Self {
        let bind = match env_value("CHAMUYO_BIND") {
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                tracing::warn!(value = %raw, "Invalid CHAMUYO_BIND, using {}", DEFAULT_BIND);
                default_bind()
            }),
            None => default_bind(),
        };

        let db_path = env_value("CHAMUYO_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
        let store = match env_value("CHAMUYO_STORE").as_deref() {
            None | Some("memory") => StoreKind::Memory,
            Some("sqlite") => StoreKind::Sqlite(db_path),
            Some(other) => {
                tracing::warn!(value = %other, "Unknown CHAMUYO_STORE, using memory");
                StoreKind::Memory
            }
        };

        let mut rules = GameRules::default();
        if let Some(raw) = env_value("CHAMUYO_HAND_SIZE") {
            match raw.parse::<usize>() {
                Ok(n) if n > 0 => rules.hand_size = n,
                _ => tracing::warn!(
                    value = %raw,
                    "Invalid CHAMUYO_HAND_SIZE, using {}",
                    rules.hand_size
                ),
            }
        }

        Self {
            bind,
            store,
            catalog_path: env_value("CHAMUYO_CATALOG").map(PathBuf::from),
            static_dir: env_value("CHAMUYO_STATIC_DIR").map(PathBuf::from),
            rules,
        }
    }

    pub fn load_catalog(&self) -> Result<Catalog, CatalogError> {
        match &self.catalog_path {
            Some(path) => Catalog::load(path),
            None => Catalog::builtin(),
        }
    }

    pub fn open_store(&self) -> Result<Box<dyn Store>, StoreError> {
        Ok(match &self.store {
            StoreKind::Memory => Box::new(MemoryStore::new()),
            StoreKind::Sqlite(path) => Box::new(SqliteStore::open(path)?),
        })
    }
}
