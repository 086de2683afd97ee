//! Server configuration: the environment inputs the core consumes
//! from its external collaborators (the wire layer, auth handshake,
//! and operator-facing CLI), loaded as a `serde`-derived struct of
//! `Option<T>` fields with accessor methods supplying defaults, read
//! directly from YAML with no indirection layer on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_derive::{Deserialize, Serialize};

use guocedb_storage::storage::EngineKind;
use guocedb_storage::txn::IsolationLevel;

pub const DEFAULT_PROMPT: &str = "guocedb";
const DEFAULT_DATA_DIR: &str = "data/guocedb";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3306;

/// Mirrors the four SQL isolation levels in a
/// config-file-friendly shape; `to_isolation_level` maps it onto
/// `guocedb_storage::txn::IsolationLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationLevelConfig {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevelConfig {
    pub fn to_isolation_level(self) -> IsolationLevel {
        match self {
            IsolationLevelConfig::ReadUncommitted => IsolationLevel::ReadUncommitted,
            IsolationLevelConfig::ReadCommitted => IsolationLevel::ReadCommitted,
            IsolationLevelConfig::RepeatableRead => IsolationLevel::RepeatableRead,
            IsolationLevelConfig::Serializable => IsolationLevel::Serializable,
        }
    }
}

impl Default for IsolationLevelConfig {
    fn default() -> Self {
        IsolationLevelConfig::RepeatableRead
    }
}

/// Authentication policy: disabled entirely, or enabled with a root
/// password the native-password handshake would check — the
/// handshake itself is the wire layer's job, this crate only carries
/// the policy the dispatcher's access check consults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub enabled: bool,
    pub root_password: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig { enabled: false, root_password: None }
    }
}

/// Root of the server's configuration, loaded from a YAML file at
/// startup (`ServerConfig::load`) with every field optional so a
/// partial file only overrides what it names; call sites read through
/// the `get_*`/`is_*` accessors rather than the raw fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    version: u8,

    /// Host/port a wire front-end would bind to. The core only carries
    /// these through; it does not open a socket itself.
    host: Option<String>,
    port: Option<u16>,

    /// Directory the storage engine persists its data under.
    data_dir: Option<PathBuf>,

    /// Which `Engine` implementation backs the server.
    engine: Option<EngineKind>,

    /// Maximum concurrent client sessions.
    max_connections: Option<u32>,

    /// Per-statement deadline, in milliseconds.
    statement_timeout_ms: Option<u64>,
    /// Per-connection deadline, in milliseconds.
    connection_timeout_ms: Option<u64>,

    auth: Option<AuthConfig>,
    default_isolation: Option<IsolationLevelConfig>,

    /// Default session autocommit setting.
    autocommit: Option<bool>,

    /// REPL prompt.
    pub prompt: Option<String>,
    /// Show stats after executing queries. Only works in non-interactive mode.
    pub show_stats: Option<bool>,
    /// Show rows-affected after a statement, REPL only.
    pub show_affected: Option<bool>,
    /// Multi line mode, default true.
    pub multi_line: Option<bool>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            version: 1,
            host: None,
            port: None,
            data_dir: None,
            engine: None,
            max_connections: None,
            statement_timeout_ms: None,
            connection_timeout_ms: None,
            auth: None,
            default_isolation: None,
            autocommit: None,
            prompt: Some(DEFAULT_PROMPT.to_string()),
            show_stats: Some(false),
            show_affected: Some(true),
            multi_line: Some(true),
        }
    }
}

impl ServerConfig {
    /// Loads configuration from a YAML file, falling back to defaults
    /// when the file doesn't exist — a missing config file is fine.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Ok(serde_yaml::from_str(&contents)?),
            Err(_) => Ok(ServerConfig::default()),
        }
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> u16 {
        self.port.unwrap_or(DEFAULT_PORT)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
    }

    pub fn engine_kind(&self) -> EngineKind {
        self.engine.unwrap_or(EngineKind::LogCask)
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections.unwrap_or(151)
    }

    pub fn statement_timeout(&self) -> Option<Duration> {
        self.statement_timeout_ms.map(Duration::from_millis)
    }

    pub fn connection_timeout(&self) -> Option<Duration> {
        self.connection_timeout_ms.map(Duration::from_millis)
    }

    pub fn auth(&self) -> AuthConfig {
        self.auth.clone().unwrap_or_default()
    }

    pub fn default_isolation(&self) -> IsolationLevelConfig {
        self.default_isolation.unwrap_or_default()
    }

    pub fn default_autocommit(&self) -> bool {
        self.autocommit.unwrap_or(true)
    }

    pub fn is_show_affected(&self) -> bool {
        self.show_affected.unwrap_or(true)
    }

    /// Applied when the REPL detects an interactive terminal.
    pub fn terminal_update(&mut self) {
        self.show_stats = Some(true);
        self.show_affected = Some(true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_usable_without_a_config_file() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host(), DEFAULT_HOST);
        assert_eq!(cfg.port(), DEFAULT_PORT);
        assert_eq!(cfg.engine_kind(), EngineKind::LogCask);
        assert!(cfg.default_autocommit());
        assert_eq!(cfg.default_isolation().to_isolation_level(), IsolationLevel::RepeatableRead);
    }

    #[test]
    fn load_falls_back_to_defaults_when_file_is_missing() -> anyhow::Result<()> {
        let cfg = ServerConfig::load("/nonexistent/path/guocedb.yaml")?;
        assert_eq!(cfg.port(), DEFAULT_PORT);
        Ok(())
    }

    #[test]
    fn load_reads_a_yaml_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("guocedb.yaml");
        std::fs::write(&path, "port: 4406\ndata_dir: /var/lib/guocedb\nengine: Memory\n")?;
        let cfg = ServerConfig::load(&path)?;
        assert_eq!(cfg.port(), 4406);
        assert_eq!(cfg.engine_kind(), EngineKind::Memory);
        Ok(())
    }
}
