use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

// ── Top-level config ──────────────────────────────────────────────

/// Top-level wamedia configuration, loaded from `config.toml`.
///
/// Resolution order: `WAMEDIA_CONFIG_DIR` env → `~/.wamedia/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to config.toml - computed at load time, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    /// WhatsApp Cloud API credentials and endpoints (`[whatsapp]`).
    #[serde(default)]
    pub whatsapp: WhatsAppConfig,

    /// Media storage layout (`[storage]`).
    #[serde(default)]
    pub storage: StorageConfig,

    /// Media acquisition timeouts and limits (`[acquire]`).
    #[serde(default)]
    pub acquire: AcquireConfig,

    /// Webhook gateway bind address (`[gateway]`).
    #[serde(default)]
    pub gateway: GatewayConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: PathBuf::new(),
            whatsapp: WhatsAppConfig::default(),
            storage: StorageConfig::default(),
            acquire: AcquireConfig::default(),
            gateway: GatewayConfig::default(),
        }
    }
}

// ── WhatsApp platform ────────────────────────────────────────────

/// WhatsApp Cloud API configuration (`[whatsapp]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API. Overridden by `WAMEDIA_ACCESS_TOKEN`
    /// or `ACCESS_TOKEN` env vars.
    #[serde(default)]
    pub access_token: String,
    /// Business phone number id used for the send/messages endpoint.
    #[serde(default)]
    pub phone_number_id: String,
    /// Shared secret echoed during the webhook verification handshake.
    #[serde(default)]
    pub verify_token: String,
    /// Graph API version segment (default: v21.0).
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Base URL override for the Graph API. Intended for tests and local
    /// mock servers; leave unset in production.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

fn default_api_version() -> String {
    "v21.0".into()
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            verify_token: String::new(),
            api_version: default_api_version(),
            api_base_url: None,
        }
    }
}

// ── Storage ──────────────────────────────────────────────────────

/// Media storage configuration (`[storage]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage root. Media lands under `{root}/{category}/`. Supports `~`.
    #[serde(default = "default_storage_root")]
    pub root: String,
}

fn default_storage_root() -> String {
    "~/.wamedia/media".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}

impl StorageConfig {
    /// Tilde-expanded storage root.
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.root).into_owned())
    }
}

// ── Acquisition ──────────────────────────────────────────────────

/// Media acquisition configuration (`[acquire]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquireConfig {
    /// Timeout for the media-metadata call (seconds). Default: 10.
    #[serde(default = "default_metadata_timeout_secs")]
    pub metadata_timeout_secs: u64,
    /// Timeout for the binary download (seconds). Default: 30.
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
    /// Extra attempts for the metadata call only. The binary fetch is never
    /// retried automatically: the download URL may be single-use. Default: 0.
    #[serde(default)]
    pub metadata_retries: u32,
    /// Hard cap on downloaded media size in bytes. Default: 100 MiB.
    #[serde(default = "default_max_download_bytes")]
    pub max_download_bytes: u64,
}

fn default_metadata_timeout_secs() -> u64 {
    10
}

fn default_download_timeout_secs() -> u64 {
    30
}

fn default_max_download_bytes() -> u64 {
    100 * 1024 * 1024
}

impl Default for AcquireConfig {
    fn default() -> Self {
        Self {
            metadata_timeout_secs: default_metadata_timeout_secs(),
            download_timeout_secs: default_download_timeout_secs(),
            metadata_retries: 0,
            max_download_bytes: default_max_download_bytes(),
        }
    }
}

// ── Gateway ──────────────────────────────────────────────────────

/// Webhook gateway configuration (`[gateway]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway host (default: 127.0.0.1)
    #[serde(default = "default_gateway_host")]
    pub host: String,
    /// Gateway port (default: 8000)
    #[serde(default = "default_gateway_port")]
    pub port: u16,
}

fn default_gateway_host() -> String {
    "127.0.0.1".into()
}

fn default_gateway_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_gateway_host(),
            port: default_gateway_port(),
        }
    }
}

// ── Lifecycle ────────────────────────────────────────────────────

fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("WAMEDIA_CONFIG_DIR") {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(shellexpand::tilde(&dir).into_owned()));
        }
    }
    let user_dirs = UserDirs::new().context("Could not determine home directory")?;
    Ok(user_dirs.home_dir().join(".wamedia"))
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let dir = config_dir()?;
        let config_path = dir.join("config.toml");

        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let mut config = if config_path.exists() {
            // Warn if config file is world-readable (contains the API token)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = fs::metadata(&config_path).await {
                    if meta.permissions().mode() & 0o004 != 0 {
                        tracing::warn!(
                            "Config file {:?} is world-readable (mode {:o}). \
                             Consider restricting with: chmod 600 {:?}",
                            config_path,
                            meta.permissions().mode() & 0o777,
                            config_path,
                        );
                    }
                }
            }

            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path;
            config
        } else {
            let mut config = Config::default();
            config.config_path = config_path;
            config.save().await?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        tracing::info!(
            path = %config.config_path.display(),
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    ///
    /// Called after TOML deserialization and env-override application to
    /// catch obviously invalid values early instead of failing at arbitrary
    /// runtime points.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.host.trim().is_empty() {
            anyhow::bail!("gateway.host must not be empty");
        }
        if self.whatsapp.api_version.trim().is_empty() {
            anyhow::bail!("whatsapp.api_version must not be empty");
        }
        if self.acquire.metadata_timeout_secs == 0 {
            anyhow::bail!("acquire.metadata_timeout_secs must be greater than 0");
        }
        if self.acquire.download_timeout_secs == 0 {
            anyhow::bail!("acquire.download_timeout_secs must be greater than 0");
        }
        if self.acquire.max_download_bytes == 0 {
            anyhow::bail!("acquire.max_download_bytes must be greater than 0");
        }
        if self.storage.root.trim().is_empty() {
            anyhow::bail!("storage.root must not be empty");
        }
        Ok(())
    }

    /// Additional checks for commands that talk to the platform.
    pub fn validate_credentials(&self) -> Result<()> {
        if self.whatsapp.access_token.trim().is_empty() {
            anyhow::bail!(
                "whatsapp.access_token is not set; add it to {} or export ACCESS_TOKEN",
                self.config_path.display()
            );
        }
        if self.whatsapp.phone_number_id.trim().is_empty() {
            anyhow::bail!(
                "whatsapp.phone_number_id is not set; add it to {} or export PHONE_NUMBER_ID",
                self.config_path.display()
            );
        }
        if self.whatsapp.verify_token.trim().is_empty() {
            anyhow::bail!(
                "whatsapp.verify_token is not set; add it to {} or export VERIFY_TOKEN",
                self.config_path.display()
            );
        }
        Ok(())
    }

    /// Apply environment variable overrides to config. The `WAMEDIA_*`
    /// names win; the generic fallbacks match the platform's conventional
    /// env names.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(token) =
            std::env::var("WAMEDIA_ACCESS_TOKEN").or_else(|_| std::env::var("ACCESS_TOKEN"))
        {
            if !token.is_empty() {
                self.whatsapp.access_token = token;
            }
        }

        if let Ok(id) =
            std::env::var("WAMEDIA_PHONE_NUMBER_ID").or_else(|_| std::env::var("PHONE_NUMBER_ID"))
        {
            if !id.is_empty() {
                self.whatsapp.phone_number_id = id;
            }
        }

        if let Ok(token) =
            std::env::var("WAMEDIA_VERIFY_TOKEN").or_else(|_| std::env::var("VERIFY_TOKEN"))
        {
            if !token.is_empty() {
                self.whatsapp.verify_token = token;
            }
        }

        if let Ok(version) =
            std::env::var("WAMEDIA_API_VERSION").or_else(|_| std::env::var("VERSION"))
        {
            if !version.is_empty() {
                self.whatsapp.api_version = version;
            }
        }

        if let Ok(root) = std::env::var("WAMEDIA_STORAGE_ROOT") {
            if !root.is_empty() {
                self.storage.root = root;
            }
        }

        if let Ok(port_str) =
            std::env::var("WAMEDIA_GATEWAY_PORT").or_else(|_| std::env::var("PORT"))
        {
            if let Ok(port) = port_str.parse::<u16>() {
                self.gateway.port = port;
            }
        }

        if let Ok(host) = std::env::var("WAMEDIA_GATEWAY_HOST").or_else(|_| std::env::var("HOST"))
        {
            if !host.is_empty() {
                self.gateway.host = host;
            }
        }
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        if let Err(err) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(err).with_context(|| {
                format!("Failed to replace config file: {}", self.config_path.display())
            });
        }

        // Restrict permissions; the file carries the API token.
        #[cfg(unix)]
        {
            use std::{fs::Permissions, os::unix::fs::PermissionsExt};
            let _ = fs::set_permissions(&self.config_path, Permissions::from_mode(0o600)).await;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.whatsapp.api_version, "v21.0");
        assert_eq!(config.acquire.metadata_timeout_secs, 10);
        assert_eq!(config.acquire.download_timeout_secs, 30);
        assert_eq!(config.acquire.metadata_retries, 0);
        assert_eq!(config.gateway.port, 8000);
    }

    #[test]
    fn default_config_lacks_credentials() {
        assert!(Config::default().validate_credentials().is_err());
    }

    #[test]
    fn toml_round_trip_preserves_settings() {
        let mut config = Config::default();
        config.whatsapp.access_token = "secret".to_string();
        config.whatsapp.phone_number_id = "12345".to_string();
        config.storage.root = "/data/media".to_string();
        config.acquire.metadata_retries = 2;

        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.whatsapp.access_token, "secret");
        assert_eq!(parsed.whatsapp.phone_number_id, "12345");
        assert_eq!(parsed.storage.root, "/data/media");
        assert_eq!(parsed.acquire.metadata_retries, 2);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let parsed: Config = toml::from_str(
            r#"
            [whatsapp]
            access_token = "tok"
            "#,
        )
        .unwrap();
        assert_eq!(parsed.whatsapp.access_token, "tok");
        assert_eq!(parsed.whatsapp.api_version, "v21.0");
        assert_eq!(parsed.gateway.host, "127.0.0.1");
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config = Config::default();
        config.acquire.download_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_host_is_rejected() {
        let mut config = Config::default();
        config.gateway.host = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn storage_root_expands_tilde() {
        let storage = StorageConfig {
            root: "~/media".to_string(),
        };
        let path = storage.root_path();
        assert!(!path.to_string_lossy().contains('~'));
        assert!(path.ends_with("media"));
    }

    #[test]
    fn env_overrides_take_precedence() {
        std::env::set_var("WAMEDIA_ACCESS_TOKEN", "env-token");
        std::env::set_var("WAMEDIA_GATEWAY_PORT", "9001");

        let mut config = Config::default();
        config.whatsapp.access_token = "file-token".to_string();
        config.apply_env_overrides();

        assert_eq!(config.whatsapp.access_token, "env-token");
        assert_eq!(config.gateway.port, 9001);

        std::env::remove_var("WAMEDIA_ACCESS_TOKEN");
        std::env::remove_var("WAMEDIA_GATEWAY_PORT");
    }
}
