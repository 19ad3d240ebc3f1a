pub mod schema;

pub use schema::{AcquireConfig, Config, GatewayConfig, StorageConfig, WhatsAppConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reexported_config_default_is_constructible() {
        let config = Config::default();

        assert!(!config.whatsapp.api_version.is_empty());
        assert!(config.acquire.download_timeout_secs > 0);
    }
}
