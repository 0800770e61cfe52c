/// Secret provider client
///
/// Fetches the token-signing material from a Vault-style KV v2 store once at
/// startup. Whatever it returns is authoritative for the process lifetime; if
/// the provider is unreachable the service logs a warning and keeps the
/// file-based configuration.

use serde::Deserialize;

use crate::configuration::JwtSettings;

#[derive(serde::Deserialize, Clone)]
pub struct VaultSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub addr: String,
    #[serde(default)]
    pub token: String,
    #[serde(default = "default_mount")]
    pub mount: String,
    #[serde(default = "default_jwt_path")]
    pub jwt_path: String,
}

fn default_mount() -> String {
    "secret".to_string()
}

fn default_jwt_path() -> String {
    "jwt".to_string()
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: String::new(),
            token: String::new(),
            mount: default_mount(),
            jwt_path: default_jwt_path(),
        }
    }
}

/// Signing material as stored under the provider's jwt path. Every field is
/// optional; absent fields keep their configured value.
#[derive(Debug, Deserialize)]
pub struct JwtSecrets {
    pub secret_key: Option<String>,
    pub algorithm: Option<String>,
    pub access_token_expiry: Option<i64>,
    pub refresh_token_expiry: Option<i64>,
}

// KV v2 wraps the payload twice: {"data": {"data": {...}}}
#[derive(Deserialize)]
struct KvReadResponse {
    data: KvReadData,
}

#[derive(Deserialize)]
struct KvReadData {
    data: JwtSecrets,
}

#[derive(Clone)]
pub struct VaultClient {
    http_client: reqwest::Client,
    settings: VaultSettings,
}

impl VaultClient {
    pub fn new(settings: VaultSettings) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            settings,
        }
    }

    /// Read the signing material from the KV v2 mount.
    pub async fn fetch_jwt_secrets(&self) -> Result<JwtSecrets, String> {
        let url = format!(
            "{}/v1/{}/data/{}",
            self.settings.addr, self.settings.mount, self.settings.jwt_path
        );

        let response = self
            .http_client
            .get(&url)
            .header("X-Vault-Token", &self.settings.token)
            .send()
            .await
            .map_err(|e| format!("secret provider unreachable: {}", e))?
            .error_for_status()
            .map_err(|e| format!("secret provider returned error: {}", e))?;

        let body: KvReadResponse = response
            .json()
            .await
            .map_err(|e| format!("secret payload malformed: {}", e))?;

        Ok(body.data.data)
    }
}

/// Overlay provider-supplied signing material onto the configured settings.
/// Called once from `main` before the settings are handed to the server.
pub async fn load_jwt_settings(vault: &VaultSettings, jwt: &mut JwtSettings) {
    if !vault.enabled {
        tracing::info!("Secret provider disabled; using file configuration");
        return;
    }

    let client = VaultClient::new(vault.clone());

    match client.fetch_jwt_secrets().await {
        Ok(secrets) => {
            if let Some(secret_key) = secrets.secret_key {
                jwt.secret = secret_key;
            }
            if let Some(algorithm) = secrets.algorithm {
                match algorithm.parse() {
                    Ok(parsed) => jwt.algorithm = parsed,
                    Err(_) => tracing::warn!(
                        algorithm = %algorithm,
                        "Secret provider supplied unknown algorithm; keeping configured value"
                    ),
                }
            }
            if let Some(expiry) = secrets.access_token_expiry {
                jwt.access_token_expiry = expiry;
            }
            if let Some(expiry) = secrets.refresh_token_expiry {
                jwt.refresh_token_expiry = expiry;
            }
            tracing::info!("Signing material loaded from secret provider");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Secret provider fetch failed; falling back to file configuration");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kv_v2_payload_unwraps_twice() {
        let body = r#"{
            "data": {
                "data": {
                    "secret_key": "super-secret",
                    "algorithm": "HS256",
                    "access_token_expiry": 900
                }
            }
        }"#;

        let parsed: KvReadResponse = serde_json::from_str(body).unwrap();
        let secrets = parsed.data.data;

        assert_eq!(secrets.secret_key.as_deref(), Some("super-secret"));
        assert_eq!(secrets.algorithm.as_deref(), Some("HS256"));
        assert_eq!(secrets.access_token_expiry, Some(900));
        assert_eq!(secrets.refresh_token_expiry, None);
    }

    #[tokio::test]
    async fn disabled_provider_keeps_configured_settings() {
        let vault = VaultSettings::default();
        let mut jwt = crate::configuration::JwtSettings {
            secret: "configured".to_string(),
            algorithm: jsonwebtoken::Algorithm::HS256,
            access_token_expiry: 1800,
            refresh_token_expiry: 604800,
        };

        load_jwt_settings(&vault, &mut jwt).await;

        assert_eq!(jwt.secret, "configured");
        assert_eq!(jwt.access_token_expiry, 1800);
    }

    #[tokio::test]
    async fn unreachable_provider_falls_back() {
        let vault = VaultSettings {
            enabled: true,
            addr: "http://127.0.0.1:1".to_string(),
            token: "t".to_string(),
            ..Default::default()
        };
        let mut jwt = crate::configuration::JwtSettings {
            secret: "configured".to_string(),
            algorithm: jsonwebtoken::Algorithm::HS256,
            access_token_expiry: 1800,
            refresh_token_expiry: 604800,
        };

        load_jwt_settings(&vault, &mut jwt).await;

        assert_eq!(jwt.secret, "configured");
    }
}
