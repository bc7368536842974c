//! Client construction helpers

use netrias_client::{ConfigUpdate, HarmonizationClient, Transport};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the live API key
pub const API_KEY_VAR: &str = "NETRIAS_API_KEY";

/// Environment variable optionally overriding the live endpoint
pub const ENDPOINT_VAR: &str = "NETRIAS_HARMONIZATION_URL";

/// Check whether live credentials are available in the environment
pub fn has_live_credentials() -> bool {
    dotenvy::dotenv().ok();
    std::env::var(API_KEY_VAR).is_ok_and(|key| !key.trim().is_empty())
}

/// Create a client for the live service from environment variables
pub fn create_live_client() -> netrias_client::Result<HarmonizationClient> {
    dotenvy::dotenv().ok();
    let key = std::env::var(API_KEY_VAR).unwrap_or_default();
    let client = HarmonizationClient::new(key)?;
    if let Ok(url) = std::env::var(ENDPOINT_VAR) {
        client.configure(ConfigUpdate {
            harmonization_url: Some(url),
            ..Default::default()
        })?;
    }
    Ok(client)
}

/// Create a client on `transport` with a short poll interval
pub fn scripted_client(
    api_key: &str,
    transport: Arc<dyn Transport>,
    timeout: Duration,
    poll_interval: Duration,
) -> HarmonizationClient {
    let client = HarmonizationClient::with_transport(api_key, transport)
        .expect("valid api key");
    client
        .configure(ConfigUpdate {
            timeout: Some(timeout),
            poll_interval: Some(poll_interval),
            log_level: Some("DEBUG".into()),
            ..Default::default()
        })
        .expect("valid settings");
    client
}
