use anyhow::{anyhow, Error};
use authgarten_bridge::{start, BridgeConfig, ServiceCredential, TokenBridge};

#[rocket::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = BridgeConfig::from_env()?;
    let credential = ServiceCredential::from_env()?;

    log::info!(
        "Bridging tokens from {} (keys at {}) to custom tokens signed by {}.",
        config.issuer,
        config.jwks_url,
        credential.client_email()
    );

    let bridge = TokenBridge::from_config(&config, credential)?;

    // otherwise fetched lazily by the first request
    if let Err(e) = bridge.verifier().keys().prefetch().await {
        log::warn!("Unable to prefetch the provider key set, continuing: {}", e);
    }

    start(bridge)
        .launch()
        .await
        .map(|_| ())
        .map_err(|e| anyhow!("Rocket failed: {}", e))
}
