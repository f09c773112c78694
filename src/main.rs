use anyhow::Context;
use clap::Parser;
use mac_address::get_mac_address;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use sonic_live_rs::audio::UdpAudioBridge;
use sonic_live_rs::config::{Config, DEFAULT_MODEL_ID, DEFAULT_REGION, SessionConfig};
use sonic_live_rs::tools::builtin::default_tools;
use sonic_live_rs::tools::registry::ToolRegistry;
use sonic_live_rs::transport::WsTransport;
use sonic_live_rs::SpeechAgent;

const CLIENT_ID_FILE: &str = "sonic_live_client_id";

#[derive(Parser, Debug)]
#[command(name = "sonic_live_rs", about = "Real-time voice conversation client")]
struct Args {
    /// Enable verbose protocol logging
    #[arg(long)]
    debug: bool,

    /// Model identifier
    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    model: String,

    /// Service region
    #[arg(long, default_value = DEFAULT_REGION)]
    region: String,

    /// Explicit websocket endpoint; overrides model/region
    #[arg(long)]
    url: Option<String>,

    /// Override the default system prompt
    #[arg(long)]
    system_prompt: Option<String>,

    /// Local UDP port receiving capture frames from the audio process
    #[arg(long, default_value_t = 9400)]
    audio_local_port: u16,

    /// UDP port of the audio process consuming playback frames
    #[arg(long, default_value_t = 9401)]
    audio_remote_port: u16,
}

/// Device id from the MAC address, client id persisted across restarts so
/// the service sees a stable identity.
fn resolve_identity() -> (String, String) {
    let device_id = match get_mac_address() {
        Ok(Some(mac)) => mac.to_string().to_lowercase(),
        _ => Uuid::new_v4().to_string(),
    };

    let client_id = match std::fs::read_to_string(CLIENT_ID_FILE) {
        Ok(content) if !content.trim().is_empty() => content.trim().to_string(),
        _ => {
            let id = Uuid::new_v4().to_string();
            if let Err(e) = std::fs::write(CLIENT_ID_FILE, &id) {
                tracing::warn!("failed to persist client id: {}", e);
            }
            id
        }
    };
    (device_id, client_id)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let (device_id, client_id) = resolve_identity();
    let mut session = SessionConfig::default();
    if let Some(prompt) = args.system_prompt {
        session.system_prompt = prompt;
    }
    let config = Config {
        ws_url: args
            .url
            .or_else(|| std::env::var("SONIC_WS_URL").ok())
            .unwrap_or_else(|| Config::default_ws_url(&args.model, &args.region)),
        ws_token: std::env::var("SONIC_WS_TOKEN").unwrap_or_default(),
        model_id: args.model,
        region: args.region,
        device_id,
        client_id,
        audio_local_port: args.audio_local_port,
        audio_remote_port: args.audio_remote_port,
        session,
    };

    let registry = Arc::new(ToolRegistry::with_tools(default_tools()));
    let bridge = Arc::new(
        UdpAudioBridge::bind(config.audio_local_port, config.audio_remote_port)
            .await
            .context("binding audio bridge")?,
    );
    let transport = Arc::new(WsTransport {
        url: config.ws_url.clone(),
        token: config.ws_token.clone(),
        device_id: config.device_id.clone(),
        client_id: config.client_id.clone(),
    });

    let mut agent = SpeechAgent::initialize(&config, transport, registry, bridge.clone())
        .await
        .context("starting session")?;
    info!(session = %agent.session().id(), "conversation started; speak into your microphone");
    agent.start(bridge);

    let fault = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("interrupt received; shutting down");
            None
        }
        reason = agent.run_until_closed() => reason,
    };
    agent.stop().await.ok();

    if let Some(reason) = fault {
        error!(%reason, "session ended on unrecoverable fault");
        anyhow::bail!("session fault: {}", reason);
    }
    Ok(())
}
