use std::time::Duration;
use url::Url;

use crate::audio::AudioFormat;
use crate::backoff::BackoffPolicy;
use crate::session::SessionError;

pub const DEFAULT_MODEL_ID: &str = "amazon.nova-sonic-v1:0";
pub const DEFAULT_REGION: &str = "us-east-1";

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful voice assistant. You can look things up \
     through tools when asked. Keep the interaction conversational.";

/// Process-level configuration: endpoint, identity and the session knobs.
/// Built from CLI flags with environment overrides for the secrets.
#[derive(Debug, Clone)]
pub struct Config {
    pub ws_url: String,
    pub ws_token: String,
    pub model_id: String,
    pub region: String,
    pub device_id: String,
    pub client_id: String,
    pub audio_local_port: u16,
    pub audio_remote_port: u16,
    pub session: SessionConfig,
}

impl Config {
    /// Endpoint for a model/region pair when no explicit URL is given.
    pub fn default_ws_url(model_id: &str, region: &str) -> String {
        format!(
            "wss://bedrock-runtime.{}.amazonaws.com/model/{}/live",
            region, model_id
        )
    }

    pub fn validate(&self) -> Result<(), SessionError> {
        if self.ws_token.is_empty() {
            return Err(SessionError::Configuration(
                "missing credentials: set SONIC_WS_TOKEN".into(),
            ));
        }
        let url = Url::parse(&self.ws_url)
            .map_err(|e| SessionError::Configuration(format!("invalid endpoint url: {}", e)))?;
        match url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(SessionError::Configuration(format!(
                    "unsupported url scheme: {}",
                    other
                )));
            }
        }
        self.session.validate()
    }
}

/// Knobs owned by the session state machine.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub system_prompt: String,
    pub audio_format: AudioFormat,
    pub handshake_timeout: Duration,
    pub backoff: BackoffPolicy,
    /// Capacity of the outbound audio queue, in frames.
    pub queue_capacity: usize,
    pub max_frame_bytes: usize,
    /// Minimum spacing between transmitted audio frames, for rate-limited
    /// transports. Off by default.
    pub frame_spacing: Option<Duration>,
    /// Non-truncation decode faults tolerated inside the sliding window
    /// before the session faults.
    pub decode_fault_threshold: u32,
    pub decode_fault_window: Duration,
    /// How long `stop()` waits for running tool invocations to finish.
    pub drain_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            audio_format: AudioFormat::default(),
            handshake_timeout: Duration::from_secs(10),
            backoff: BackoffPolicy::default(),
            queue_capacity: 64,
            max_frame_bytes: 32 * 1024,
            frame_spacing: None,
            decode_fault_threshold: 5,
            decode_fault_window: Duration::from_secs(10),
            drain_grace: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        self.audio_format
            .validate()
            .map_err(SessionError::Configuration)?;
        if self.queue_capacity == 0 {
            return Err(SessionError::Configuration(
                "queue capacity must be non-zero".into(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(SessionError::Configuration(
                "max frame size must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            ws_url: Config::default_ws_url(DEFAULT_MODEL_ID, DEFAULT_REGION),
            ws_token: "token".into(),
            model_id: DEFAULT_MODEL_ID.into(),
            region: DEFAULT_REGION.into(),
            device_id: "aa:bb:cc:dd:ee:ff".into(),
            client_id: "client".into(),
            audio_local_port: 9000,
            audio_remote_port: 9001,
            session: SessionConfig::default(),
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn missing_token_is_a_configuration_error() {
        let mut c = config();
        c.ws_token.clear();
        assert!(matches!(
            c.validate(),
            Err(SessionError::Configuration(_))
        ));
    }

    #[test]
    fn non_websocket_scheme_is_rejected() {
        let mut c = config();
        c.ws_url = "https://example.com".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn invalid_audio_format_is_rejected() {
        let mut c = config();
        c.session.audio_format.channels = 0;
        assert!(c.validate().is_err());
    }
}
