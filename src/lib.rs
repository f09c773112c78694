pub mod agent;
pub mod audio;
pub mod backoff;
pub mod config;
pub mod outbound;
pub mod protocol;
pub mod session;
pub mod tools;
pub mod transport;

pub use agent::SpeechAgent;
pub use audio::{AudioFormat, AudioFrame, AudioSink, AudioSource};
pub use backoff::BackoffPolicy;
pub use config::{Config, SessionConfig};
pub use protocol::{DecodeError, DecodeErrorKind, Envelope, EventCodec, InboundEvent};
pub use session::{
    ConnectionState, Session, SessionError, SessionEvent, StatsSnapshot, SubmitError,
};
pub use tools::{Tool, ToolError, ToolExecutor, ToolRegistry};
pub use transport::{Transport, TransportError, WsTransport};
