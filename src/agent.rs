use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::audio::{AudioSink, AudioSource};
use crate::config::Config;
use crate::session::{ConnectionState, Session, SessionError, SessionEvent, SubmitError};
use crate::tools::ToolExecutor;
use crate::transport::Transport;

/// Thin orchestrator: wires audio source/sink, tool executor and the session
/// state machine together. All protocol behavior lives in the session.
pub struct SpeechAgent {
    session: Arc<Session>,
    events: mpsc::Receiver<SessionEvent>,
    capture_task: Option<JoinHandle<()>>,
}

impl SpeechAgent {
    pub async fn initialize(
        config: &Config,
        transport: Arc<dyn Transport>,
        executor: Arc<dyn ToolExecutor>,
        sink: Arc<dyn AudioSink>,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        let (tx, rx) = mpsc::channel::<SessionEvent>(64);
        let session =
            Session::start(transport, config.session.clone(), executor, sink, tx).await?;
        Ok(Self {
            session: Arc::new(session),
            events: rx,
            capture_task: None,
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Start forwarding captured frames into the session. The capture loop
    /// keeps polling through reconnections and stops once the session closes.
    pub fn start(&mut self, source: Arc<dyn AudioSource>) {
        let session = self.session.clone();
        self.capture_task = Some(tokio::spawn(async move {
            loop {
                match source.capture_next_frame().await {
                    Some(frame) => match session.submit_audio(frame) {
                        Ok(()) => {}
                        Err(SubmitError::SessionNotActive) => {
                            if session.state() == ConnectionState::Closed {
                                break;
                            }
                            // Reconnecting; back off briefly and keep polling.
                            tokio::time::sleep(Duration::from_millis(50)).await;
                        }
                        Err(SubmitError::InvalidFrame(reason)) => {
                            debug!(%reason, "dropped invalid capture frame");
                        }
                    },
                    None => {
                        if session.state() == ConnectionState::Closed {
                            break;
                        }
                    }
                }
            }
            debug!("capture loop finished");
        }));
    }

    /// Consume session events until the session closes. Returns the failure
    /// reason when the session ended on an unrecoverable fault.
    pub async fn run_until_closed(&mut self) -> Option<String> {
        while let Some(event) = self.events.recv().await {
            match event {
                SessionEvent::Connected => info!("conversation connected"),
                SessionEvent::Reconnecting { attempt } => {
                    warn!(attempt, "connection lost; reconnecting")
                }
                SessionEvent::Transcript(text) => info!(%text, "transcript"),
                SessionEvent::TurnComplete => debug!("turn complete"),
                SessionEvent::Closed { reason } => return reason,
            }
        }
        None
    }

    pub async fn stop(&mut self) -> Result<(), SessionError> {
        let result = self.session.stop().await;
        if let Some(task) = self.capture_task.take() {
            task.abort();
        }
        result
    }
}
