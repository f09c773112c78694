use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Negotiated PCM format, fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u8,
    pub bits_per_sample: u8,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl AudioFormat {
    pub fn validate(&self) -> Result<(), String> {
        if self.sample_rate == 0 {
            return Err("sample rate must be non-zero".into());
        }
        if self.channels == 0 {
            return Err("channel count must be non-zero".into());
        }
        if self.bits_per_sample % 8 != 0 || self.bits_per_sample == 0 {
            return Err(format!(
                "unsupported bit depth: {}",
                self.bits_per_sample
            ));
        }
        Ok(())
    }

    /// Bytes per interleaved sample frame.
    pub fn frame_stride(&self) -> usize {
        self.channels as usize * (self.bits_per_sample as usize / 8)
    }
}

/// One captured buffer of raw PCM plus its monotonic capture sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioFrame {
    pub sequence: u64,
    pub payload: Bytes,
}

impl AudioFrame {
    pub fn new(sequence: u64, payload: impl Into<Bytes>) -> Self {
        Self {
            sequence,
            payload: payload.into(),
        }
    }

    /// Structural validation against the negotiated format. Frames that fail
    /// are dropped by the session and counted, never transmitted.
    pub fn validate(&self, format: &AudioFormat, max_bytes: usize) -> Result<(), &'static str> {
        if self.payload.is_empty() {
            return Err("empty frame");
        }
        if self.payload.len() > max_bytes {
            return Err("frame exceeds size bound");
        }
        if self.payload.len() % format.frame_stride() != 0 {
            return Err("frame not aligned to sample stride");
        }
        Ok(())
    }
}

/// Produces captured frames. `capture_next_frame` blocks up to a short poll
/// interval and returns `None` when the source has shut down or no frame
/// arrived within the interval.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn capture_next_frame(&self) -> Option<AudioFrame>;
}

/// Consumes playback frames. `flush_playback` discards anything still queued,
/// used for barge-in.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn enqueue_playback(&self, pcm: Bytes);
    async fn flush_playback(&self);
}

/// Datagram sent to the audio process to drop its playback buffer. Kept under
/// the audio/control length threshold.
const FLUSH_CMD: &[u8] = b"FLUSH";

/// Packets at or below this length are control messages, longer ones are PCM.
const CONTROL_LEN: usize = 10;

const CAPTURE_POLL: Duration = Duration::from_millis(100);

/// Bridge to a separate audio process over loopback UDP. Device I/O
/// (ALSA, echo cancellation) lives in that process; this side only moves
/// frames. Capture packets get their sequence numbers assigned here, in
/// arrival order.
pub struct UdpAudioBridge {
    socket: Arc<UdpSocket>,
    target_addr: String,
    next_sequence: AtomicU64,
}

impl UdpAudioBridge {
    pub async fn bind(local_port: u16, remote_port: u16) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(format!("0.0.0.0:{}", local_port)).await?;
        let target_addr = format!("127.0.0.1:{}", remote_port);
        Ok(Self {
            socket: Arc::new(socket),
            target_addr,
            next_sequence: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl AudioSource for UdpAudioBridge {
    async fn capture_next_frame(&self) -> Option<AudioFrame> {
        let mut buf = [0u8; 4096];
        loop {
            match timeout(CAPTURE_POLL, self.socket.recv_from(&mut buf)).await {
                Err(_) => return None,
                Ok(Err(e)) => {
                    tracing::warn!("audio bridge receive failed: {}", e);
                    return None;
                }
                Ok(Ok((len, _))) if len > CONTROL_LEN => {
                    let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                    return Some(AudioFrame::new(sequence, buf[..len].to_vec()));
                }
                // Short packets are control traffic from the audio process.
                Ok(Ok(_)) => continue,
            }
        }
    }
}

#[async_trait]
impl AudioSink for UdpAudioBridge {
    async fn enqueue_playback(&self, pcm: Bytes) {
        if let Err(e) = self.socket.send_to(&pcm, &self.target_addr).await {
            tracing::warn!("audio bridge playback send failed: {}", e);
        }
    }

    async fn flush_playback(&self) {
        if let Err(e) = self.socket.send_to(FLUSH_CMD, &self.target_addr).await {
            tracing::warn!("audio bridge flush send failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_format_is_16k_mono_16bit() {
        let format = AudioFormat::default();
        assert!(format.validate().is_ok());
        assert_eq!(format.frame_stride(), 2);
    }

    #[test]
    fn zero_rate_format_is_invalid() {
        let format = AudioFormat {
            sample_rate: 0,
            ..AudioFormat::default()
        };
        assert!(format.validate().is_err());
    }

    #[test]
    fn misaligned_frame_fails_validation() {
        let format = AudioFormat::default();
        let frame = AudioFrame::new(1, vec![0u8; 3]);
        assert!(frame.validate(&format, 1024).is_err());
        let frame = AudioFrame::new(2, vec![0u8; 4]);
        assert!(frame.validate(&format, 1024).is_ok());
    }

    #[test]
    fn empty_and_oversized_frames_fail_validation() {
        let format = AudioFormat::default();
        assert!(AudioFrame::new(1, Vec::new()).validate(&format, 16).is_err());
        assert!(AudioFrame::new(1, vec![0u8; 32]).validate(&format, 16).is_err());
    }
}
