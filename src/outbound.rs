use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Entry awaiting transmission, already encoded.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundItem {
    Audio { sequence: u64, bytes: Vec<u8> },
    Control(Vec<u8>),
}

#[derive(Default)]
struct Inner {
    audio: VecDeque<(u64, Vec<u8>)>,
    control: VecDeque<Vec<u8>>,
    evicted: u64,
}

/// Bounded transmit queue shared by the audio producer, the tool-dispatch
/// tasks and the single transmitter. Audio is capacity-bounded: when full,
/// the oldest frame is evicted so fresh audio and tool results never wait
/// behind stale frames. Control entries (tool results, session close) are
/// never evicted. The transmitter drains audio first to bound playback
/// latency.
pub struct OutboundQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueue an encoded audio frame. Returns the sequence of the frame
    /// evicted to make room, if any.
    pub fn push_audio(&self, sequence: u64, bytes: Vec<u8>) -> Option<u64> {
        let evicted = {
            let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
            let evicted = if inner.audio.len() >= self.capacity {
                inner.evicted += 1;
                inner.audio.pop_front().map(|(seq, _)| seq)
            } else {
                None
            };
            inner.audio.push_back((sequence, bytes));
            evicted
        };
        self.notify.notify_one();
        evicted
    }

    pub fn push_control(&self, bytes: Vec<u8>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .control
            .push_back(bytes);
        self.notify.notify_one();
    }

    /// Re-queue a control entry at the front, for a send that failed
    /// mid-transmission and must survive reconnection.
    pub fn push_control_front(&self, bytes: Vec<u8>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .control
            .push_front(bytes);
        self.notify.notify_one();
    }

    fn try_pop(&self) -> Option<OutboundItem> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if let Some((sequence, bytes)) = inner.audio.pop_front() {
            return Some(OutboundItem::Audio { sequence, bytes });
        }
        inner.control.pop_front().map(OutboundItem::Control)
    }

    /// Wait for the next item. Cancellation-safe: an item is removed only in
    /// the poll that returns it.
    pub async fn pop(&self) -> OutboundItem {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Arm before checking so a push between the check and the await
            // is not lost.
            notified.as_mut().enable();
            if let Some(item) = self.try_pop() {
                return item;
            }
            notified.await;
        }
    }

    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.audio.is_empty() && inner.control.is_empty()
    }

    pub fn evicted(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn saturation_evicts_the_oldest_frame_and_preserves_order() {
        let queue = OutboundQueue::new(2);
        assert_eq!(queue.push_audio(1, vec![1]), None);
        assert_eq!(queue.push_audio(2, vec![2]), None);
        assert_eq!(queue.push_audio(3, vec![3]), Some(1));

        assert_eq!(
            queue.pop().await,
            OutboundItem::Audio {
                sequence: 2,
                bytes: vec![2]
            }
        );
        assert_eq!(
            queue.pop().await,
            OutboundItem::Audio {
                sequence: 3,
                bytes: vec![3]
            }
        );
        assert_eq!(queue.evicted(), 1);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn audio_drains_before_control() {
        let queue = OutboundQueue::new(4);
        queue.push_control(b"tool".to_vec());
        queue.push_audio(7, vec![0]);

        assert!(matches!(queue.pop().await, OutboundItem::Audio { sequence: 7, .. }));
        assert_eq!(queue.pop().await, OutboundItem::Control(b"tool".to_vec()));
    }

    #[tokio::test]
    async fn control_entries_survive_audio_saturation() {
        let queue = OutboundQueue::new(1);
        queue.push_control(b"a".to_vec());
        queue.push_control(b"b".to_vec());
        for seq in 0..10 {
            queue.push_audio(seq, vec![0]);
        }

        let mut control = Vec::new();
        while !queue.is_empty() {
            if let OutboundItem::Control(bytes) = queue.pop().await {
                control.push(bytes);
            }
        }
        assert_eq!(control, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[tokio::test]
    async fn requeued_control_goes_first() {
        let queue = OutboundQueue::new(4);
        queue.push_control(b"second".to_vec());
        queue.push_control_front(b"first".to_vec());
        assert_eq!(queue.pop().await, OutboundItem::Control(b"first".to_vec()));
    }

    #[tokio::test]
    async fn pop_wakes_on_push() {
        let queue = std::sync::Arc::new(OutboundQueue::new(2));
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.push_audio(1, vec![9]);
        let item = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(item, OutboundItem::Audio { sequence: 1, .. }));
    }
}
