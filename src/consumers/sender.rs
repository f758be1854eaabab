// src/consumers/sender.rs
//
// Command sender: one-shot codes and a fixed-rate repeat per channel.

use async_trait::async_trait;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::bridge::SendTarget;
use crate::error::BridgeError;
use crate::io::ChannelId;

/// Repeat rate used when the caller has no preference.
pub const DEFAULT_RATE_HZ: u32 = 50;

/// Anything that can put a line on the radio link.
#[async_trait]
pub trait LineSink: Send + Sync {
    async fn send_line(&self, target: SendTarget, text: &str) -> Result<(), BridgeError>;
}

/// Outcome of each send made by a PeriodicSender.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SenderEvent {
    Sent { channel: ChannelId, text: String },
    Failed { channel: ChannelId, message: String },
    /// The repeat ended on its own because the bridge went away.
    Stopped { channel: ChannelId, reason: String },
}

/// Period for `hz` sends per second, never shorter than 1 ms.
pub fn rate_interval(hz: u32) -> Duration {
    Duration::from_millis(u64::from((1000 / hz.max(1)).max(1)))
}

struct RepeatTask {
    cancel_flag: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

pub struct PeriodicSender {
    sink: Arc<dyn LineSink>,
    events: mpsc::UnboundedSender<SenderEvent>,
    tasks: [Option<RepeatTask>; 2],
}

/// Send once and report. Returns false when the repeat should end.
async fn send_and_report(
    sink: &dyn LineSink,
    events: &mpsc::UnboundedSender<SenderEvent>,
    channel: ChannelId,
    text: &str,
) -> bool {
    match sink.send_line(SendTarget::Channel(channel), text).await {
        Ok(()) => {
            let _ = events.send(SenderEvent::Sent {
                channel,
                text: text.to_string(),
            });
            true
        }
        Err(BridgeError::ServiceStopped) => {
            let reason = BridgeError::ServiceStopped.to_string();
            tlog!("[sender] Stopping repeat on {}: {}", channel, reason);
            let _ = events.send(SenderEvent::Stopped { channel, reason });
            false
        }
        Err(e) => {
            let _ = events.send(SenderEvent::Failed {
                channel,
                message: e.to_string(),
            });
            true
        }
    }
}

impl PeriodicSender {
    pub fn new(sink: Arc<dyn LineSink>) -> (Self, mpsc::UnboundedReceiver<SenderEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        (
            PeriodicSender {
                sink,
                events,
                tasks: [None, None],
            },
            events_rx,
        )
    }

    /// Send `text` once on `channel`.
    pub async fn send_code(&self, channel: ChannelId, text: &str) -> Result<(), BridgeError> {
        let result = self.sink.send_line(SendTarget::Channel(channel), text).await;
        let event = match &result {
            Ok(()) => SenderEvent::Sent {
                channel,
                text: text.to_string(),
            },
            Err(e) => SenderEvent::Failed {
                channel,
                message: e.to_string(),
            },
        };
        let _ = self.events.send(event);
        result
    }

    /// Send `text` on `channel` `hz` times a second until stopped. Replaces
    /// any repeat already running on that channel. A failed send is reported
    /// and the next tick tries again.
    pub fn start_periodic(&mut self, channel: ChannelId, text: &str, hz: u32) -> Result<(), BridgeError> {
        if hz == 0 {
            return Err(BridgeError::InvalidRate(hz));
        }
        self.stop_periodic(channel);

        let interval = rate_interval(hz);
        let cancel_flag = Arc::new(AtomicBool::new(false));
        let cancel_flag_clone = cancel_flag.clone();
        let sink = self.sink.clone();
        let events = self.events.clone();
        let text = text.to_string();

        tlog!("[sender] Repeating {:?} on {} every {:?}", text, channel, interval);

        let handle = tokio::spawn(async move {
            // First send goes out immediately, then on the interval
            if cancel_flag_clone.load(Ordering::Relaxed) {
                return;
            }
            if !send_and_report(sink.as_ref(), &events, channel, &text).await {
                return;
            }

            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // Skip the first tick which fires immediately
            interval_timer.tick().await;

            loop {
                interval_timer.tick().await;
                if cancel_flag_clone.load(Ordering::Relaxed) {
                    break;
                }
                if !send_and_report(sink.as_ref(), &events, channel, &text).await {
                    break;
                }
            }
        });

        self.tasks[channel.index()] = Some(RepeatTask { cancel_flag, handle });
        Ok(())
    }

    pub fn stop_periodic(&mut self, channel: ChannelId) {
        if let Some(task) = self.tasks[channel.index()].take() {
            task.cancel_flag.store(true, Ordering::Relaxed);
            task.handle.abort();
            tlog!("[sender] Stopped repeat on {}", channel);
        }
    }

    pub fn is_running(&self, channel: ChannelId) -> bool {
        self.tasks[channel.index()]
            .as_ref()
            .map(|t| !t.handle.is_finished())
            .unwrap_or(false)
    }
}

impl Drop for PeriodicSender {
    fn drop(&mut self) {
        for channel in ChannelId::ALL {
            self.stop_periodic(channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WriteError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(SendTarget, String)>>,
        fail: AtomicBool,
        stopped: AtomicBool,
    }

    impl RecordingSink {
        fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LineSink for RecordingSink {
        async fn send_line(&self, target: SendTarget, text: &str) -> Result<(), BridgeError> {
            if self.stopped.load(Ordering::Relaxed) {
                return Err(BridgeError::ServiceStopped);
            }
            if self.fail.load(Ordering::Relaxed) {
                return Err(WriteError::NoTarget.into());
            }
            self.sent.lock().unwrap().push((target, text.to_string()));
            Ok(())
        }
    }

    #[test]
    fn test_rate_interval() {
        assert_eq!(rate_interval(DEFAULT_RATE_HZ), Duration::from_millis(20));
        assert_eq!(rate_interval(1), Duration::from_millis(1000));
        assert_eq!(rate_interval(5000), Duration::from_millis(1));
    }

    #[tokio::test]
    async fn test_send_code_reports() {
        let sink = Arc::new(RecordingSink::default());
        let (sender, mut events) = PeriodicSender::new(sink.clone());

        sender.send_code(ChannelId::Two, "ARM").await.unwrap();
        assert_eq!(
            sink.sent.lock().unwrap()[0],
            (SendTarget::Channel(ChannelId::Two), "ARM".to_string())
        );
        assert_eq!(
            events.try_recv().unwrap(),
            SenderEvent::Sent {
                channel: ChannelId::Two,
                text: "ARM".to_string()
            }
        );

        sink.fail.store(true, Ordering::Relaxed);
        assert!(sender.send_code(ChannelId::Two, "ARM").await.is_err());
        assert!(matches!(events.try_recv().unwrap(), SenderEvent::Failed { .. }));
    }

    #[tokio::test]
    async fn test_zero_rate_rejected() {
        let sink = Arc::new(RecordingSink::default());
        let (mut sender, _events) = PeriodicSender::new(sink);
        assert_eq!(
            sender.start_periodic(ChannelId::One, "HB", 0),
            Err(BridgeError::InvalidRate(0))
        );
        assert!(!sender.is_running(ChannelId::One));
    }

    #[tokio::test]
    async fn test_periodic_start_and_stop() {
        let sink = Arc::new(RecordingSink::default());
        let (mut sender, _events) = PeriodicSender::new(sink.clone());

        sender.start_periodic(ChannelId::One, "HB", 100).unwrap();
        assert!(sender.is_running(ChannelId::One));
        assert!(!sender.is_running(ChannelId::Two));

        tokio::time::sleep(Duration::from_millis(100)).await;
        sender.stop_periodic(ChannelId::One);
        assert!(!sender.is_running(ChannelId::One));

        let sent = sink.count();
        assert!(sent >= 3, "expected several sends, got {}", sent);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.count(), sent);
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_repeat() {
        let sink = Arc::new(RecordingSink::default());
        sink.fail.store(true, Ordering::Relaxed);
        let (mut sender, mut events) = PeriodicSender::new(sink.clone());

        sender.start_periodic(ChannelId::One, "HB", 200).unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;
        sink.fail.store(false, Ordering::Relaxed);
        tokio::time::sleep(Duration::from_millis(40)).await;
        sender.stop_periodic(ChannelId::One);

        let mut failed = 0;
        let mut sent = 0;
        while let Ok(event) = events.try_recv() {
            match event {
                SenderEvent::Failed { .. } => failed += 1,
                SenderEvent::Sent { .. } => sent += 1,
                SenderEvent::Stopped { .. } => panic!("repeat should keep going"),
            }
        }
        assert!(failed >= 1);
        assert!(sent >= 1);
    }

    #[tokio::test]
    async fn test_repeat_ends_when_bridge_stops() {
        let sink = Arc::new(RecordingSink::default());
        sink.stopped.store(true, Ordering::Relaxed);
        let (mut sender, mut events) = PeriodicSender::new(sink);

        sender.start_periodic(ChannelId::Two, "HB", 50).unwrap();
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, SenderEvent::Stopped { channel: ChannelId::Two, .. }));

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!sender.is_running(ChannelId::Two));
    }
}
