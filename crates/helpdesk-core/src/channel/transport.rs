use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::config::ReconnectConfig;
use crate::events::WireFrame;
use crate::models::Identity;

/// What the transport reports back to the channel adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelSignal {
    /// Handshake completed (first connect or reconnect)
    Connected,
    Frame(WireFrame),
    /// Transport dropped; the transport keeps retrying on its own
    Disconnected,
    /// Consecutive failed connection attempts reached the notify threshold
    ReconnectFailing { attempts: u32 },
}

/// Connection owned by the channel adapter. Implementations keep retrying
/// until `stop` is called and report progress through `signals`.
pub trait Transport {
    /// Start (or restart) the connection for `identity`.
    /// Returns the sink for outbound frames.
    fn start(
        &mut self,
        identity: &Identity,
        signals: UnboundedSender<ChannelSignal>,
    ) -> UnboundedSender<WireFrame>;

    fn stop(&mut self);
}

/// Exponential backoff between connection attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub notify_after_attempts: u32,
}

impl ReconnectPolicy {
    /// Delay before the next attempt after `failed_attempts` consecutive failures.
    /// Zero failures means a clean disconnect; retry after the initial delay.
    pub fn delay_for(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(16);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    pub fn should_notify(&self, failed_attempts: u32) -> bool {
        self.notify_after_attempts > 0 && failed_attempts == self.notify_after_attempts
    }
}

impl From<&ReconnectConfig> for ReconnectPolicy {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            notify_after_attempts: config.notify_after_attempts,
        }
    }
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from(&ReconnectConfig::default())
    }
}
