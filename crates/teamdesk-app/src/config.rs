//! Runtime configuration.

use std::time::Duration;

use teamdesk_core::LocalUser;
use teamdesk_sync::SyncConfig;

/// Default foreground poll period.
pub const DEFAULT_FOREGROUND_PERIOD: Duration = Duration::from_secs(15);

/// Default background poll period.
pub const DEFAULT_BACKGROUND_PERIOD: Duration = Duration::from_secs(30);

/// Shortest period a poll timer runs at. Shorter configured periods,
/// including zero, are raised to this.
pub const MIN_POLL_PERIOD: Duration = Duration::from_millis(100);

/// Capacity of the command and push channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Configuration for [`crate::Runtime`].
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How often the open conversation is re-fetched.
    pub foreground_period: Duration,
    /// How often sidebar summaries are re-fetched.
    pub background_period: Duration,
    /// Capacity of the command and push channels.
    pub channel_capacity: usize,
    /// Engine configuration.
    pub sync: SyncConfig,
}

impl RuntimeConfig {
    /// Default timings for `local_user`.
    pub fn new(local_user: LocalUser) -> Self {
        Self {
            foreground_period: DEFAULT_FOREGROUND_PERIOD,
            background_period: DEFAULT_BACKGROUND_PERIOD,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            sync: SyncConfig::new(local_user),
        }
    }
}

#[cfg(test)]
mod tests {
    use teamdesk_sync::DEFAULT_NOTIFICATION_TTL;

    use super::*;

    #[test]
    fn defaults() {
        let config = RuntimeConfig::new(LocalUser::new("me", "Grace"));
        assert_eq!(config.foreground_period, Duration::from_secs(15));
        assert_eq!(config.background_period, Duration::from_secs(30));
        assert_eq!(config.sync.notification_ttl, DEFAULT_NOTIFICATION_TTL);
    }
}
