//! Session configuration

use serde::{Deserialize, Serialize};

use crate::transport::EncodingProfile;

/// Co-broadcast session configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of co-hosts alongside the host
    pub max_co_hosts: usize,
    /// Co-host invitation timeout in milliseconds
    pub invite_timeout_ms: u64,
    /// Interval between liveness probes in milliseconds
    pub heartbeat_interval_ms: u64,
    /// Consecutive probe failures before self-teardown
    pub heartbeat_failure_threshold: u32,
    /// Enable simulcast for published video (multiple quality layers)
    pub enable_simulcast: bool,
    /// Maximum audio bitrate in kbps
    pub audio_bitrate_kbps: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_co_hosts: 2,
            invite_timeout_ms: 30_000,
            heartbeat_interval_ms: 25_000,
            heartbeat_failure_threshold: 5,
            enable_simulcast: true,
            audio_bitrate_kbps: 64,
        }
    }
}

impl SessionConfig {
    /// Encoding profile for published video under this configuration.
    #[must_use]
    pub fn video_profile(&self) -> EncodingProfile {
        if self.enable_simulcast {
            EncodingProfile::simulcast()
        } else {
            EncodingProfile::single_layer(2500)
        }
    }

    /// Encoding profile for published audio.
    #[must_use]
    pub fn audio_profile(&self) -> EncodingProfile {
        EncodingProfile::single_layer(self.audio_bitrate_kbps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.max_co_hosts, 2);
        assert_eq!(config.invite_timeout_ms, 30_000);
        assert_eq!(config.heartbeat_failure_threshold, 5);
        assert!(config.enable_simulcast);
    }

    #[test]
    fn test_video_profile_follows_simulcast_flag() {
        let mut config = SessionConfig::default();
        assert!(config.video_profile().is_simulcast());

        config.enable_simulcast = false;
        assert!(!config.video_profile().is_simulcast());
    }
}
