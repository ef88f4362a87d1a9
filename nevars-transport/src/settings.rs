//! Line settings

use std::time::Duration;

/// Serial line settings
///
/// Framing is fixed at 7 data bits, even parity, 1 stop bit; only the
/// starting rate and the read timeout vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialSettings {
    /// Rate the line is opened at
    pub initial_baud_rate: u32,

    /// Longest a single read waits before returning what it has
    pub read_timeout: Duration,

    /// Longest a network tunnel waits to connect and negotiate
    pub connect_timeout: Duration,
}

impl SerialSettings {
    pub const DEFAULT_BAUD_RATE: u32 = 300;
    pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(initial_baud_rate: u32) -> Self {
        Self {
            initial_baud_rate,
            ..Self::default()
        }
    }

    /// Set read timeout
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            initial_baud_rate: Self::DEFAULT_BAUD_RATE,
            read_timeout: Self::DEFAULT_READ_TIMEOUT,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
        }
    }
}
