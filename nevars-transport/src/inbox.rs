//! Deadline-bounded reads over a receive buffer
//!
//! Both transports buffer decoded input and top it up one chunk at a time.
//! A read that hits its deadline returns whatever was collected; deciding
//! whether that is enough belongs to the frame decoders.

use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use tokio::time::Instant;
use tracing::trace;

use crate::error::Result;

#[async_trait]
pub(crate) trait Inbound: Send {
    /// Bytes received but not yet handed out
    fn inbox(&mut self) -> &mut BytesMut;

    /// Receive one more chunk into the inbox
    ///
    /// Returns `false` if `deadline` passed first.
    async fn fill(&mut self, deadline: Instant) -> Result<bool>;
}

/// Read `n` bytes, or fewer if the timeout expires
pub(crate) async fn read_count<T>(transport: &mut T, n: usize, timeout: Duration) -> Result<BytesMut>
where
    T: Inbound + ?Sized,
{
    let deadline = Instant::now() + timeout;

    while transport.inbox().len() < n {
        if !transport.fill(deadline).await? {
            trace!(
                wanted = n,
                got = transport.inbox().len(),
                "Read timed out"
            );
            break;
        }
    }

    let inbox = transport.inbox();
    let take = n.min(inbox.len());
    Ok(inbox.split_to(take))
}

/// Read through `delimiter` inclusive, or whatever arrived before the timeout
pub(crate) async fn read_until<T>(
    transport: &mut T,
    delimiter: u8,
    timeout: Duration,
) -> Result<BytesMut>
where
    T: Inbound + ?Sized,
{
    let deadline = Instant::now() + timeout;
    let mut scanned = 0;

    loop {
        let inbox = transport.inbox();
        if let Some(pos) = inbox[scanned..].iter().position(|&b| b == delimiter) {
            return Ok(inbox.split_to(scanned + pos + 1));
        }
        scanned = inbox.len();

        if !transport.fill(deadline).await? {
            trace!(
                delimiter = format!("0x{:02X}", delimiter),
                got = scanned,
                "Read timed out before delimiter"
            );
            return Ok(transport.inbox().split());
        }
    }
}
