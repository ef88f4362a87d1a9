//! Scoped ownership of a transport
//!
//! The guard releases the line when dropped, so an early return or panic in
//! the client never leaves a serial port held.

use std::ops::{Deref, DerefMut};

use tracing::warn;

use crate::Transport;

/// Owns a boxed transport and releases it on drop
pub struct TransportGuard {
    inner: Box<dyn Transport>,
}

impl TransportGuard {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self { inner: transport }
    }

    /// Release the line now; later calls are no-ops
    pub fn release(&mut self) {
        self.inner.release();
    }
}

impl Deref for TransportGuard {
    type Target = dyn Transport;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for TransportGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for TransportGuard {
    fn drop(&mut self) {
        if self.inner.is_open() {
            warn!("Releasing {} on drop", self.inner.name());
            self.inner.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::Result, Transport};
    use async_trait::async_trait;
    use bytes::BytesMut;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct Counting {
        open: bool,
        releases: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Transport for Counting {
        async fn open(&mut self) -> Result<()> {
            self.open = true;
            Ok(())
        }
        fn release(&mut self) {
            if self.open {
                self.releases.fetch_add(1, Ordering::SeqCst);
            }
            self.open = false;
        }
        fn is_open(&self) -> bool {
            self.open
        }
        async fn write(&mut self, _data: &[u8]) -> Result<()> {
            Ok(())
        }
        async fn read(&mut self, _n: usize) -> Result<BytesMut> {
            Ok(BytesMut::new())
        }
        async fn read_until(&mut self, _delimiter: u8) -> Result<BytesMut> {
            Ok(BytesMut::new())
        }
        async fn set_baud_rate(&mut self, _baud_rate: u32) -> Result<()> {
            Ok(())
        }
        async fn flush_input(&mut self) -> Result<()> {
            Ok(())
        }
        async fn flush(&mut self) -> Result<()> {
            Ok(())
        }
        fn set_read_timeout(&mut self, _timeout: Duration) {}
        fn name(&self) -> String {
            "counting".into()
        }
    }

    fn guard(releases: &Arc<AtomicUsize>) -> TransportGuard {
        TransportGuard::new(Box::new(Counting {
            open: false,
            releases: releases.clone(),
        }))
    }

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let releases = Arc::new(AtomicUsize::new(0));
        {
            let mut guard = guard(&releases);
            guard.open().await.unwrap();
            assert!(guard.is_open());
        }
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_guard_release_is_idempotent() {
        let releases = Arc::new(AtomicUsize::new(0));
        let mut guard = guard(&releases);
        guard.open().await.unwrap();

        guard.release();
        guard.release();
        drop(guard);

        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
