//! Outbound payload ownership.
//!
//! The link never copies a payload once it is queued. Each variant carries
//! a lifetime the compiler can check against the whole in-flight window
//! (first write, retries, ACK or final failure):
//!
//! - `Static` borrows data that lives forever (consts, leaked buffers).
//! - `Inline` owns a small copy made once by the caller.
//! - `Pooled` owns a block from the shared [`BufferPool`].
//!
//! Owned payloads come back to the caller in the
//! [`DeliveryReport`](super::channels::DeliveryReport); dropping a pooled
//! payload returns its block to the pool.

use heapless::Vec;

use super::codec::MAX_PAYLOAD_LEN;
use crate::error::LinkError;
use crate::pool::{PoolBlock, ResourcePool};

/// Number of blocks in the shared payload buffer pool.
pub const BUFFER_POOL_BLOCKS: usize = 8;

/// One payload-sized buffer.
pub type PayloadBuf = Vec<u8, MAX_PAYLOAD_LEN>;

/// Pool of payload buffers shared by the application and the link.
///
/// Blocks come back with their previous contents; clear before refilling.
pub type BufferPool = ResourcePool<PayloadBuf, BUFFER_POOL_BLOCKS>;

/// A buffer checked out of the [`BufferPool`].
pub type PooledBuf = PoolBlock<PayloadBuf, BUFFER_POOL_BLOCKS>;

#[derive(Debug)]
pub enum Payload {
    Static(&'static [u8]),
    Inline(PayloadBuf),
    Pooled(PooledBuf),
}

impl Payload {
    /// Copy `data` into an inline buffer.
    pub fn copy_from(data: &[u8]) -> Result<Self, LinkError> {
        let mut buf = PayloadBuf::new();
        buf.extend_from_slice(data)
            .map_err(|_| LinkError::PayloadTooLarge)?;
        Ok(Self::Inline(buf))
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Static(data) => data,
            Self::Inline(buf) => buf,
            Self::Pooled(block) => block,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Whether the payload fits in one frame.
    pub fn fits_frame(&self) -> bool {
        self.len() <= MAX_PAYLOAD_LEN
    }
}

impl From<&'static [u8]> for Payload {
    fn from(data: &'static [u8]) -> Self {
        Self::Static(data)
    }
}

impl From<PooledBuf> for Payload {
    fn from(block: PooledBuf) -> Self {
        Self::Pooled(block)
    }
}

impl From<PayloadBuf> for Payload {
    fn from(buf: PayloadBuf) -> Self {
        Self::Inline(buf)
    }
}
