//! Unified error types for the handset firmware.
//!
//! A single `Error` enum that every subsystem converts into, so the
//! application layer can decide uniformly what to do (alert the user, shut
//! down, ignore). All variants are `Copy`, which lets them travel through
//! completion reports and diagnostics without allocation.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A received or outgoing frame was malformed.
    Frame(FrameError),
    /// The packet link refused or failed a request.
    Link(LinkError),
    /// A resource pool operation failed.
    Pool(PoolError),
    /// Configuration is invalid or could not be decoded.
    Config(ConfigError),
    /// An application payload could not be decoded.
    Payload(PayloadError),
    /// Peripheral initialisation failed.
    Init(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Frame(e) => write!(f, "frame: {e}"),
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Pool(e) => write!(f, "pool: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Payload(e) => write!(f, "payload: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Framing errors
// ---------------------------------------------------------------------------

/// Why a frame could not be built or accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Payload plus overhead exceeds the maximum frame length.
    TooLarge,
    /// First byte is not the frame marker.
    BadHead,
    /// Declared length is outside `[FRAME_OVERHEAD, MAX_FRAME_LEN]`.
    BadLength,
    /// Fewer bytes arrived than the declared length requires.
    ShortRead,
    /// Additive checksum mismatch.
    BadChecksum,
    /// ACK frame truncated.
    BadAck,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge => write!(f, "payload too large for one frame"),
            Self::BadHead => write!(f, "bad frame head"),
            Self::BadLength => write!(f, "bad frame length"),
            Self::ShortRead => write!(f, "short read"),
            Self::BadChecksum => write!(f, "checksum mismatch"),
            Self::BadAck => write!(f, "truncated ACK frame"),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<FrameError> for Error {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// Send channel is full; nothing was queued.
    QueueFull,
    /// Every ACK-wait slot is occupied.
    AckTableFull,
    /// Payload does not fit in a single frame.
    PayloadTooLarge,
    /// Handler table has no free binding slot.
    RegistryFull,
    /// Retry budget exhausted without an acknowledgment.
    DeliveryFailed,
    /// A blocking send gave up waiting.
    Timeout,
    /// No free slot for another blocking sender.
    WaitersExhausted,
    /// The serial transport reported a write error.
    Transport,
    /// The link has been shut down.
    Stopped,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "send queue full"),
            Self::AckTableFull => write!(f, "ACK-wait table full"),
            Self::PayloadTooLarge => write!(f, "payload too large"),
            Self::RegistryFull => write!(f, "handler registry full"),
            Self::DeliveryFailed => write!(f, "no acknowledgment after retries"),
            Self::Timeout => write!(f, "timed out waiting for delivery"),
            Self::WaitersExhausted => write!(f, "too many blocking senders"),
            Self::Transport => write!(f, "serial write failed"),
            Self::Stopped => write!(f, "link stopped"),
        }
    }
}

impl std::error::Error for LinkError {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Pool errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The block was handed out by a different pool.
    ForeignBlock,
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ForeignBlock => write!(f, "block belongs to another pool"),
        }
    }
}

impl std::error::Error for PoolError {}

impl From<PoolError> for Error {
    fn from(e: PoolError) -> Self {
        Self::Pool(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored bytes could not be decoded.
    Decode,
    /// Could not be encoded for persistence.
    Encode,
    /// A value is outside its permitted range.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode => write!(f, "decode failed"),
            Self::Encode => write!(f, "encode failed"),
            Self::ValidationFailed(field) => write!(f, "invalid value for {field}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Application payload errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// Fewer bytes than the payload layout needs.
    Truncated,
    /// Text is not valid UTF-8.
    InvalidText,
    /// Text longer than one length byte can describe.
    TextTooLong,
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated => write!(f, "truncated"),
            Self::InvalidText => write!(f, "text is not UTF-8"),
            Self::TextTooLong => write!(f, "text too long"),
        }
    }
}

impl std::error::Error for PayloadError {}

impl From<PayloadError> for Error {
    fn from(e: PayloadError) -> Self {
        Self::Payload(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
