//! Configuration surface for the bounded queue, the header table, and the
//! request parser's size limits.
//!
//! # Memory model
//!
//! Every field here is a compile-time constant in the original design this
//! crate is based on. They are kept configurable at the edges
//! ([`BqConfig`], [`HtConfig`]) but the wire-observable grammar limits in
//! [`ReqLimits`] are deliberately **not** meant to be loosened per request —
//! they are the crate's security boundary, not a performance knob.
//!
//! # Examples
//!
//! ```
//! use reqpipe::limits::{BqConfig, HtConfig};
//!
//! let bq = BqConfig::default();
//! assert_eq!(bq.capacity, 256);
//!
//! let ht = HtConfig::default().with_capacity(64).unwrap();
//! assert_eq!(ht.capacity, 64);
//! ```

use crate::errors::BqError;

/// Request-line/header/body size limits enforced by [`crate::http::request::Parser`].
///
/// These are not configurable: they are the wire contract this crate
/// implements (see the size-limit table this module mirrors). Keeping them
/// as named constants rather than magic numbers scattered through the
/// parser is the only reason this type exists.
#[derive(Debug, Clone, Copy)]
pub struct ReqLimits;

impl ReqLimits {
    /// Total bytes the request-line/header scratch buffer may hold before
    /// the parser gives up with [`crate::errors::InvalidReason::ScratchOverflow`].
    pub const SCRATCH_SIZE: usize = 2048;

    /// Maximum method length (e.g. `"OPTIONS"` is 7 and therefore invalid;
    /// `"DELETE"` is exactly 6 and is the longest method this crate knows).
    pub const METHOD_MAX: usize = 6;
    /// Request target length range, inclusive on both ends.
    pub const TARGET_MIN: usize = 1;
    pub const TARGET_MAX: usize = 1024;
    /// The only version literal this crate accepts.
    pub const VERSION: &'static [u8] = b"HTTP/1.1";

    pub const HEADER_NAME_MAX: usize = 64;
    pub const HEADER_VALUE_MAX: usize = 512;
    pub const HEADER_COUNT_MAX: usize = 32;

    pub const BODY_MAX: usize = 2048;
}

/// Construction parameters for [`crate::bq::BlockingQueue`].
///
/// # Examples
/// ```
/// use reqpipe::limits::BqConfig;
///
/// let cfg = BqConfig { capacity: 16, ..BqConfig::default() };
/// assert_eq!(cfg.capacity, 16);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct BqConfig {
    /// Ring-buffer capacity. Must be a power of two and at least 2; one slot
    /// is always wasted to distinguish full from empty, so the usable
    /// capacity is `capacity - 1`.
    pub capacity: usize,

    #[doc(hidden)]
    pub _priv: (),
}

impl Default for BqConfig {
    fn default() -> Self {
        Self {
            capacity: 256,
            _priv: (),
        }
    }
}

impl BqConfig {
    /// Validates `capacity` against the power-of-two-and->=2 requirement
    /// without constructing a queue.
    pub fn validate(&self) -> Result<(), BqError> {
        if self.capacity < 2 || !self.capacity.is_power_of_two() {
            return Err(BqError::InvalidCapacity(self.capacity));
        }
        Ok(())
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}

/// Construction parameters for [`crate::ht::HashTable`].
///
/// # Examples
/// ```
/// use reqpipe::limits::HtConfig;
///
/// let cfg = HtConfig::default().with_capacity(32).unwrap();
/// assert_eq!(cfg.capacity, 32);
/// assert!(HtConfig::default().with_capacity(3).is_err());
/// ```
#[derive(Clone, Copy)]
pub struct HtConfig {
    /// Initial backing-array capacity. Must be a power of two.
    pub capacity: usize,
    /// Hash function applied to the already-lower-cased key bytes.
    /// Defaults to the 64-bit FNV-1a variant used throughout this crate.
    pub hash_fn: fn(&[u8]) -> u64,

    #[doc(hidden)]
    pub _priv: (),
}

impl std::fmt::Debug for HtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtConfig")
            .field("capacity", &self.capacity)
            .field("hash_fn", &"<fn>")
            .finish()
    }
}

impl Default for HtConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            hash_fn: crate::ht::fnv1a_64,
            _priv: (),
        }
    }
}

impl HtConfig {
    pub fn with_capacity(mut self, capacity: usize) -> Result<Self, &'static str> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err("capacity must be a power of two");
        }
        self.capacity = capacity;
        Ok(self)
    }

    pub fn with_hash_fn(mut self, hash_fn: fn(&[u8]) -> u64) -> Self {
        self.hash_fn = hash_fn;
        self
    }
}

/// External-collaborator configuration for the worker pipeline: thread
/// count, socket timeouts, listener backlog. None of this affects RP/HT/BQ
/// semantics; it only governs how [`crate::worker_pool`] drives them.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Number of worker threads draining the bounded queue (default: `4`).
    pub worker_count: usize,
    /// TCP `listen` backlog (default: `128`).
    pub backlog: u32,
    /// Per-socket read timeout; a read that hits this deadline causes the
    /// worker to feed the parser an empty (EOS) chunk (default: `2s`).
    pub socket_read_timeout: std::time::Duration,
    /// Queue capacity shared with [`BqConfig`]; kept here too so a single
    /// `WorkerPoolConfig` is enough to start the pipeline.
    pub queue: BqConfig,

    #[doc(hidden)]
    pub _priv: (),
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 4,
            backlog: 128,
            socket_read_timeout: std::time::Duration::from_secs(2),
            queue: BqConfig::default(),
            _priv: (),
        }
    }
}
