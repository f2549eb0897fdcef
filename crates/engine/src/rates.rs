//! Function rate limits
//!
//! The engine does not limit anything itself. It names one bucket per
//! function and limit kind, primes the bucket defaults at prepare and
//! checks the buckets when asked. [`MemBuckets`] is a fixed window
//! implementation of the [`Buckets`] seam for tests and single-node use.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use appstruct_core::{AppQName, QName, WsId};

/// What a function rate limit is counted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RateLimitKind {
    /// One bucket for the whole application
    ByApp,
    /// One bucket per workspace
    ByWorkspace,
    /// One bucket per caller ID; not checked by the engine
    ById,
}

impl RateLimitKind {
    fn suffix(self) -> &'static str {
        match self {
            RateLimitKind::ByApp => "byApp",
            RateLimitKind::ByWorkspace => "byWS",
            RateLimitKind::ById => "byID",
        }
    }
}

/// Allowed calls per period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    /// Window length
    pub period: Duration,
    /// Calls allowed per window
    pub max_tokens: u64,
}

/// State of one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    /// Window length
    pub period: Duration,
    /// Tokens available per window
    pub max_tokens: u64,
    /// Tokens taken in the current window
    pub taken_tokens: u64,
}

impl From<RateLimit> for BucketState {
    fn from(limit: RateLimit) -> Self {
        Self {
            period: limit.period,
            max_tokens: limit.max_tokens,
            taken_tokens: 0,
        }
    }
}

/// Address of one bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketKey {
    /// Bucket name, see [`function_rate_limit_name`]
    pub rate_limit_name: String,
    /// Limited function
    pub qname: QName,
    /// Application, for per-application buckets
    pub app: Option<AppQName>,
    /// Workspace, for per-workspace buckets; 0 otherwise
    pub workspace: WsId,
}

/// Rate limiter collaborator
pub trait Buckets: Send + Sync {
    /// Sets the state new buckets named `rate_limit_name` start with.
    fn set_default_bucket_state(&self, rate_limit_name: &str, state: BucketState);

    /// Takes `n` tokens from every bucket in `keys`, or from none.
    ///
    /// Returns false if any bucket lacks tokens. Keys whose name has no
    /// default state are not limited.
    fn take_tokens(&self, keys: &[BucketKey], n: u64) -> bool;
}

/// Creates rate limiter collaborators per application
pub trait BucketsFactory: Send + Sync {
    /// New collaborator.
    fn buckets(&self) -> Arc<dyn Buckets>;
}

/// Bucket name of a function limit: `func_<qname>_byApp`,
/// `func_<qname>_byWS` or `func_<qname>_byID`.
pub fn function_rate_limit_name(func: &QName, kind: RateLimitKind) -> String {
    format!("func_{}_{}", func, kind.suffix())
}

struct Window {
    state: BucketState,
    started: Instant,
}

impl Window {
    fn roll(&mut self, now: Instant) {
        if now.duration_since(self.started) >= self.state.period {
            self.started = now;
            self.state.taken_tokens = 0;
        }
    }

    fn available(&self) -> u64 {
        self.state.max_tokens.saturating_sub(self.state.taken_tokens)
    }
}

#[derive(Default)]
struct MemBucketsState {
    defaults: FxHashMap<String, BucketState>,
    windows: FxHashMap<BucketKey, Window>,
}

/// In-memory fixed window buckets
#[derive(Default)]
pub struct MemBuckets {
    state: Mutex<MemBucketsState>,
}

impl MemBuckets {
    /// Empty buckets: nothing is limited until defaults are set.
    pub fn new() -> Self {
        Self::default()
    }

    /// State of one bucket, if it is limited.
    pub fn bucket_state(&self, key: &BucketKey) -> Option<BucketState> {
        let s = self.state.lock();
        match s.windows.get(key) {
            Some(w) => Some(w.state),
            None => s.defaults.get(&key.rate_limit_name).copied(),
        }
    }
}

impl fmt::Debug for MemBuckets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.lock();
        f.debug_struct("MemBuckets")
            .field("defaults", &s.defaults.len())
            .field("buckets", &s.windows.len())
            .finish()
    }
}

impl Buckets for MemBuckets {
    fn set_default_bucket_state(&self, rate_limit_name: &str, state: BucketState) {
        self.state
            .lock()
            .defaults
            .insert(rate_limit_name.to_string(), state);
    }

    fn take_tokens(&self, keys: &[BucketKey], n: u64) -> bool {
        let now = Instant::now();
        let mut guard = self.state.lock();
        let s = &mut *guard;

        let mut limited = Vec::with_capacity(keys.len());
        for key in keys {
            let Some(default) = s.defaults.get(&key.rate_limit_name) else {
                continue;
            };
            let w = s.windows.entry(key.clone()).or_insert_with(|| Window {
                state: *default,
                started: now,
            });
            w.roll(now);
            if w.available() < n {
                return false;
            }
            limited.push(key);
        }
        for key in limited {
            if let Some(w) = s.windows.get_mut(key) {
                w.state.taken_tokens += n;
            }
        }
        true
    }
}

/// Factory of independent [`MemBuckets`]
#[derive(Debug, Default, Clone, Copy)]
pub struct MemBucketsFactory;

impl MemBucketsFactory {
    /// New factory.
    pub fn new() -> Self {
        Self
    }
}

impl BucketsFactory for MemBucketsFactory {
    fn buckets(&self) -> Arc<dyn Buckets> {
        Arc::new(MemBuckets::new())
    }
}
