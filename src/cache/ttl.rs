//! TTL selection for writes.

use std::time::Duration;

use parking_lot::RwLock;

use crate::config::CacheConfig;

/// Requested lifetime of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Ttl {
    /// Use whatever the configured default is at the time of the write.
    #[default]
    Default,
    /// Never expire.
    Never,
    /// Expire after the given duration.
    After(Duration),
}

impl Ttl {
    pub fn secs(secs: u64) -> Self {
        Ttl::After(Duration::from_secs(secs))
    }

    /// The lifetime to hand to the store. `None` means no expiry.
    pub fn resolve(self, source: &dyn TtlSource) -> Option<Duration> {
        match self {
            Ttl::Default => source.default_ttl(),
            Ttl::Never => None,
            Ttl::After(ttl) => Some(ttl),
        }
    }
}

impl From<Duration> for Ttl {
    fn from(ttl: Duration) -> Self {
        Ttl::After(ttl)
    }
}

impl From<Option<Duration>> for Ttl {
    fn from(ttl: Option<Duration>) -> Self {
        ttl.map_or(Ttl::Never, Ttl::After)
    }
}

/// Supplies the default TTL. Read on every write, never cached.
pub trait TtlSource: Send + Sync {
    fn default_ttl(&self) -> Option<Duration>;
}

/// Runtime-adjustable default TTL.
#[derive(Debug)]
pub struct CacheSettings {
    default_ttl: RwLock<Option<Duration>>,
}

impl CacheSettings {
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            default_ttl: RwLock::new(default_ttl),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.default_ttl())
    }

    /// Replace the default. Applies from the next write on.
    pub fn set_default_ttl(&self, ttl: Option<Duration>) {
        *self.default_ttl.write() = ttl;
    }
}

impl TtlSource for CacheSettings {
    fn default_ttl(&self) -> Option<Duration> {
        *self.default_ttl.read()
    }
}

impl TtlSource for CacheConfig {
    fn default_ttl(&self) -> Option<Duration> {
        CacheConfig::default_ttl(self)
    }
}
