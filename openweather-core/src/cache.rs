//! Key/value cache with per-key expiration over a pluggable backing store.
//!
//! Expiration metadata is kept as an ordinary entry under `<key>_expire` in the
//! same store. Reading a key whose marker lies in the past evicts both the value
//! and the marker before reporting a miss.

pub mod store;

pub use store::{FileStore, MemoryStore, Slot, Store};

use chrono::{DateTime, Utc};
use std::{fmt::Debug, path::PathBuf, str::FromStr, sync::Arc, time::Duration};

/// Source of "now" for expiration checks.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Never,
    /// Relative to the time of the write. A zero duration means [`Expiry::Never`].
    After(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// In-process map, lost on restart.
    Ephemeral,
    /// On-disk document, survives restarts.
    Persistent,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Ephemeral => "ephemeral",
            Strategy::Persistent => "persistent",
        }
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_lowercase().as_str() {
            "ephemeral" | "memory" => Ok(Strategy::Ephemeral),
            "persistent" | "disk" => Ok(Strategy::Persistent),
            _ => Err(anyhow::anyhow!(
                "Unknown cache strategy '{value}'. Supported strategies: persistent, ephemeral."
            )),
        }
    }
}

#[derive(Debug)]
pub struct Cache {
    strategy: Strategy,
    store: Box<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Cache {
    pub fn ephemeral() -> Self {
        Self::with_store(Strategy::Ephemeral, Box::new(MemoryStore::new()), Arc::new(SystemClock))
    }

    pub fn persistent(path: impl Into<PathBuf>) -> Self {
        Self::with_store(Strategy::Persistent, Box::new(FileStore::open(path)), Arc::new(SystemClock))
    }

    pub fn with_store(strategy: Strategy, store: Box<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { strategy, store, clock }
    }

    /// Replace the clock used for expiration checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Return the bytes stored under `key`, evicting them first if expired.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let marker = expiration_key(key);

        if let Some(Slot::Expiry(at)) = self.store.load(&marker) {
            if at < self.clock.now() {
                tracing::debug!("Cache entry expired: {key} ({})", self.store.name());
                self.evict(&marker);
                self.evict(key);
                return None;
            }
        }

        match self.store.load(key) {
            Some(Slot::Data(bytes)) => Some(bytes),
            _ => None,
        }
    }

    /// Store `value` under `key` and return what a subsequent [`Cache::get`] sees.
    pub fn put(&self, key: &str, value: Vec<u8>, expires: Expiry) -> Option<Vec<u8>> {
        self.put_slot(key, Slot::Data(value), expires);
        self.get(key)
    }

    /// Remove the value under `key`.
    ///
    /// The expiration marker is left in place; [`Cache::get`] cleans it up when it
    /// next finds it expired.
    pub fn evict(&self, key: &str) {
        self.store.remove(key);
    }

    fn put_slot(&self, key: &str, slot: Slot, expires: Expiry) {
        self.define_expiration(key, expires);
        self.store.save(key, slot);
    }

    fn define_expiration(&self, key: &str, expires: Expiry) {
        let marker = expiration_key(key);

        let at = match expires {
            Expiry::After(ttl) if !ttl.is_zero() => chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| self.clock.now().checked_add_signed(ttl)),
            _ => None,
        };

        match at {
            // Markers never expire themselves, so this recurses exactly once.
            Some(at) => self.put_slot(&marker, Slot::Expiry(at), Expiry::Never),
            None => self.evict(&marker),
        }
    }
}

pub fn expiration_key(key: &str) -> String {
    format!("{key}_expire")
}
