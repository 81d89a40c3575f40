// Now playing store
// Keeps one record per player, each expiring a fixed time after its last write

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What a player reported it is playing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowPlayingInfo {
    pub track_id: String,
    pub started_at: DateTime<Utc>,
    pub username: String,
    pub player_id: String,
    pub player_name: String,
}

/// Source of "now" for record timestamps and expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    info: NowPlayingInfo,
    expires_at: DateTime<Utc>,
}

impl Entry {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Player id -> now playing record with fixed TTL.
///
/// Reads never extend an entry's lifetime; only `put` does. Expired entries
/// are hidden from every read immediately and physically removed by
/// `purge_expired` (or the sweeper task).
#[derive(Clone)]
pub struct NowPlayingStore {
    entries: Arc<DashMap<String, Entry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl NowPlayingStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            clock,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Insert or replace the record for `info.player_id`, restarting its TTL
    pub fn put(&self, info: NowPlayingInfo) {
        let expires_at = self
            .clock
            .now()
            .checked_add_signed(self.ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        self.entries
            .insert(info.player_id.clone(), Entry { info, expires_at });
    }

    /// Live record for one player
    pub fn get(&self, player_id: &str) -> Option<NowPlayingInfo> {
        let now = self.clock.now();
        self.entries
            .get(player_id)
            .filter(|e| e.is_live(now))
            .map(|e| e.info.clone())
    }

    /// Every live record, in no particular order
    pub fn snapshot(&self) -> Vec<NowPlayingInfo> {
        let now = self.clock.now();
        self.entries
            .iter()
            .filter(|e| e.is_live(now))
            .map(|e| e.info.clone())
            .collect()
    }

    /// Number of live records
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.entries.iter().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, e| e.is_live(now));
        before.saturating_sub(self.entries.len())
    }

    /// Periodically purge expired entries until `token` is cancelled
    pub fn spawn_sweeper(
        &self,
        every: std::time::Duration,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        log::debug!("Now playing sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let removed = store.purge_expired();
                        if removed > 0 {
                            log::debug!("Expired {} now playing entries", removed);
                        }
                    }
                }
            }
        })
    }
}
