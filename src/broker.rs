// Now playing broker
// Records what each player is playing and fans the event out to every scrobbler

use crate::context::RequestContext;
use crate::library::Library;
use crate::now_playing::{Clock, NowPlayingInfo, NowPlayingStore, SystemClock};
use crate::scrobbler::{ScrobblerFactory, ScrobblerRegistry, Track};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    #[error("Request was cancelled")]
    Cancelled,
}

/// Runtime settings for the broker, usually built from `Config::broker_options`
#[derive(Debug, Clone)]
pub struct BrokerOptions {
    pub ttl: chrono::Duration,
    pub dispatch_timeout: Duration,
    pub sweep_interval: Duration,
    pub submit_dispatch: bool,
    pub disabled: HashSet<String>,
}

impl Default for BrokerOptions {
    fn default() -> Self {
        crate::config::Config::default().broker_options()
    }
}

/// What a scrobbler is being told about
#[derive(Debug, Clone, Copy)]
enum Event {
    NowPlaying,
    Submit(DateTime<Utc>),
}

impl Event {
    fn describe(&self) -> &'static str {
        match self {
            Self::NowPlaying => "now playing",
            Self::Submit(_) => "scrobble",
        }
    }
}

/// Result of handing one event to one scrobbler
#[derive(Debug)]
enum Outcome {
    Delivered,
    Failed(anyhow::Error),
    TimedOut,
    Cancelled,
    Skipped,
}

/// Process-wide now playing state plus scrobbler fan-out.
///
/// Build one at startup and clone it into every handler; clones share the
/// same store and registry.
#[derive(Clone)]
pub struct Broker {
    library: Arc<dyn Library>,
    registry: Arc<ScrobblerRegistry>,
    store: NowPlayingStore,
    clock: Arc<dyn Clock>,
    options: Arc<BrokerOptions>,
}

impl Broker {
    pub fn new(
        library: Arc<dyn Library>,
        registry: Arc<ScrobblerRegistry>,
        options: BrokerOptions,
    ) -> Self {
        Self::with_clock(library, registry, options, Arc::new(SystemClock))
    }

    pub fn with_clock(
        library: Arc<dyn Library>,
        registry: Arc<ScrobblerRegistry>,
        options: BrokerOptions,
        clock: Arc<dyn Clock>,
    ) -> Self {
        log::info!(
            "Now playing broker ready: {} scrobbler(s) [{}], ttl {}s, dispatch timeout {:?}",
            registry.len(),
            registry.names().join(", "),
            options.ttl.num_seconds(),
            options.dispatch_timeout
        );

        Self {
            store: NowPlayingStore::new(options.ttl, Arc::clone(&clock)),
            library,
            registry,
            clock,
            options: Arc::new(options),
        }
    }

    pub fn options(&self) -> &BrokerOptions {
        &self.options
    }

    /// Record that `player_id` started `track_id` and notify every scrobbler.
    ///
    /// Scrobbler and lookup failures are logged and never returned.
    pub async fn now_playing(
        &self,
        ctx: &RequestContext,
        player_id: &str,
        player_name: &str,
        track_id: &str,
    ) -> Result<(), BrokerError> {
        let info = NowPlayingInfo {
            track_id: track_id.to_string(),
            started_at: self.clock.now(),
            username: ctx.username().to_string(),
            player_id: player_id.to_string(),
            player_name: player_name.to_string(),
        };
        self.store.put(info);

        self.dispatch(ctx, track_id, Event::NowPlaying).await;
        Ok(())
    }

    /// Everything currently playing, most recently started first
    pub async fn get_now_playing(&self, _ctx: &RequestContext) -> Vec<NowPlayingInfo> {
        let mut playing = self.store.snapshot();
        playing.sort_by(|a, b| {
            b.started_at
                .cmp(&a.started_at)
                .then_with(|| a.player_id.cmp(&b.player_id))
        });
        playing
    }

    /// Report a completed play.
    ///
    /// Only forwarded to scrobblers when `submit_dispatch` is enabled,
    /// otherwise answers `BrokerError::NotImplemented`.
    pub async fn submit(
        &self,
        ctx: &RequestContext,
        player_id: &str,
        track_id: &str,
        play_time: DateTime<Utc>,
    ) -> Result<(), BrokerError> {
        if !self.options.submit_dispatch {
            log::debug!(
                "Ignoring submit from player {} for track {}: submit dispatch is disabled",
                player_id,
                track_id
            );
            return Err(BrokerError::NotImplemented("submit"));
        }

        if ctx.is_cancelled() {
            return Err(BrokerError::Cancelled);
        }

        log::debug!(
            "Submitting play of track {} from player {} at {}",
            track_id,
            player_id,
            play_time
        );
        self.dispatch(ctx, track_id, Event::Submit(play_time)).await;
        Ok(())
    }

    /// Start the background task evicting expired now playing records
    pub fn spawn_sweeper(&self, token: CancellationToken) -> JoinHandle<()> {
        self.store.spawn_sweeper(self.options.sweep_interval, token)
    }

    async fn dispatch(
        &self,
        ctx: &RequestContext,
        track_id: &str,
        event: Event,
    ) -> Vec<(String, Outcome)> {
        let ctx = ctx.child();

        let Some(track) = self.resolve_track(&ctx, track_id).await else {
            return Vec::new();
        };

        let calls = self.registry.all().into_iter().map(|(name, factory)| {
            let ctx = &ctx;
            let track = &track;
            async move {
                let outcome = if self.options.disabled.contains(&name) {
                    Outcome::Skipped
                } else {
                    log::debug!(
                        "Sending {} info to {}: {} - {} ({})",
                        event.describe(),
                        name,
                        track.artist,
                        track.title,
                        track.id
                    );
                    self.call_scrobbler(ctx, &factory, track, event).await
                };
                log_outcome(&name, track, event, &outcome);
                (name, outcome)
            }
        });

        join_all(calls).await
    }

    async fn resolve_track(&self, ctx: &RequestContext, track_id: &str) -> Option<Track> {
        let lookup = tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => {
                log::warn!("Dispatch for track {} cancelled during lookup", track_id);
                return None;
            }
            lookup = tokio::time::timeout(
                self.options.dispatch_timeout,
                self.library.track(track_id),
            ) => lookup,
        };

        match lookup {
            Ok(Ok(track)) => Some(track),
            Ok(Err(e)) => {
                log::error!("Error retrieving track {}, no scrobbler notified: {}", track_id, e);
                None
            }
            Err(_) => {
                log::error!(
                    "Timed out after {:?} retrieving track {}, no scrobbler notified",
                    self.options.dispatch_timeout,
                    track_id
                );
                None
            }
        }
    }

    async fn call_scrobbler(
        &self,
        ctx: &RequestContext,
        factory: &ScrobblerFactory,
        track: &Track,
        event: Event,
    ) -> Outcome {
        let scrobbler = factory(Arc::clone(&self.library));

        // Whatever the scrobbler spawned on this context stops with the call
        let call_ctx = ctx.child();
        let _guard = call_ctx.cancellation().clone().drop_guard();

        let call = async {
            match event {
                Event::NowPlaying => scrobbler.now_playing(&call_ctx, track).await,
                Event::Submit(play_time) => scrobbler.scrobble(&call_ctx, track, play_time).await,
            }
        };

        tokio::select! {
            biased;
            _ = ctx.cancellation().cancelled() => Outcome::Cancelled,
            result = tokio::time::timeout(self.options.dispatch_timeout, call) => match result {
                Ok(Ok(())) => Outcome::Delivered,
                Ok(Err(e)) => Outcome::Failed(e),
                Err(_) => Outcome::TimedOut,
            },
        }
    }
}

fn log_outcome(name: &str, track: &Track, event: Event, outcome: &Outcome) {
    match outcome {
        Outcome::Delivered => {
            log::debug!("{}: {} updated for track {}", name, event.describe(), track.id)
        }
        Outcome::Skipped => log::debug!("{}: disabled, skipping track {}", name, track.id),
        Outcome::Failed(e) => log::error!(
            "{}: error sending {} info for track {} ({} - {}): {:#}",
            name,
            event.describe(),
            track.id,
            track.artist,
            track.title,
            e
        ),
        Outcome::TimedOut => log::error!(
            "{}: timed out sending {} info for track {} ({} - {})",
            name,
            event.describe(),
            track.id,
            track.artist,
            track.title
        ),
        Outcome::Cancelled => log::warn!(
            "{}: cancelled while sending {} info for track {} ({} - {})",
            name,
            event.describe(),
            track.id,
            track.artist,
            track.title
        ),
    }
}
