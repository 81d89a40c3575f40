// End-to-end flow through the public API: config -> registry -> broker

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nowplaying_broker::{
    logging, Broker, BrokerError, Config, MemoryLibrary, RequestContext, Scrobbler,
    ScrobblerRegistry, Track,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Recorder {
    seen: Mutex<Vec<String>>,
}

struct RecordingScrobbler {
    name: &'static str,
    recorder: Arc<Recorder>,
    fail: bool,
}

#[async_trait]
impl Scrobbler for RecordingScrobbler {
    async fn now_playing(&self, ctx: &RequestContext, track: &Track) -> Result<()> {
        self.recorder
            .seen
            .lock()
            .unwrap()
            .push(format!("{}:{}:{}", self.name, ctx.username(), track.title));
        if self.fail {
            anyhow::bail!("{} rejected the update", self.name);
        }
        Ok(())
    }

    async fn scrobble(
        &self,
        _ctx: &RequestContext,
        _track: &Track,
        _play_time: DateTime<Utc>,
    ) -> Result<()> {
        Ok(())
    }
}

fn library() -> Arc<MemoryLibrary> {
    let library = MemoryLibrary::new();
    library.insert(Track {
        id: "song-1".to_string(),
        title: "Teardrop".to_string(),
        artist: "Massive Attack".to_string(),
        album: Some("Mezzanine".to_string()),
        duration: Some(330),
    });
    Arc::new(library)
}

#[tokio::test]
async fn test_full_flow_from_config() {
    logging::init("debug");

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("broker.toml");
    std::fs::write(&path, "disabled_scrobblers = [\"maloja\"]\n").unwrap();
    let config = Config::load_from(&path).unwrap();

    let recorder = Arc::new(Recorder::default());
    let registry = Arc::new(ScrobblerRegistry::new());
    for (name, fail) in [("lastfm", true), ("listenbrainz", false), ("maloja", false)] {
        let recorder = Arc::clone(&recorder);
        registry.register(name, move |_library| {
            Box::new(RecordingScrobbler {
                name,
                recorder: Arc::clone(&recorder),
                fail,
            })
        });
    }

    let broker = Broker::new(library(), registry, config.broker_options());
    let ctx = RequestContext::for_user("carol");

    broker.now_playing(&ctx, "player-1", "Living Room", "song-1").await.unwrap();

    let mut seen = recorder.seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(seen, vec!["lastfm:carol:Teardrop", "listenbrainz:carol:Teardrop"]);

    let playing = broker.get_now_playing(&ctx).await;
    assert_eq!(playing.len(), 1);
    assert_eq!(playing[0].player_name, "Living Room");
    assert_eq!(playing[0].username, "carol");

    assert_eq!(
        broker.submit(&ctx, "player-1", "song-1", Utc::now()).await,
        Err(BrokerError::NotImplemented("submit"))
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_updates_keep_one_record_per_player() {
    let broker = Broker::new(
        library(),
        Arc::new(ScrobblerRegistry::new()),
        Config::default().broker_options(),
    );

    let tasks: Vec<_> = (0..16)
        .map(|n| {
            let broker = broker.clone();
            tokio::spawn(async move {
                let ctx = RequestContext::new();
                let player = format!("player-{}", n % 4);
                broker.now_playing(&ctx, &player, "Phone", "song-1").await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let playing = broker.get_now_playing(&RequestContext::new()).await;
    assert_eq!(playing.len(), 4);
    assert!(playing.windows(2).all(|w| w[0].started_at >= w[1].started_at));
}

#[tokio::test]
async fn test_sweeper_shuts_down_with_token() {
    let broker = Broker::new(
        library(),
        Arc::new(ScrobblerRegistry::new()),
        Config::default().broker_options(),
    );

    let shutdown = CancellationToken::new();
    let sweeper = broker.spawn_sweeper(shutdown.clone());
    shutdown.cancel();

    tokio::time::timeout(Duration::from_secs(1), sweeper)
        .await
        .expect("sweeper should stop promptly")
        .unwrap();
}
