//! Now-playing broker.
//!
//! Keeps a short-lived record of what every connected player is playing and
//! forwards each update to the registered scrobbling services, each call
//! bounded by its own timeout and isolated from the others.
//!
//! A process builds one [`ScrobblerRegistry`], registers its services, and
//! hands it to a single [`Broker`] that is cloned into request handlers.

pub mod broker;
pub mod config;
pub mod context;
pub mod library;
pub mod logging;
pub mod now_playing;
pub mod scrobbler;

pub use broker::{Broker, BrokerError, BrokerOptions};
pub use config::Config;
pub use context::RequestContext;
pub use library::{Library, LibraryError, MemoryLibrary};
pub use now_playing::{Clock, ManualClock, NowPlayingInfo, NowPlayingStore, SystemClock};
pub use scrobbler::{Scrobbler, ScrobblerFactory, ScrobblerRegistry, Track};
