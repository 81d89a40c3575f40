// Scrobbler module
// The capability every scrobbling service implements, and the registry of services

pub mod registry;
pub mod traits;

pub use registry::{ScrobblerFactory, ScrobblerRegistry};
pub use traits::{Scrobbler, Track};
