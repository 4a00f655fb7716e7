pub mod signal_feed;

pub use signal_feed::{SignalFeedClient, SignalFeedError, SignalSource};
