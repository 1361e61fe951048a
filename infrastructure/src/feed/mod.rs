//! Topic feeds

pub mod rss;

pub use rss::RssTopicSource;
