pub mod feed;
pub mod models;

pub use feed::{FeedItem, RepostView};
pub use models::*;
