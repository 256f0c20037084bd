pub mod feed;
pub mod item;
pub mod outcome;

pub use feed::{Cursor, Feed, FeedOptions, FeedSource};
pub use item::{FeedItem, MediaInfo, MediaVariant, Thumbnail, Thumbnails};
pub use outcome::{DeliveryOutcome, Stage};
