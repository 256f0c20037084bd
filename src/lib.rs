//! # tubechan
//!
//! Relays new uploads of YouTube channels and playlists into a Telegram
//! channel as audio posts.
//!
//! ## Architecture
//!
//! ```text
//! Scheduler → Lister + Diff → Publisher → Cursor store
//! ```
//!
//! Each cycle the scheduler visits every feed, the diff engine lists the
//! items newer than the feed's cursor, and the publisher delivers them one at
//! a time, advancing the cursor after each delivered item.
//!
//! ## Quick Start
//!
//! ```bash
//! # Write a default config and fill it in
//! tubechan
//!
//! # Show feeds and cursors
//! tubechan feeds
//!
//! # One cycle, then exit
//! tubechan once
//!
//! # Keep syncing every interval
//! tubechan run
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the lister,
/// media source, messenger, transcoder and cursor store.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/tubechan/config.toml`.
pub mod config;

/// Core domain models.
///
/// - [`Feed`](domain::Feed) and its [`Cursor`](domain::Cursor)
/// - [`FeedItem`](domain::FeedItem) with thumbnails
/// - [`DeliveryOutcome`](domain::DeliveryOutcome)
pub mod domain;

pub mod media;

pub mod messenger;

/// Title cleanup and description splitting.
pub mod normalizer;

pub mod publisher;

pub mod scheduler;

/// Feed listing and the diff against the stored cursor.
pub mod source;

/// Cursor persistence.
///
/// - [`CursorStore`](store::CursorStore): async trait with `get`/`put`
/// - [`HttpCursorStore`](store::HttpCursorStore): remote JSON document
/// - [`FileCursorStore`](store::FileCursorStore): local JSON file
/// - [`MemoryCursorStore`](store::MemoryCursorStore): in-process, for tests
pub mod store;

/// External audio transcoder.
pub mod transcoder;
