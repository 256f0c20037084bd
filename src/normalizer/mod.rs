//! Text shaping for outgoing messages.

pub mod chunker;
pub mod title;

pub use chunker::{split_paragraphs, MESSAGE_CEILING};
pub use title::TitleNormalizer;
