//! Discord-facing presentation: reply texts and embeds.

pub mod embeds;
