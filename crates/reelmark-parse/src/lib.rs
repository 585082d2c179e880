//! Series-level title cleaning for streaming titles.
//!
//! Player overlays usually show the episode alongside the show name
//! ("Dark S01E03", "Drama: Episode 3"). Metadata lookups want the series,
//! so [`clean`] cuts the title at the first episode marker it can find.

pub mod clean;
pub mod marker;

pub use clean::{clean, clean_title, Cleaned};
pub use marker::MarkerKind;
