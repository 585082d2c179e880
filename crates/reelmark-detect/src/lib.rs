//! Streaming-page detection: which platform a page belongs to, whether it is
//! a playback page, what title it shows, and when a title is worth reporting.

pub mod gate;
pub mod page;
pub mod platform;
pub mod resolver;

pub use gate::{EmissionGate, DEFAULT_COOLDOWN};
pub use page::{PageDocument, PageLocation, PageSource, StaticPage};
pub use platform::{Platform, UnknownPlatform};
pub use resolver::{PlatformDef, ResolvedTitle, ResolverRegistry, SelectorResolver, TitleResolver};
