mod record;
mod session;

pub use record::{InvalidRating, Rating, RecordKey, ViewingEvent, WatchRecord};
pub use reelmark_detect::Platform;
pub use session::{AuthSession, SessionUser};
