//! Long-polling side of ReviewHerald: the review API client and the cursor
//! that tracks how far it has read.

pub mod cursor;
pub mod review;

pub use cursor::CursorStore;
pub use review::{DevmanPoller, ReviewPoller};
