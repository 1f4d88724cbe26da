//! State module for tracking one account's harvest
//!
//! # Components
//!
//! - `CrawlPhase`: where the account's state machine currently is
//! - `CrawlState`: per-account counters and the set of already-emitted post ids
//! - `ResumeCursor`: the since-date written back for the next run

mod crawl_state;
mod cursor;
mod phase;

// Re-export main types
pub use crawl_state::CrawlState;
pub use cursor::ResumeCursor;
pub use phase::CrawlPhase;
