//! Listing acquisition for the legal-document portal.
//!
//! - Record extraction from listing markup (`extract`)
//! - Hidden-field continuation tokens for postback paging (`postback`)
//! - The pagination state machine producing a deduplicated batch (`paginate`)
//! - Listing URLs and the recency feeds (`feed`)
//!
//! Nothing in this crate writes to disk; batches are handed to
//! `lexharvest-store` for merging.

pub mod extract;
pub mod feed;
pub mod paginate;
pub mod postback;

pub use extract::{RECENT_FEED_CAP, RecordExtractor};
pub use feed::RecentFeed;
pub use paginate::{HarvestBatch, PaginationOptions, Paginator, StopReason};
pub use postback::ContinuationState;
