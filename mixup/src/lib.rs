//! Grouping mixup: post-retrieval re-ranking that interleaves hits across a
//! grouping key while keeping score order inside each group.

pub mod candidate;
pub mod config;
pub mod error;
pub mod limiter;
pub mod metrics;
pub mod pager;
pub mod ranking;
pub mod request;

pub use candidate::{Candidate, FieldValues, GroupKey, Hits};
pub use config::{Config, GroupingMixupConfig, RerankConfig};
pub use error::{Error, Result};
pub use limiter::limit_partition;
pub use ranking::{DeclineRegistry, DeclineSpec, GroupingReranker, RerankStats, StoredFields};
pub use request::{MixupRequest, MixupResponse, ScoredHit};
