pub mod classifier;
pub mod error;
pub mod extract;
pub mod feed;
pub mod fetch;
pub mod result;

pub use classifier::{ClassifierSettings, LinkClassifier};
pub use error::{FetchFailure, ScanError};
pub use extract::{ContentExtractor, ExtractorSettings};
pub use feed::{discover_feeds, parse_feed};
pub use fetch::{ContentKind, FetchConfig, Fetcher};
pub use result::{CandidateLink, Extracted, FeedEntry};
