// Re-export modules
pub mod browser;
pub mod candidate;
pub mod config;
pub mod matcher;
pub mod parsers;
pub mod pipeline;
pub mod similarity;
pub mod utils;

// Re-export commonly used types for convenience
pub use candidate::{Candidate, MatchResult, ShoppingItem};
pub use config::AppConfig;
pub use matcher::{Matcher, MatcherConfig, NoMatch, Scorer};
pub use pipeline::{Pipeline, RunReport};

/// Error type for fallible I/O across the crate
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
