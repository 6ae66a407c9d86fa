//! Report aggregation
//!
//! # Scoring Formula
//!
//! ```text
//! entity score   = mean(rule scores of the node)        0 and "unscored" if none
//! project score  = mean(entity scores of scored nodes)  one weight per entity
//! compound score = 1 - Π(1 - s_f)                       over function descendants
//! ```
//!
//! Entities are weighted equally regardless of size. Unscored and malformed
//! entities do not count towards the project score.
//!
//! # Example
//!
//! Three functions scoring 0.0, 0.5 and 1.0 give a project score of 0.5. A
//! class whose two methods both score 0.5 has a compound score of 0.75.

mod aggregator;

pub use aggregator::{Aggregator, Collector};
