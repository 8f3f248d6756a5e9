//! Candidate detection: the detector abstraction, the event and authorizer
//! detectors, and the aggregator that fans a block range out to all of them.

pub mod aggregator;
pub mod authorizer;
pub mod detector;
pub mod event;

pub use aggregator::{wait_for_candidate_results, CandidateAggregator};
pub use authorizer::AuthorizerCandidateDetector;
pub use detector::{BlockRange, CandidateDetector, CandidateResult};
pub use event::{EventCandidateDetector, MAX_EVENT_RANGE};
