pub mod analyst;
pub mod consultant;
pub mod data_extractor;

pub use analyst::{Analyst, EvaluationDecision};
pub use consultant::{Consultant, FALLBACK_RECOMMENDATIONS, RecommendationDecision};
pub use data_extractor::{DataExtractor, ExtractionDecision, FunctionCallDecision};
