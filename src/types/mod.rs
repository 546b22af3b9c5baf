pub mod chart;
pub mod envelope;
pub mod role;
pub mod state;

pub use chart::{ChartKind, ChartSpec, PieChart, SeriesChart};
pub use envelope::{AnalysisEnvelope, RunStatus};
pub use role::{RoleInstructions, RoleKind};
pub use state::{
    AnalysisState, DatasetMap, EvaluationUpdate, ExtractionUpdate, IssueKind, IterationTrace,
    RecommendationUpdate, RunIssue,
};
