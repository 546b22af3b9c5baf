pub mod cli;
pub mod config;
pub mod error;
pub mod i18n;
pub mod insights;
pub mod llm;
pub mod types;
pub mod warehouse;
pub mod workflow;

// Re-export commonly used types
pub use config::Config;
pub use error::WorkflowError;
pub use llm::{RoleInvoker, ScriptedInvoker};
pub use types::{AnalysisEnvelope, ChartSpec, RunStatus};
pub use warehouse::{DatasetProvider, SampleWarehouse};
pub use workflow::{LaunchMode, Workflow, WorkflowContext, launch};
