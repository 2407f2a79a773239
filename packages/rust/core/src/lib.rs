//! Pipeline orchestration for Competitor Intel.
//!
//! - [`pipeline`]: the staged analysis run and its collaborators
//! - [`prompts`]: prompt builders and the JSON response boundary
//! - [`scoring`]: pure report assembly and scoring helpers
//! - [`llm`], [`notify`]: OpenRouter and Resend bindings
//! - [`delivery`], [`chat`]: operations on finished reports

pub mod chat;
pub mod delivery;
pub mod llm;
pub mod notify;
pub mod pipeline;
pub mod prompts;
pub mod scoring;

pub use llm::OpenRouterClient;
pub use notify::ResendNotifier;
pub use pipeline::{Pipeline, PipelineRun, RunOptions, Services, run_pipeline};
