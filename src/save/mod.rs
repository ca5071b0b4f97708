//! Save-title conflict resolution and persistence orchestration

mod errors;
mod orchestrator;

pub use errors::{SaveError, SaveResult};
pub use orchestrator::{
    DecisionPrompt, FallbackSink, FixedPayload, PayloadSource, SaveOrchestrator, SaveOutcome,
};
