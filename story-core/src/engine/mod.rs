//! Narrative-state reconciliation pipeline.
//!
//! The engine turns free-text player actions into validated story
//! segments and merged world state: context assembly, narrative
//! generation, heuristic consistency validation, fact extraction, and
//! delta reconciliation, driven by the orchestrator's bounded retry
//! loop.

pub mod context;
pub mod extract;
pub mod generator;
pub mod orchestrator;
pub mod reconcile;
mod text;
pub mod validator;

pub use context::{ContextBuilder, ContextPackage, CorrectionLog, RECENT_EVENT_WINDOW};
pub use extract::{FactExtractor, RegexFactExtractor};
pub use generator::{
    DeepSeekBackend, Generation, GenerationMetadata, GeneratorError, NarrativeGenerator,
    SamplingParams, TextBackend,
};
pub use orchestrator::{
    EngineError, Orchestrator, TurnMetadata, TurnOutcome, ACCEPT_THRESHOLD, BOOTSTRAP_INPUT,
    MAX_ATTEMPTS,
};
pub use reconcile::StateReconciler;
pub use validator::{ConsistencyValidator, ValidationResult};
