//! C11/C12: Pipeline Orchestrator and Progress/Event Bus (spec §4.11/§4.12).

pub mod events;
pub mod orchestrator;

pub use events::{EventBus, ProcessingEvent, SharedEventBus, SubscriptionHandle};
pub use orchestrator::PipelineOrchestrator;
