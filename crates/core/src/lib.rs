pub mod compliance;
pub mod config;
pub mod domain;
pub mod errors;
pub mod gateway;
pub mod pipeline;
pub mod summary;

pub use compliance::{check_topics, ComplianceVerdict};
pub use domain::draft::{InteractionDraft, InteractionPatch, NewInteraction};
pub use domain::interaction::{Interaction, InteractionId, InteractionType, Outcome};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use gateway::{GatewayError, InteractionGateway};
pub use pipeline::PipelineState;
