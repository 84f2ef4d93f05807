//! Agent runtime - conversation-to-record extraction and orchestration
//!
//! This crate is the "brain" of the replog system. It turns a field rep's
//! natural-language description of an HCP interaction into a structured,
//! compliance-checked record and exactly one routed action:
//!
//! 1. **Field Extraction** (`extractor`) - Parse NL → partial `InteractionDraft`
//! 2. **Summary / Compliance** - delegated to `replog-core` pure functions
//! 3. **Action Routing** (`router`) - One closed `ActionRequest` per message
//! 4. **Persistence** - through the core's `InteractionGateway` seam
//!
//! # Key Types
//!
//! - `ChatPipeline` - Single-pass orchestrator (see `pipeline` module)
//! - `UnderstandingClient` - Pluggable trait for Groq/OpenAI/Ollama/rules
//! - `ActionRouter` - Closed tool dispatch and reply composition
//!
//! # Safety Principle
//!
//! The language model is strictly a translator. It proposes tool invocations
//! from a closed set; parsing, validation, compliance checking, and the
//! decision to persist are deterministic and happen here.

pub mod extractor;
pub mod groq;
pub mod llm;
pub mod pipeline;
pub mod router;
pub mod rules;

pub use extractor::{Extraction, FieldExtractor};
pub use groq::GroqClient;
pub use llm::{
    interaction_tool_schemas, ChatMessage, CompletionOutcome, Role, ToolInvocation, ToolSchema,
    UnderstandingClient, UnderstandingError,
};
pub use pipeline::{ChatOutcome, ChatPipeline, ChatRequest, ConversationState};
pub use router::{ActionRequest, ActionRouter, RoutedReply};
pub use rules::RuleBasedClient;
