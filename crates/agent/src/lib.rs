//! Question-answering runtime.
//!
//! This crate is the "brain" of the solvent system. Given a free-form
//! question it:
//! - Short-circuits through a persistent exact-match answer cache
//! - Runs a bounded think/act loop against a reasoning engine
//! - Dispatches engine-requested capability calls sequentially
//! - Normalizes the raw answer text into a bare final value
//!
//! # Architecture
//!
//! 1. **Cache check** (`cache`) - exact question text lookup, zero engine
//!    calls on a hit
//! 2. **Decision** (`llm`, `gateway`) - ordered engines with per-engine
//!    retry budgets and failover
//! 3. **Tool execution** (`tools`, `capabilities`) - sequential, failures
//!    become observations instead of errors
//! 4. **Normalization** (`normalize`) - unwrap fences/envelopes, strip
//!    prose prefixes
//!
//! # Key Types
//!
//! - `Answerer` - caller-facing service (see `answerer` module)
//! - `ReasoningEngine` - pluggable trait for decision backends
//! - `Capability` - pluggable trait for tools the engine may request
//!
//! # Degradation Principle
//!
//! A run never fails outright. Engine exhaustion, the iteration ceiling,
//! and cancellation all degrade to a best-effort answer taken from the
//! most recent assistant text.

pub mod answerer;
pub mod cache;
pub mod capabilities;
pub mod gateway;
pub mod llm;
pub mod normalize;
pub mod runtime;
pub mod tools;
pub mod transcript;

pub use answerer::{Answerer, AnswerOrigin, AnswerReport};
pub use cache::AnswerCache;
pub use gateway::{EngineGateway, GatewayOutcome};
pub use llm::{ChatHttpEngine, Decision, ReasoningEngine, ToolDefinition};
pub use normalize::{normalize, normalize_for_question};
pub use runtime::{CancelHandle, CancelToken, ReasoningLoop, RunResult};
pub use tools::{Capability, CapabilityContext, CapabilityDispatcher, CapabilityRegistry};
pub use transcript::TranscriptWriter;
