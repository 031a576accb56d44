//! Plan / execute / verify orchestrator.
//!
//! A planner model turns a task into a JSON plan, an executor model runs the
//! plan against a fixed set of HTTP lookups through tool calls, and a verifier
//! model cleans the result into the final answer.

pub mod agents;
pub mod api;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod tools;

pub use config::Config;
pub use error::{ActionError, ModelError, PipelineError, PlanError};
pub use llm::{LanguageModel, Prompt, ScriptedModel};
pub use models::{Message, Plan, PlanStep, RunState, ToolCall};
pub use pipeline::{Pipeline, Stage};
pub use tools::{Action, ActionDescriptor, ActionSet};
