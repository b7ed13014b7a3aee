//! RequiredAI: Requirement-Enforcing Chat Completions
//!
//! A gateway between chat clients and language-model backends. Clients attach
//! declarative requirements to a chat-completion request; the gateway checks
//! each candidate answer against them and drives a bounded revision loop until
//! every requirement holds or the iteration bound is reached.

pub mod backend;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod logging;
pub mod message;
pub mod requirement;

pub use error::GatewayError;
pub use message::{Message, Role};
