//! LLM integration - OpenAI-compatible providers
//!
//! This module provides:
//! - HTTP client for chat completions against any configured provider
//! - Request/response types matching the OpenAI-compatible API
//! - An injected provider context with ordered model fallback and quota tracking

mod client;
mod provider;
mod types;

pub use client::{LlmClient, LlmClientBuilder};
pub use provider::{AttemptRecord, CompletionBackend, ModelCandidate, ModelTier, ProviderContext};
pub use types::{
    ChatRequest, ChatResponse, Choice, FinishReason, LlmResponse, Message, MessageRole, Usage,
};
