//! ragpile-core: client library for the ragpile assistant API
//!
//! Provides the typed API client, chunked chat stream decoding, observable
//! request hooks, login plumbing, and the legacy tool-call parser.
//!
//! # Quick Start
//!
//! ```no_run
//! use ragpile_core::{ChatMessage, ChatRequest, Client, Config, UseStreamingApi};
//!
//! #[tokio::main]
//! async fn main() -> ragpile_core::Result<()> {
//!     let config = Config::default();
//!     let client = Client::from_config(&config)?;
//!     let model = config.model.clone();
//!
//!     let chat = UseStreamingApi::new(move |prompt: String| {
//!         client.chat_stream(&ChatRequest::new(model.clone(), vec![ChatMessage::user(prompt)]))
//!     });
//!     chat.call("Hello!").await?;
//!     println!("{}", chat.text());
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod hooks;
pub mod models;
pub mod pricing;
pub mod response;
pub mod stream;
pub mod tool_calls;

pub use client::{Client, LoginOutcome, SESSION_COOKIE};
pub use config::{Config, resolve_home};
pub use error::{Error, Result};
pub use hooks::{RequestState, StreamState, UseApi, UseStreamingApi};
pub use models::{ChatMessage, ChatRequest};
pub use tool_calls::{StructuredToolCall, parse_tool_calls};
