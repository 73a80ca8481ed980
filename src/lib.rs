//! Multichat is a terminal chat client for several hosted LLM providers.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core::attachment`] turns user files into inline base64 data URLs or
//!   decoded text, under a type allow-list and a size cap.
//! - [`core::providers`] holds one adapter per vendor (OpenAI, Anthropic,
//!   Google) and the registry that resolves a model name to its adapter.
//! - [`core::dispatch`] performs the HTTP exchange and classifies failures.
//! - [`core::session`] owns the conversation log, secret key and model
//!   selection, mirrored to client-local storage after every change.
//!
//! The binary (`src/main.rs`) routes through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod utils;
