//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the application to external systems:
//! - `registry` - Live connection registry (in-memory, sharded)
//! - `memory` - In-memory store and directory for development and tests
//! - `postgres` - PostgreSQL store and directory
//! - `ai` - Assistant providers (OpenAI, mock)
//! - `auth` - Session validators (JWT, mock)
//! - `http` - REST endpoints and auth middleware
//! - `websocket` - Live chat transport

pub mod ai;
pub mod auth;
pub mod http;
pub mod memory;
pub mod postgres;
pub mod registry;
pub mod websocket;
