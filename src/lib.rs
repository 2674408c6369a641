//! Parley - presence-aware private messaging
//!
//! Authenticated users exchange direct messages in real time, see which
//! contacts are online, page through conversation history, and ask a shared
//! assistant participant questions inside a conversation.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
