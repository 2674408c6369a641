//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, timestamps, errors, auth types)
//! - `messaging` - Messages, conversation pairs, history paging, presence
//! - `assistant` - The assistant participant and its query lifecycle

pub mod assistant;
pub mod foundation;
pub mod messaging;
