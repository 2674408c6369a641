//! Assistant domain module.
//!
//! The assistant is an ordinary participant with a fixed identity whose
//! answers are produced by an external capability.

mod identity;
mod state;

pub use identity::{
    question_content, AssistantIdentity, QuestionDelivery, DEFAULT_ASSISTANT_DISPLAY_NAME,
    DEFAULT_ASSISTANT_EMAIL, DEFAULT_ASSISTANT_USER_ID, DEFAULT_FALLBACK_TEXT,
    DEFAULT_SYSTEM_PROMPT, QUESTION_PREFIX,
};
pub use state::AssistantQueryState;
