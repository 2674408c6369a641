//! Chat delivery and history configuration

use serde::Deserialize;

use super::error::ValidationError;

#[derive(Debug, Clone, Deserialize)]
pub struct ChatConfig {
    /// Page size when a history request gives none
    #[serde(default = "default_history_limit")]
    pub history_default_limit: usize,

    /// Largest page a history request may ask for
    #[serde(default = "default_history_max")]
    pub history_max_limit: usize,

    /// Per-connection outbound queue capacity; a full queue drops events
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,
}

impl ChatConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.history_default_limit == 0 || self.history_default_limit > self.history_max_limit {
            return Err(ValidationError::InvalidHistoryLimits);
        }
        if self.outbound_buffer == 0 {
            return Err(ValidationError::InvalidOutboundBuffer);
        }
        Ok(())
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_default_limit: default_history_limit(),
            history_max_limit: default_history_max(),
            outbound_buffer: default_outbound_buffer(),
        }
    }
}

fn default_history_limit() -> usize {
    20
}

fn default_history_max() -> usize {
    100
}

fn default_outbound_buffer() -> usize {
    256
}
