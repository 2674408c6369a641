//! Lifecycle of one assistant query.

use crate::domain::foundation::StateMachine;
use serde::{Deserialize, Serialize};

/// Progress of a single question/answer exchange with the assistant.
///
/// Two paths reach `Committed`, depending on when the question is shown live:
///
/// ```text
/// after_commit: Received -> AssistantInvoked -> QuestionPersisted -> AnswersPersisted -> Committed -> AnswersDelivered
/// eager:        Received -> QuestionDelivered -> AssistantInvoked -> QuestionPersisted -> ...
/// ```
///
/// `RolledBack` is reachable from every state in which the persistence scope
/// is open. `Rejected` covers invalid input, before anything is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantQueryState {
    Received,
    Rejected,
    QuestionDelivered,
    AssistantInvoked,
    QuestionPersisted,
    AnswersPersisted,
    Committed,
    AnswersDelivered,
    RolledBack,
}

impl AssistantQueryState {
    /// Returns true while the persistence scope is open.
    pub fn holds_open_scope(&self) -> bool {
        matches!(self, Self::QuestionPersisted | Self::AnswersPersisted)
    }
}

impl StateMachine for AssistantQueryState {
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use AssistantQueryState::*;
        match self {
            Received => vec![AssistantInvoked, QuestionDelivered, Rejected],
            QuestionDelivered => vec![AssistantInvoked],
            AssistantInvoked => vec![QuestionPersisted, RolledBack],
            QuestionPersisted => vec![AnswersPersisted, RolledBack],
            AnswersPersisted => vec![Committed, RolledBack],
            Committed => vec![AnswersDelivered],
            AnswersDelivered | Rejected | RolledBack => vec![],
        }
    }
}
