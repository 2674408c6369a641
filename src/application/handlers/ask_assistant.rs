//! AskAssistantHandler - Coordinates one question/answer exchange with the
//! assistant participant.
//!
//! The exchange produces three messages: the asker's question (addressed to
//! the conversation partner) and one copy of the answer for each member of
//! the pair. All three are written in a single store transaction, so history
//! shows either the whole exchange or none of it.
//!
//! The assistant call runs before the transaction is opened. It is bounded by
//! the policy timeout and by the caller's cancellation token; any failure,
//! timeout, cancellation or blank answer becomes the fallback text.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::domain::assistant::{
    question_content, AssistantIdentity, AssistantQueryState, QuestionDelivery,
    DEFAULT_FALLBACK_TEXT, DEFAULT_SYSTEM_PROMPT,
};
use crate::domain::foundation::{StateMachine, Timestamp, UserId, ValidationError};
use crate::domain::messaging::{ConversationPair, DeliveredMessage, Message, OutboundEvent, UserProfile};
use crate::ports::{
    AIError, AIProvider, CompletionRequest, ConversationStore, ConversationTransaction,
    MessageRole, RequestMetadata, StoreError, UserDirectory,
};

use super::HandlerError;
use crate::application::{ConversationLanes, MessageDispatcher};

/// Tunables for the assistant exchange.
#[derive(Debug, Clone)]
pub struct AssistantPolicy {
    pub system_prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub fallback_text: String,
    pub question_delivery: QuestionDelivery,
}

impl Default for AssistantPolicy {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: 200,
            timeout: Duration::from_secs(30),
            fallback_text: DEFAULT_FALLBACK_TEXT.to_string(),
            question_delivery: QuestionDelivery::AfterCommit,
        }
    }
}

/// Command to ask the assistant a question inside a conversation.
#[derive(Debug, Clone)]
pub struct AskAssistantCommand {
    pub asker_id: UserId,
    /// Partner id as received from the client.
    pub partner_id: String,
    pub question: String,
}

/// The three committed messages of one exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantExchange {
    pub question: DeliveredMessage,
    pub answer_to_asker: DeliveredMessage,
    pub answer_to_partner: DeliveredMessage,
    /// True when the answers carry the fallback text.
    pub used_fallback: bool,
    pub state: AssistantQueryState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AskOutcome {
    Answered(AssistantExchange),
    Rejected(ValidationError),
}

/// Resolves the assistant participant from the directory by email, falling
/// back to the configured id and name when the directory has no such user.
pub async fn resolve_identity(
    directory: &dyn UserDirectory,
    email: &str,
    fallback: AssistantIdentity,
) -> AssistantIdentity {
    match directory.find_by_email(email).await {
        Ok(Some(profile)) => AssistantIdentity {
            user_id: profile.id,
            display_name: profile.display_name,
            avatar_url: profile.avatar_url,
        },
        Ok(None) => {
            tracing::warn!(
                email = %email,
                user_id = %fallback.user_id,
                "Assistant user not in directory, using configured identity"
            );
            fallback
        }
        Err(err) => {
            tracing::warn!(
                email = %email,
                error = %err,
                "Assistant lookup failed, using configured identity"
            );
            fallback
        }
    }
}

/// Tracks the exchange through its states.
struct Progress {
    state: AssistantQueryState,
}

impl Progress {
    fn new() -> Self {
        Self {
            state: AssistantQueryState::Received,
        }
    }

    fn advance(&mut self, next: AssistantQueryState) {
        match self.state.transition_to(next) {
            Ok(state) => self.state = state,
            Err(err) => {
                debug_assert!(false, "illegal assistant transition: {}", err);
                tracing::error!(from = ?self.state, to = ?next, "Illegal assistant query transition");
            }
        }
    }
}

/// The messages of one exchange before they are written.
struct Draft {
    question: Message,
    answer_to_asker: Message,
    answer_to_partner: Message,
}

/// Handler coordinating assistant queries.
pub struct AskAssistantHandler {
    store: Arc<dyn ConversationStore>,
    directory: Arc<dyn UserDirectory>,
    provider: Arc<dyn AIProvider>,
    dispatcher: MessageDispatcher,
    lanes: ConversationLanes,
    assistant: AssistantIdentity,
    policy: AssistantPolicy,
}

impl AskAssistantHandler {
    pub fn new(
        store: Arc<dyn ConversationStore>,
        directory: Arc<dyn UserDirectory>,
        provider: Arc<dyn AIProvider>,
        dispatcher: MessageDispatcher,
        lanes: ConversationLanes,
        assistant: AssistantIdentity,
        policy: AssistantPolicy,
    ) -> Self {
        Self {
            store,
            directory,
            provider,
            dispatcher,
            lanes,
            assistant,
            policy,
        }
    }

    pub fn assistant(&self) -> &AssistantIdentity {
        &self.assistant
    }

    /// Runs one exchange.
    ///
    /// # Errors
    ///
    /// Returns `HandlerError::Store` when the exchange could not be committed.
    /// Nothing of it is in history then; in eager mode the question may
    /// already have been shown live.
    pub async fn handle(
        &self,
        cmd: AskAssistantCommand,
        cancel: CancellationToken,
    ) -> Result<AskOutcome, HandlerError> {
        let mut progress = Progress::new();

        // 1. Validate
        let (question, asker) = match self.validate(&cmd).await? {
            Ok(valid) => valid,
            Err(reason) => {
                progress.advance(AssistantQueryState::Rejected);
                tracing::warn!(asker_id = %cmd.asker_id, reason = %reason, "Rejected assistant query");
                return Ok(AskOutcome::Rejected(reason));
            }
        };
        let pair = ConversationPair::of(&question);
        let question_view = DeliveredMessage {
            message: question.clone(),
            sender_display_name: asker.display_name,
            sender_avatar_url: asker.avatar_url,
        };

        // 2. Eager mode shows the question before the assistant is called
        if self.policy.question_delivery == QuestionDelivery::Eager {
            let _lane = self.lanes.acquire(pair).await;
            self.dispatcher.deliver_message(&question_view);
            progress.advance(AssistantQueryState::QuestionDelivered);
        }

        // 3. Call the assistant outside any lane or transaction
        progress.advance(AssistantQueryState::AssistantInvoked);
        let (answer, used_fallback) = match self.ask(cmd.asker_id, cmd.question.trim(), &question, &cancel).await {
            Some(text) => (text, false),
            None => (self.policy.fallback_text.clone(), true),
        };

        let answered_at = Timestamp::now();
        let assistant_id = self.assistant.user_id;
        let draft = Draft {
            answer_to_asker: Message::from_assistant(assistant_id, question.sender_id(), pair, answer.clone(), answered_at)?,
            answer_to_partner: Message::from_assistant(assistant_id, question.receiver_id(), pair, answer, answered_at)?,
            question,
        };

        // 4. Persist the three rows atomically, then deliver in commit order
        let _lane = self.lanes.acquire(pair).await;
        let [question, to_asker, to_partner] = match self.persist(&draft, &mut progress).await {
            Ok(stored) => stored,
            Err(err) => {
                tracing::error!(
                    question_id = %draft.question.id(),
                    asker_id = %cmd.asker_id,
                    state = ?progress.state,
                    error = %err,
                    "Assistant exchange rolled back"
                );
                return Err(err.into());
            }
        };

        let question = DeliveredMessage {
            message: question,
            ..question_view
        };
        let answer_to_asker = self.from_assistant(to_asker);
        let answer_to_partner = self.from_assistant(to_partner);

        if self.policy.question_delivery == QuestionDelivery::AfterCommit {
            self.dispatcher.deliver_message(&question);
        }
        self.dispatcher.deliver_to_user(
            answer_to_asker.message.receiver_id(),
            &OutboundEvent::message(answer_to_asker.clone()),
        );
        self.dispatcher.deliver_to_user(
            answer_to_partner.message.receiver_id(),
            &OutboundEvent::message(answer_to_partner.clone()),
        );
        progress.advance(AssistantQueryState::AnswersDelivered);

        tracing::info!(
            question_id = %question.message.id(),
            asker_id = %cmd.asker_id,
            used_fallback,
            "Assistant exchange completed"
        );

        Ok(AskOutcome::Answered(AssistantExchange {
            question,
            answer_to_asker,
            answer_to_partner,
            used_fallback,
            state: progress.state,
        }))
    }

    /// Returns the question message and the asker's profile, or the reason
    /// the query is rejected.
    async fn validate(
        &self,
        cmd: &AskAssistantCommand,
    ) -> Result<Result<(Message, UserProfile), ValidationError>, HandlerError> {
        let partner_id = match UserId::parse(&cmd.partner_id) {
            Ok(id) => id,
            Err(err) => return Ok(Err(err)),
        };
        if cmd.question.trim().is_empty() {
            return Ok(Err(ValidationError::empty_field("question")));
        }
        let assistant_id = self.assistant.user_id;
        if cmd.asker_id == assistant_id || partner_id == assistant_id {
            return Ok(Err(ValidationError::invalid_format(
                "partner_id",
                "the assistant cannot be a conversation member",
            )));
        }
        let question = match Message::new(cmd.asker_id, partner_id, question_content(&cmd.question)) {
            Ok(m) => m,
            Err(err) => return Ok(Err(err)),
        };
        match self.directory.find_by_id(cmd.asker_id).await? {
            Some(asker) => Ok(Ok((question, asker))),
            None => Ok(Err(ValidationError::invalid_format("asker_id", "unknown user"))),
        }
    }

    /// Calls the assistant. Returns `None` when the fallback text should be
    /// used instead.
    async fn ask(
        &self,
        asker_id: UserId,
        prompt: &str,
        question: &Message,
        cancel: &CancellationToken,
    ) -> Option<String> {
        let request = CompletionRequest::new(RequestMetadata::new(asker_id, question.id().to_string()))
            .with_system_prompt(self.policy.system_prompt.clone())
            .with_message(MessageRole::User, prompt)
            .with_temperature(self.policy.temperature)
            .with_max_tokens(self.policy.max_tokens);

        let timeout = self.policy.timeout;
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(AIError::Cancelled),
            outcome = tokio::time::timeout(timeout, self.provider.complete(request)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(AIError::timeout(u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX))),
            },
        };

        let err = match result {
            Ok(response) => {
                let text = response.content.trim();
                if !text.is_empty() {
                    return Some(text.to_string());
                }
                AIError::EmptyResponse
            }
            Err(err) => err,
        };

        tracing::warn!(
            question_id = %question.id(),
            asker_id = %asker_id,
            provider = %self.provider.provider_info().name,
            error = %err,
            "Assistant call failed, answering with fallback"
        );
        None
    }

    async fn persist(&self, draft: &Draft, progress: &mut Progress) -> Result<[Message; 3], StoreError> {
        let mut tx = self.store.begin().await?;

        match write_exchange(&mut tx, draft, progress).await {
            Ok(stored) => match tx.commit().await {
                Ok(()) => {
                    progress.advance(AssistantQueryState::Committed);
                    Ok(stored)
                }
                Err(err) => {
                    progress.advance(AssistantQueryState::RolledBack);
                    Err(err)
                }
            },
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                progress.advance(AssistantQueryState::RolledBack);
                Err(err)
            }
        }
    }

    fn from_assistant(&self, message: Message) -> DeliveredMessage {
        DeliveredMessage {
            message,
            sender_display_name: self.assistant.display_name.clone(),
            sender_avatar_url: self.assistant.avatar_url.clone(),
        }
    }
}

async fn write_exchange(
    tx: &mut Box<dyn ConversationTransaction>,
    draft: &Draft,
    progress: &mut Progress,
) -> Result<[Message; 3], StoreError> {
    let question = tx.append(&draft.question).await?;
    progress.advance(AssistantQueryState::QuestionPersisted);

    let to_asker = tx.append(&draft.answer_to_asker).await?;
    let to_partner = tx.append(&draft.answer_to_partner).await?;
    progress.advance(AssistantQueryState::AnswersPersisted);

    Ok([question, to_asker, to_partner])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockAIProvider;
    use crate::adapters::memory::{InMemoryConversationStore, InMemoryUserDirectory};
    use crate::adapters::registry::InMemoryConnectionRegistry;
    use crate::domain::assistant::QUESTION_PREFIX;
    use crate::domain::messaging::MessageOrigin;
    use crate::ports::{ConnectionHandle, ConnectionRegistry};
    use tokio::sync::mpsc::Receiver;

    struct Fixture {
        handler: AskAssistantHandler,
        store: InMemoryConversationStore,
        registry: Arc<InMemoryConnectionRegistry>,
        provider: Arc<MockAIProvider>,
        alice: UserId,
        bob: UserId,
        ai: UserId,
    }

    fn fixture(provider: MockAIProvider, policy: AssistantPolicy) -> Fixture {
        let (alice, bob, ai) = (UserId::new(), UserId::new(), UserId::new());
        let directory = InMemoryUserDirectory::new()
            .with_user(UserProfile::new(alice, "alice@x.io", "Alice"))
            .with_user(UserProfile::new(bob, "bob@x.io", "Bob"));
        let store = InMemoryConversationStore::new();
        let registry = Arc::new(InMemoryConnectionRegistry::new());
        let provider = Arc::new(provider);
        let handler = AskAssistantHandler::new(
            Arc::new(store.clone()),
            Arc::new(directory),
            provider.clone(),
            MessageDispatcher::new(registry.clone()),
            ConversationLanes::new(),
            AssistantIdentity::new(ai, "AI Assistant"),
            policy,
        );
        Fixture { handler, store, registry, provider, alice, bob, ai }
    }

    fn connect(registry: &InMemoryConnectionRegistry, user: UserId) -> Receiver<OutboundEvent> {
        let (handle, rx) = ConnectionHandle::channel(user, 16);
        registry.register(handle);
        rx
    }

    fn drain(rx: &mut Receiver<OutboundEvent>) -> Vec<OutboundEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn ask(f: &Fixture, question: &str) -> AskAssistantCommand {
        AskAssistantCommand {
            asker_id: f.alice,
            partner_id: f.bob.to_string(),
            question: question.to_string(),
        }
    }

    fn answered(outcome: AskOutcome) -> AssistantExchange {
        match outcome {
            AskOutcome::Answered(exchange) => exchange,
            other => panic!("expected Answered, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn answers_both_members_and_commits_three_rows() {
        let f = fixture(MockAIProvider::new().with_response("  4  "), AssistantPolicy::default());
        let mut rx_a = connect(&f.registry, f.alice);
        let mut rx_b = connect(&f.registry, f.bob);

        let exchange = answered(f.handler.handle(ask(&f, "What is 2+2?"), CancellationToken::new()).await.unwrap());

        assert_eq!(exchange.state, AssistantQueryState::AnswersDelivered);
        assert!(!exchange.used_fallback);
        assert_eq!(exchange.question.message.content(), format!("{}What is 2+2?", QUESTION_PREFIX));
        assert_eq!(exchange.answer_to_asker.message.content(), "4");
        assert_eq!(exchange.answer_to_asker.message.receiver_id(), f.alice);
        assert_eq!(exchange.answer_to_partner.message.receiver_id(), f.bob);
        assert_eq!(exchange.answer_to_asker.message.sender_id(), f.ai);
        assert_eq!(exchange.answer_to_asker.message.origin(), MessageOrigin::Assistant);
        assert_eq!(
            exchange.answer_to_asker.message.timestamp(),
            exchange.answer_to_partner.message.timestamp()
        );
        assert_ne!(exchange.answer_to_asker.message.id(), exchange.answer_to_partner.message.id());
        assert_eq!(exchange.answer_to_partner.message.conversation(), exchange.question.message.conversation());
        assert_eq!(f.store.len().await, 3);

        // Question then own answer, for each member
        let to_alice = drain(&mut rx_a);
        let to_bob = drain(&mut rx_b);
        assert_eq!(to_alice.len(), 2);
        assert_eq!(to_bob.len(), 2);
        assert_eq!(to_alice[0].message_id(), Some(exchange.question.message.id()));
        assert_eq!(to_alice[1].message_id(), Some(exchange.answer_to_asker.message.id()));
        assert_eq!(to_bob[0].message_id(), Some(exchange.question.message.id()));
        assert_eq!(to_bob[1].message_id(), Some(exchange.answer_to_partner.message.id()));
    }

    #[tokio::test]
    async fn prompt_is_the_raw_question_with_policy_settings() {
        let f = fixture(MockAIProvider::new(), AssistantPolicy::default());
        f.handler.handle(ask(&f, " Why? "), CancellationToken::new()).await.unwrap();

        let calls = f.provider.get_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].messages[0].content, "Why?");
        assert_eq!(calls[0].metadata.user_id, f.alice);
        assert_eq!(calls[0].system_prompt.as_deref(), Some(DEFAULT_SYSTEM_PROMPT));
        assert_eq!(calls[0].max_tokens, Some(200));
    }

    #[tokio::test]
    async fn provider_error_uses_fallback() {
        let f = fixture(
            MockAIProvider::new().with_error(AIError::unavailable("down")),
            AssistantPolicy::default(),
        );

        let exchange = answered(f.handler.handle(ask(&f, "hello?"), CancellationToken::new()).await.unwrap());

        assert!(exchange.used_fallback);
        assert_eq!(exchange.answer_to_partner.message.content(), DEFAULT_FALLBACK_TEXT);
        assert_eq!(f.store.len().await, 3);
    }

    #[tokio::test]
    async fn blank_answer_uses_fallback() {
        let f = fixture(MockAIProvider::new().with_response("   "), AssistantPolicy::default());
        let exchange = answered(f.handler.handle(ask(&f, "hello?"), CancellationToken::new()).await.unwrap());
        assert!(exchange.used_fallback);
    }

    #[tokio::test]
    async fn timeout_uses_fallback() {
        let policy = AssistantPolicy {
            timeout: Duration::from_millis(50),
            ..AssistantPolicy::default()
        };
        let f = fixture(MockAIProvider::new().with_delay(Duration::from_secs(60)), policy);

        let exchange = answered(f.handler.handle(ask(&f, "slow?"), CancellationToken::new()).await.unwrap());

        assert!(exchange.used_fallback);
        assert_eq!(exchange.answer_to_asker.message.content(), DEFAULT_FALLBACK_TEXT);
        assert_eq!(f.store.len().await, 3);
    }

    #[tokio::test]
    async fn cancellation_uses_fallback() {
        let f = fixture(
            MockAIProvider::new().with_delay(Duration::from_secs(60)),
            AssistantPolicy::default(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let exchange = answered(f.handler.handle(ask(&f, "still there?"), cancel).await.unwrap());
        assert!(exchange.used_fallback);
    }

    #[tokio::test]
    async fn rejects_invalid_queries_without_calling_assistant() {
        let f = fixture(MockAIProvider::new(), AssistantPolicy::default());
        let cases = [
            AskAssistantCommand { partner_id: "nope".into(), ..ask(&f, "q") },
            ask(&f, "   "),
            AskAssistantCommand { partner_id: f.alice.to_string(), ..ask(&f, "q") },
            AskAssistantCommand { partner_id: f.ai.to_string(), ..ask(&f, "q") },
            AskAssistantCommand { asker_id: UserId::new(), ..ask(&f, "q") },
        ];

        for cmd in cases {
            let outcome = f.handler.handle(cmd, CancellationToken::new()).await.unwrap();
            assert!(matches!(outcome, AskOutcome::Rejected(_)), "{:?}", outcome);
        }
        assert_eq!(f.provider.call_count(), 0);
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn persistence_failure_rolls_back_everything() {
        let f = fixture(MockAIProvider::new().with_response("4"), AssistantPolicy::default());
        let mut rx_b = connect(&f.registry, f.bob);
        f.store.fail_after_appends(1);

        let result = f.handler.handle(ask(&f, "2+2?"), CancellationToken::new()).await;

        assert!(matches!(result, Err(HandlerError::Store(_))));
        assert!(f.store.is_empty().await);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[tokio::test]
    async fn failed_commit_rolls_back_everything() {
        let f = fixture(MockAIProvider::new().with_response("4"), AssistantPolicy::default());
        f.store.fail_next_commit();

        let result = f.handler.handle(ask(&f, "2+2?"), CancellationToken::new()).await;

        assert!(result.is_err());
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn eager_mode_shows_question_before_commit() {
        let policy = AssistantPolicy {
            question_delivery: QuestionDelivery::Eager,
            ..AssistantPolicy::default()
        };
        let f = fixture(MockAIProvider::new().with_response("4"), policy);
        let mut rx_b = connect(&f.registry, f.bob);
        f.store.fail_after_appends(0);

        let result = f.handler.handle(ask(&f, "2+2?"), CancellationToken::new()).await;

        // Live copy reached the partner, history has nothing
        assert!(result.is_err());
        assert!(f.store.is_empty().await);
        let events = drain(&mut rx_b);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], OutboundEvent::MessageReceived(d) if d.message.seq().is_none()));
    }

    #[tokio::test]
    async fn eager_mode_does_not_repeat_question_after_commit() {
        let policy = AssistantPolicy {
            question_delivery: QuestionDelivery::Eager,
            ..AssistantPolicy::default()
        };
        let f = fixture(MockAIProvider::new().with_response("4"), policy);
        let mut rx_a = connect(&f.registry, f.alice);

        let exchange = answered(f.handler.handle(ask(&f, "2+2?"), CancellationToken::new()).await.unwrap());

        let events = drain(&mut rx_a);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].message_id(), Some(exchange.question.message.id()));
        assert_eq!(events[1].message_id(), Some(exchange.answer_to_asker.message.id()));
    }

    #[tokio::test]
    async fn resolve_identity_prefers_directory_user() {
        let ai = UserId::new();
        let directory = InMemoryUserDirectory::new()
            .with_user(UserProfile::new(ai, "ai@chatapp.system", "Helper").with_avatar("/bot.png"));
        let fallback = AssistantIdentity::new(UserId::new(), "AI Assistant");

        let identity = resolve_identity(&directory, "AI@chatapp.system", fallback).await;

        assert_eq!(identity.user_id, ai);
        assert_eq!(identity.display_name, "Helper");
        assert_eq!(identity.avatar_url.as_deref(), Some("/bot.png"));
    }

    #[tokio::test]
    async fn resolve_identity_falls_back_when_missing() {
        let fallback = AssistantIdentity::new(UserId::new(), "AI Assistant");
        let identity = resolve_identity(&InMemoryUserDirectory::new(), "ai@chatapp.system", fallback.clone()).await;
        assert_eq!(identity, fallback);
    }
}
