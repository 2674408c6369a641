//! Parley server binary.
//!
//! Loads configuration, picks adapters, wires the application handlers and
//! serves the HTTP and WebSocket routes until ctrl-c.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{self, Next},
    response::Response,
    Router,
};
use secrecy::ExposeSecret;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use parley::adapters::ai::{MockAIProvider, OpenAIConfig, OpenAIProvider};
use parley::adapters::auth::JwtSessionValidator;
use parley::adapters::http::middleware::{auth_middleware, AuthState};
use parley::adapters::http::{conversation_routes, health_routes, ConversationHandlers};
use parley::adapters::memory::{InMemoryConversationStore, InMemoryUserDirectory};
use parley::adapters::postgres::{PostgresConversationStore, PostgresUserDirectory};
use parley::adapters::registry::InMemoryConnectionRegistry;
use parley::adapters::websocket::{websocket_router, WebSocketState};
use parley::application::{
    resolve_identity, AskAssistantHandler, AssistantPolicy, ConversationLanes, GetHistoryHandler,
    MessageDispatcher, PresenceTracker, SendMessageHandler,
};
use parley::config::{AppConfig, AssistantConfig, LogFormat, ServerConfig};
use parley::domain::foundation::AuthenticatedUser;
use parley::domain::messaging::UserProfile;
use parley::ports::{AIProvider, ConnectionRegistry, ConversationStore, UserDirectory};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config.server);
    config.validate()?;

    tracing::info!(
        environment = ?config.server.environment,
        version = env!("CARGO_PKG_VERSION"),
        "Loaded configuration"
    );

    let (store, directory, dev_directory) = build_persistence(&config).await?;
    let provider = build_provider(&config.assistant)?;

    let validator: AuthState = Arc::new(JwtSessionValidator::new(
        &config.auth.signing_secret(),
        &config.auth.issuer,
        &config.auth.audience,
    ));
    if config.auth.uses_development_secret() {
        tracing::warn!("No JWT secret configured, using the development signing secret");
    }

    let assistant = resolve_identity(
        directory.as_ref(),
        &config.assistant.user_email,
        config.assistant.fallback_identity()?,
    )
    .await;
    if let Some(dev) = &dev_directory {
        dev.insert(UserProfile::new(
            assistant.user_id,
            config.assistant.user_email.clone(),
            assistant.display_name.clone(),
        ))
        .await;
    }
    tracing::info!(assistant_id = %assistant.user_id, "Assistant identity resolved");

    let registry: Arc<dyn ConnectionRegistry> = Arc::new(InMemoryConnectionRegistry::new());
    let dispatcher = MessageDispatcher::new(registry.clone());
    let lanes = ConversationLanes::new();
    let shutdown = CancellationToken::new();

    let presence = Arc::new(PresenceTracker::new(
        registry,
        dispatcher.clone(),
        directory.clone(),
    ));
    let send_handler = Arc::new(SendMessageHandler::new(
        store.clone(),
        directory.clone(),
        dispatcher.clone(),
        lanes.clone(),
    ));
    let ask_handler = Arc::new(AskAssistantHandler::new(
        store.clone(),
        directory.clone(),
        provider,
        dispatcher,
        lanes,
        assistant,
        assistant_policy(&config.assistant),
    ));
    let history_handler = Arc::new(
        GetHistoryHandler::new(store, directory).with_limits(
            config.chat.history_default_limit,
            config.chat.history_max_limit,
        ),
    );

    let ws_state = WebSocketState {
        presence,
        send_handler,
        ask_handler,
        outbound_buffer: config.chat.outbound_buffer,
        shutdown: shutdown.clone(),
    };

    let mut app = Router::new()
        .merge(health_routes())
        .nest(
            "/api/conversations",
            conversation_routes(ConversationHandlers::new(history_handler)),
        )
        .merge(websocket_router(ws_state));

    if let Some(dev) = dev_directory {
        app = app.layer(middleware::from_fn_with_state(dev, enroll_authenticated));
    }

    let app = app
        .layer(middleware::from_fn_with_state(validator, auth_middleware))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(cors_layer(&config.server))
        .layer(TraceLayer::new_for_http());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    match server.log_format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }
}

/// Returns the store and directory, plus the directory handle when running
/// on in-memory adapters.
async fn build_persistence(
    config: &AppConfig,
) -> Result<
    (
        Arc<dyn ConversationStore>,
        Arc<dyn UserDirectory>,
        Option<InMemoryUserDirectory>,
    ),
    BoxError,
> {
    let Some(url) = config.database.url.as_deref().filter(|u| !u.is_empty()) else {
        tracing::warn!("No database configured, messages are kept in memory");
        let directory = InMemoryUserDirectory::new();
        return Ok((
            Arc::new(InMemoryConversationStore::new()),
            Arc::new(directory.clone()),
            Some(directory),
        ));
    };

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .idle_timeout(Some(config.database.idle_timeout()))
        .max_lifetime(Some(config.database.max_lifetime()))
        .connect(url)
        .await?;

    if config.database.run_migrations {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&pool).await?;
    }

    Ok((
        Arc::new(PostgresConversationStore::new(pool.clone())),
        Arc::new(PostgresUserDirectory::new(pool)),
        None,
    ))
}

fn build_provider(config: &AssistantConfig) -> Result<Arc<dyn AIProvider>, BoxError> {
    let Some(api_key) = &config.openai_api_key else {
        tracing::warn!("No OpenAI key configured, the assistant answers with canned text");
        return Ok(Arc::new(MockAIProvider::new()));
    };

    let mut openai = OpenAIConfig::new(api_key.expose_secret().clone())
        .with_model(config.model.clone())
        .with_timeout(config.timeout())
        .with_max_retries(config.max_retries);
    if let Some(base_url) = &config.base_url {
        openai = openai.with_base_url(base_url.clone());
    }

    Ok(Arc::new(OpenAIProvider::new(openai)?))
}

fn assistant_policy(config: &AssistantConfig) -> AssistantPolicy {
    AssistantPolicy {
        system_prompt: config.system_prompt.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: config.timeout(),
        fallback_text: config.fallback_text.clone(),
        question_delivery: config.question_delivery,
    }
}

fn cors_layer(server: &ServerConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = server
        .cors_origins_list()
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    if origins.is_empty() && !server.is_production() {
        return CorsLayer::permissive();
    }

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Development only: adds token holders to the in-memory directory so they
/// can take part without an identity database.
async fn enroll_authenticated(
    State(directory): State<InMemoryUserDirectory>,
    request: Request,
    next: Next,
) -> Response {
    if let Some(user) = request.extensions().get::<AuthenticatedUser>().cloned() {
        if matches!(directory.find_by_id(user.id).await, Ok(None)) {
            let email = user.email.unwrap_or_else(|| format!("{}@dev.local", user.id));
            let name = user.display_name.unwrap_or_else(|| email.clone());
            tracing::debug!(user_id = %user.id, "Enrolled development user");
            directory.insert(UserProfile::new(user.id, email, name)).await;
        }
    }
    next.run(request).await
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
    shutdown.cancel();
}
