//! LingoSavvy Gateway — HTTP front for the analysis pipeline.
//! POST /api/ai/analyze, GET /api/history, GET /health.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, ConnectInfo, Query, State},
    http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lingosavvy_core::{
    AnalysisError, AnalysisPipeline, AuthState, GatewayConfig, HistoryEntry, SledHistory,
    TokenRegistry,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 100;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<AnalysisPipeline>,
    tokens: Arc<TokenRegistry>,
    history: Option<Arc<SledHistory>>,
}

/// `text` is taken as any JSON value so that `null`, numbers and the like
/// surface as a validation failure instead of an extractor rejection.
#[derive(Deserialize)]
struct AnalyzeRequest {
    #[serde(default)]
    text: Option<serde_json::Value>,
}

impl AnalyzeRequest {
    fn text(&self) -> &str {
        self.text.as_ref().and_then(|v| v.as_str()).unwrap_or_default()
    }
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

type ApiError = (StatusCode, Json<serde_json::Value>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(serde_json::json!({ "error": message })))
}

#[tokio::main]
async fn main() {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[lingosavvy-gateway] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match GatewayConfig::load() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("[SYSTEM] Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };
    if config.api_key().is_none() {
        tracing::warn!(
            "[SYSTEM] No API key for {:?}; set LINGO__LLM_API_KEY. Analyses will fail until one is configured.",
            config.llm_provider
        );
    }

    let state = match build_state(&config) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("[SYSTEM] Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    let addr = config.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("[SYSTEM] Cannot bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!(
        "[SYSTEM] LingoSavvy gateway on {} (provider: {:?}, model: {})",
        addr,
        config.llm_provider,
        config.model()
    );

    let app = build_app(state, &config.cors_origins);
    if let Err(e) = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    {
        tracing::error!("[SYSTEM] Server error: {}", e);
    }
}

fn build_state(config: &GatewayConfig) -> Result<AppState, lingosavvy_core::HistoryError> {
    let mut pipeline = AnalysisPipeline::new(config.generative_client());
    let history = if config.history_enabled {
        let store = Arc::new(SledHistory::open(Some(config.history_path.as_str()))?);
        pipeline = pipeline.with_history(store.clone());
        Some(store)
    } else {
        None
    };
    let tokens = TokenRegistry::new(config.token_map());
    tracing::info!("[SYSTEM] {} bearer token(s) registered", tokens.len());
    Ok(AppState {
        pipeline: Arc::new(pipeline),
        tokens: Arc::new(tokens),
        history,
    })
}

fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health))
        .route("/api/ai/analyze", post(analyze_handler))
        .route("/api/history", get(history_handler))
        .with_state(state)
        .layer(cors)
        .layer(axum::middleware::from_fn(log_traffic))
}

async fn log_traffic(request: Request<Body>, next: Next) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    tracing::info!("[TRAFFIC] {} {} from {}", request.method(), request.uri().path(), peer);
    next.run(request).await
}

async fn health() -> &'static str {
    "OK"
}

fn resolve_auth(state: &AppState, headers: &HeaderMap) -> Result<AuthState, ApiError> {
    let unauthorized = || api_error(StatusCode::UNAUTHORIZED, "Invalid or expired credentials");
    let authorization = match headers.get(header::AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| unauthorized())?),
        None => None,
    };
    state.tokens.resolve(authorization).map_err(|_| unauthorized())
}

/// POST /api/ai/analyze: full result for authenticated callers, preview otherwise.
async fn analyze_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let auth = resolve_auth(&state, &headers)?;
    let Json(body) = body.map_err(|rejection| {
        tracing::info!(error = %rejection.body_text(), "[ANALYZE] unreadable request body");
        api_error(StatusCode::BAD_REQUEST, AnalysisError::Validation.public_message())
    })?;
    match state.pipeline.analyze(body.text(), &auth).await {
        Ok(result) => Ok(Json(result).into_response()),
        Err(e) => {
            tracing::info!(
                kind = e.kind(),
                authenticated = auth.is_authenticated(),
                "[ANALYZE] request failed"
            );
            let status = if e.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::BAD_GATEWAY
            };
            Err(api_error(status, e.public_message()))
        }
    }
}

/// GET /api/history?limit=N: the caller's recent analyses, newest first.
async fn history_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError> {
    let auth = resolve_auth(&state, &headers)?;
    let Some(username) = auth.username() else {
        return Err(api_error(StatusCode::UNAUTHORIZED, "Sign in to view your history"));
    };
    let Some(store) = &state.history else {
        return Ok(Json(Vec::new()));
    };
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    store.recent(username, limit).map(Json).map_err(|e| {
        tracing::error!(username, error = %e, "[HISTORY] read failed");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load history")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lingosavvy_core::{GenerativeClient, UpstreamError};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const CLEAN: &str = r#"{"corrected_text":"I have two cats.","changes":[{"type":"grammar","original":"I has","corrected":"I have"}],"ratings":{"grammar":4,"vocabulary":6,"clarity":8,"overall":6}}"#;

    struct FixedClient {
        reply: String,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerativeClient for FixedClient {
        fn provider(&self) -> &'static str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str) -> Result<String, UpstreamError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn test_app(reply: &str, history: Option<Arc<SledHistory>>) -> (Router, Arc<FixedClient>) {
        let client = Arc::new(FixedClient {
            reply: reply.to_string(),
            calls: AtomicUsize::new(0),
        });
        let mut pipeline = AnalysisPipeline::new(client.clone());
        if let Some(store) = &history {
            pipeline = pipeline.with_history(store.clone());
        }
        let tokens = TokenRegistry::new(HashMap::from([(
            "tok-alice".to_string(),
            "alice".to_string(),
        )]));
        let state = AppState {
            pipeline: Arc::new(pipeline),
            tokens: Arc::new(tokens),
            history,
        };
        (build_app(state, &["http://localhost:3000".to_string()]), client)
    }

    fn analyze_req(text: &str, token: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/ai/analyze")
            .header("content-type", "application/json");
        if let Some(t) = token {
            builder = builder.header("authorization", format!("Bearer {}", t));
        }
        builder
            .body(Body::from(serde_json::json!({ "text": text }).to_string()))
            .unwrap()
    }

    fn raw_analyze_req(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ai/analyze")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = test_app(CLEAN, None);
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_analyze_authenticated_full() {
        let (app, _) = test_app(CLEAN, None);
        let res = app.oneshot(analyze_req("I has two cats.", Some("tok-alice"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["access"], "full");
        assert_eq!(json["correctedText"], "I have two cats.");
        assert_eq!(json["changes"][0]["corrected"], "I have");
        assert_eq!(json["ratings"]["vocabulary"], 6);
    }

    #[tokio::test]
    async fn test_analyze_anonymous_preview() {
        let (app, _) = test_app(CLEAN, None);
        let res = app.oneshot(analyze_req("I has two cats.", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json["access"], "preview");
        assert_eq!(json["correctedText"]["gated"], true);
        assert_eq!(json["changes"]["gated"], true);
        assert_eq!(json["ratings"].as_object().unwrap().len(), 2);
        assert!(!json.to_string().contains("I have two cats."));
    }

    #[tokio::test]
    async fn test_analyze_unknown_token_unauthorized() {
        let (app, client) = test_app(CLEAN, None);
        let res = app.oneshot(analyze_req("Hello", Some("forged"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_analyze_non_utf8_authorization_unauthorized() {
        let (app, client) = test_app(CLEAN, None);
        let mut req = analyze_req("Hello", None);
        req.headers_mut().insert(
            header::AUTHORIZATION,
            HeaderValue::from_bytes(b"Bearer tok-\xff").unwrap(),
        );
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_analyze_lowercase_bearer_scheme() {
        let (app, _) = test_app(CLEAN, None);
        let mut req = analyze_req("I has two cats.", None);
        req.headers_mut()
            .insert(header::AUTHORIZATION, HeaderValue::from_static("bearer tok-alice"));
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(body_json(res).await["access"], "full");
    }

    #[tokio::test]
    async fn test_analyze_null_or_non_string_text_bad_request() {
        for body in [r#"{"text":null}"#, r#"{"text":42}"#, r#"{"text":["a"]}"#, "{}"] {
            let (app, client) = test_app(CLEAN, None);
            let res = app.oneshot(raw_analyze_req(body)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", body);
            let json = body_json(res).await;
            assert_eq!(json["error"], "Please enter some text to analyze.");
            assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_analyze_unparseable_body_is_generic_bad_request() {
        for body in ["not json at all", r#"{"text":"#, "[1,2]"] {
            let (app, client) = test_app(CLEAN, None);
            let res = app.oneshot(raw_analyze_req(body)).await.unwrap();
            assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{}", body);
            let json = body_json(res).await;
            assert_eq!(json.as_object().unwrap().len(), 1);
            assert_eq!(json["error"], "Please enter some text to analyze.");
            assert_eq!(client.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_analyze_missing_content_type_bad_request() {
        let (app, client) = test_app(CLEAN, None);
        let req = Request::builder()
            .method("POST")
            .uri("/api/ai/analyze")
            .body(Body::from(r#"{"text":"Hello"}"#))
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_analyze_empty_text_bad_request() {
        let (app, client) = test_app(CLEAN, None);
        let res = app.oneshot(analyze_req("   ", None)).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(client.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_analyze_bad_model_output_is_generic() {
        let (app, _) = test_app("I'm sorry, I can't help with that.", None);
        let res = app.oneshot(analyze_req("Hello", Some("tok-alice"))).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let json = body_json(res).await;
        let msg = json["error"].as_str().unwrap();
        assert!(!msg.contains("sorry"));
        assert_eq!(json.as_object().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SledHistory::open(Some(dir.path())).unwrap());
        let (app, _) = test_app(CLEAN, Some(store));

        let res = app
            .clone()
            .oneshot(analyze_req("I has two cats.", Some("tok-alice")))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let req = Request::builder()
            .uri("/api/history?limit=5")
            .header("authorization", "Bearer tok-alice")
            .body(Body::empty())
            .unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let json = body_json(res).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["text"], "I has two cats.");
    }

    #[tokio::test]
    async fn test_history_requires_auth() {
        let (app, _) = test_app(CLEAN, None);
        let req = Request::builder().uri("/api/history").body(Body::empty()).unwrap();
        let res = app.oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
