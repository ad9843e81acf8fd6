//! # SWAN HTTP API
//!
//! Builds the axum router publishers call. Every SWAN endpoint accepts GET
//! or POST. Parameters come from the query string and, on POST, from a
//! urlencoded form body. Both merge into one ordered list with body values
//! first, so a name given in both places resolves to the body's value.
//!
//! ## Endpoints
//!
//! | Path                           | Response                               |
//! |--------------------------------|----------------------------------------|
//! | `/swan/api/v1/fetch`           | next-hop URL of a new storage op       |
//! | `/swan/api/v1/update`          | next-hop URL of an update storage op   |
//! | `/swan/api/v1/decode-as-json`  | JSON array of re-signed values         |
//! | `/swan/api/v1/create-offer-id` | base64 OWID of a signed offer          |
//! | `/swan/preferences/*`          | preferences page                       |
//! | `/health`                      | liveness probe                         |
//!
//! ## Errors
//!
//! Failures become a plain-text response with the status from
//! [`status_for`]. The body carries the error message only in debug mode;
//! in production callers get the status and nothing else.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::HostRejection, FromRequest, Host, Request, State},
    http::{
        header::{ACCESS_CONTROL_ALLOW_ORIGIN, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE},
        HeaderValue, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use url::form_urlencoded;

use swan::access::{authorize, Access, AccessKeys};
use swan::config::{
    SwanConfig, CREATE_OFFER_ID_ROUTE, DECODE_AS_JSON_ROUTE, DATA_PARAM, FETCH_ROUTE,
    PREFERENCES_ROUTE, UPDATE_ROUTE,
};
use swan::offer::OfferId;
use swan::owid::{MemoryCreatorRegistry, OwidEncoder};
use swan::pipeline::{DecodePipeline, ExpiryStamper};
use swan::sid::SidHasher;
use swan::swift::composer::{inject_fetch_defaults, inject_update_values, storage_expiry_date};
use swan::swift::{
    AccessNodeResolver, HttpGet, QueryParams, StaticDiscovery, StorageUrlComposer, SwiftClient,
};
use swan::validate::validate_common;
use swan::{ErrorKind, SwanError};

use crate::metrics::SharedMetrics;
use crate::settings::Settings;

const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
const TEXT_HTML: &str = "text/html; charset=utf-8";
const NO_CACHE: &str = "no-cache";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared state for every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<SwanConfig>,
    pub access: Arc<dyn Access>,
    pub pipeline: DecodePipeline,
    pub composer: StorageUrlComposer,
    pub encoder: OwidEncoder,
    /// Preferences page, already whitespace-normalized.
    pub preferences_html: Arc<str>,
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Wires the pipeline and composer from resolved settings over
    /// `transport`.
    pub fn from_settings(
        settings: &Settings,
        transport: Arc<dyn HttpGet>,
        metrics: SharedMetrics,
    ) -> Result<Self> {
        let config = settings.swan.clone();

        let registry = Arc::new(MemoryCreatorRegistry::new());
        for seed in &settings.creators {
            let creator = registry.register(seed.to_creator()?);
            tracing::info!(
                domain = creator.domain(),
                public_key = %hex::encode(creator.public_key().as_bytes()),
                "creator registered"
            );
        }
        if registry.is_empty() {
            tracing::warn!("no creators configured; every signing request will fail");
        }

        let access = AccessKeys::new(settings.allowed_access_keys.iter().cloned());
        if access.is_empty() {
            tracing::warn!("no access keys configured; every request will be denied");
        }

        let resolver = Arc::new(AccessNodeResolver::new(
            &config.network,
            Arc::new(StaticDiscovery::new(settings.access_node.clone())),
        ));
        let client = Arc::new(SwiftClient::new(
            &config.scheme,
            &config.access_key,
            Arc::clone(&resolver),
            transport,
        ));
        let encoder = OwidEncoder::new(registry);
        let pipeline = DecodePipeline::new(
            client.clone(),
            encoder.clone(),
            Arc::new(SidHasher::new(settings.sid.clone())),
            ExpiryStamper::new(config.value_timeout()?),
        );
        let composer = StorageUrlComposer::new(&config.scheme, resolver, client);
        let preferences_html = settings
            .preferences_html()
            .context("failed to load the preferences page")?;

        Ok(Self {
            config: Arc::new(config),
            access: Arc::new(access),
            pipeline,
            composer,
            encoder,
            preferences_html: preferences_html.into(),
            metrics,
        })
    }

    /// Turns a handler outcome into a response, counting and logging
    /// failures.
    fn respond(&self, route: &str, outcome: swan::Result<Response>) -> Response {
        match outcome {
            Ok(response) => response,
            Err(error) => {
                self.metrics.record_error(error.kind());
                if self.config.debug {
                    tracing::warn!(route, kind = error.kind().as_str(), %error, "request failed");
                } else {
                    tracing::debug!(route, kind = error.kind().as_str(), %error, "request failed");
                }
                ApiError::new(error, self.config.debug).into_response()
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the router with every SWAN route, CORS and request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route(FETCH_ROUTE, get(fetch_handler).post(fetch_handler))
        .route(UPDATE_ROUTE, get(update_handler).post(update_handler))
        .route(
            DECODE_AS_JSON_ROUTE,
            get(decode_as_json_handler).post(decode_as_json_handler),
        )
        .route(
            CREATE_OFFER_ID_ROUTE,
            get(create_offer_id_handler).post(create_offer_id_handler),
        )
        .route(PREFERENCES_ROUTE, get(preferences_handler))
        .route(&format!("{}/*page", PREFERENCES_ROUTE), get(preferences_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// HTTP status for each kind of failure.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Authorization => StatusCode::UNAUTHORIZED,
        ErrorKind::InvalidParameter => StatusCode::BAD_REQUEST,
        ErrorKind::Validation => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Upstream | ErrorKind::Network => StatusCode::BAD_GATEWAY,
        ErrorKind::Configuration | ErrorKind::Encoding => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// A [`SwanError`] on its way to the caller.
#[derive(Debug)]
pub struct ApiError {
    error: SwanError,
    debug: bool,
}

impl ApiError {
    pub fn new(error: SwanError, debug: bool) -> Self {
        Self { error, debug }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = if self.debug {
            self.error.to_string()
        } else {
            String::new()
        };
        let mut response = text_response(body);
        *response.status_mut() = status_for(self.error.kind());
        response
            .headers_mut()
            .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
        response
    }
}

/// Plain-text 200 with explicit length and no caching.
pub fn text_response(body: String) -> Response {
    let length = body.len();
    let mut response = body.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(TEXT_PLAIN));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// Request parameters, or the reason they could not be read.
///
/// Never rejects: a bad body surfaces as [`SwanError::InvalidParameter`]
/// inside the handler so it gets the same status, headers and metrics as
/// any other failure.
pub struct FormParams(pub swan::Result<QueryParams>);

#[async_trait]
impl<S> FromRequest<S> for FormParams
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request(req: Request, state: &S) -> std::result::Result<Self, Self::Rejection> {
        let query = req.uri().query().map(str::to_string);
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let params = match Bytes::from_request(req, state).await {
            Ok(body) => merge_params(query.as_deref(), content_type.as_deref(), &body),
            Err(rejection) => Err(SwanError::invalid_parameter("body", rejection.body_text())),
        };
        Ok(FormParams(params))
    }
}

/// Body pairs first, then query pairs. A non-empty body must be a
/// urlencoded form.
fn merge_params(
    query: Option<&str>,
    content_type: Option<&str>,
    body: &[u8],
) -> swan::Result<QueryParams> {
    let mut params = QueryParams::new();
    if !body.is_empty() {
        let mime = content_type
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .unwrap_or_default();
        if !mime.eq_ignore_ascii_case(FORM_URLENCODED) {
            return Err(SwanError::invalid_parameter(
                "Content-Type",
                format!("expected '{}', got '{}'", FORM_URLENCODED, mime),
            ));
        }
        for (name, value) in form_urlencoded::parse(body) {
            params.append(name, value);
        }
    }
    if let Some(query) = query {
        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            params.append(name, value);
        }
    }
    Ok(params)
}

fn request_host(host: std::result::Result<Host, HostRejection>) -> swan::Result<String> {
    host.map(|Host(host)| host)
        .map_err(|rejection| SwanError::invalid_parameter("Host", rejection.body_text()))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// Fetch: starts a storage operation that creates a fresh CBID plus empty
/// email and allow fields.
async fn fetch_handler(State(state): State<AppState>, FormParams(params): FormParams) -> Response {
    state.metrics.record_request(FETCH_ROUTE);
    let outcome = storage_operation(&state, params, inject_fetch_defaults).await;
    state.respond(FETCH_ROUTE, outcome)
}

/// Update: starts a storage operation writing the supplied cbid, email and
/// allow values.
async fn update_handler(State(state): State<AppState>, FormParams(params): FormParams) -> Response {
    state.metrics.record_request(UPDATE_ROUTE);
    let outcome = storage_operation(&state, params, inject_update_values).await;
    state.respond(UPDATE_ROUTE, outcome)
}

async fn storage_operation(
    state: &AppState,
    params: swan::Result<QueryParams>,
    inject: fn(&mut QueryParams, chrono::NaiveDate),
) -> swan::Result<Response> {
    let params = params?;
    authorize(state.access.as_ref(), &params).await?;
    validate_common(&params)?;

    let expires = storage_expiry_date(Utc::now());
    let next = state
        .composer
        .create_storage_operation_url(params, |p| inject(p, expires))
        .await?;
    Ok(text_response(next))
}

/// Decode: decrypts `data` and returns every value re-signed for the
/// requesting host.
async fn decode_as_json_handler(
    State(state): State<AppState>,
    host: std::result::Result<Host, HostRejection>,
    FormParams(params): FormParams,
) -> Response {
    state.metrics.record_request(DECODE_AS_JSON_ROUTE);
    let outcome = async {
        let params = params?;
        let host = request_host(host)?;
        authorize(state.access.as_ref(), &params).await?;
        let data = params.get(DATA_PARAM).unwrap_or_default();
        let values = state.pipeline.decode(data, &host).await?;
        let mut response = Json(values).into_response();
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
        Ok::<_, SwanError>(response)
    }
    .await;
    state.respond(DECODE_AS_JSON_ROUTE, outcome)
}

/// Create offer ID: signs an offer for the requesting host.
async fn create_offer_id_handler(
    State(state): State<AppState>,
    host: std::result::Result<Host, HostRejection>,
    FormParams(params): FormParams,
) -> Response {
    state.metrics.record_request(CREATE_OFFER_ID_ROUTE);
    let outcome = async {
        let params = params?;
        let host = request_host(host)?;
        authorize(state.access.as_ref(), &params).await?;
        let offer = OfferId::from_params(&params)?;
        let token = offer.sign(&state.encoder, &host, Utc::now()).await?;
        tracing::debug!(domain = %host, uuid = %offer.uuid, "offer id created");
        Ok::<_, SwanError>(text_response(token))
    }
    .await;
    state.respond(CREATE_OFFER_ID_ROUTE, outcome)
}

/// Preferences page. The template is rendered once at startup.
async fn preferences_handler(State(state): State<AppState>) -> Response {
    state.metrics.record_request(PREFERENCES_ROUTE);
    (
        [(CONTENT_TYPE, TEXT_HTML), (CACHE_CONTROL, NO_CACHE)],
        state.preferences_html.to_string(),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::SwanMetrics;
    use crate::settings::CreatorSeed;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{HeaderMap, Request};
    use bytes::Bytes;
    use chrono::{DateTime, Duration};
    use http_body_util::BodyExt;
    use parking_lot::Mutex;
    use swan::config::{CREATE_PATH, DECRYPT_PATH};
    use swan::owid::{Creator, Owid};
    use swan::sid::SidAlgorithm;
    use swan::swift::{encode_results, Pair, ResultSet};
    use tower::ServiceExt;
    use url::Url;

    const DOMAIN: &str = "pub.example";
    const KEY: &str = "pub-key";
    const SECRET: &str = "0707070707070707070707070707070707070707070707070707070707070707";
    const NEXT_HOP: &str = "https://hop1.example/swift/op/abc";

    /// In-memory access node: answers decrypt with fixed results and create
    /// with a fixed next hop, recording every URL it is asked for.
    struct FakeNode {
        calls: Mutex<Vec<Url>>,
        results: Vec<u8>,
        fail_status: Option<u16>,
    }

    impl FakeNode {
        fn calls(&self) -> Vec<Url> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl HttpGet for FakeNode {
        async fn get(&self, url: &Url) -> swan::Result<Bytes> {
            self.calls.lock().push(url.clone());
            if let Some(status) = self.fail_status {
                return Err(SwanError::Upstream {
                    url: url.to_string(),
                    status,
                    body: "node unhappy".into(),
                });
            }
            match url.path() {
                DECRYPT_PATH => Ok(Bytes::from(self.results.clone())),
                CREATE_PATH => Ok(Bytes::from_static(NEXT_HOP.as_bytes())),
                _ => Err(SwanError::Upstream {
                    url: url.to_string(),
                    status: 404,
                    body: String::new(),
                }),
            }
        }
    }

    struct Harness {
        router: Router,
        node: Arc<FakeNode>,
        creator: Creator,
    }

    struct Options {
        access_node: Option<&'static str>,
        debug: bool,
        results: Vec<u8>,
        fail_status: Option<u16>,
    }

    impl Default for Options {
        fn default() -> Self {
            Self {
                access_node: Some("node.swift.example"),
                debug: false,
                results: encode_results(&sample_results()).unwrap(),
                fail_status: None,
            }
        }
    }

    fn sample_results() -> ResultSet {
        let old = DateTime::from_timestamp(1_600_000_000, 0).unwrap();
        vec![
            Pair::new("cbid", b"c-42".to_vec(), old),
            Pair::new("email", b"reader@example.com".to_vec(), old),
            Pair::new("allow", b"on".to_vec(), old),
        ]
        .into_iter()
        .collect()
    }

    fn harness(options: Options) -> Harness {
        let settings = Settings {
            port: 0,
            metrics_port: 0,
            swan: SwanConfig {
                network: "swan-test".into(),
                access_key: "node-key".into(),
                value_timeout_secs: 600,
                debug: options.debug,
                ..SwanConfig::default()
            },
            access_node: options.access_node.map(str::to_string),
            allowed_access_keys: vec![KEY.to_string()],
            request_timeout: std::time::Duration::from_secs(5),
            sid: SidAlgorithm::Sha256,
            creators: vec![CreatorSeed {
                domain: DOMAIN.into(),
                name: "Publisher".into(),
                secret_key_hex: SECRET.into(),
            }],
            preferences_template: None,
        };
        let node = Arc::new(FakeNode {
            calls: Mutex::new(Vec::new()),
            results: options.results,
            fail_status: options.fail_status,
        });
        let metrics = Arc::new(SwanMetrics::new().unwrap());
        let state = AppState::from_settings(&settings, node.clone(), metrics).unwrap();
        let creator = Creator::from_secret_hex(DOMAIN, "Publisher", SECRET).unwrap();
        Harness {
            router: create_router(state),
            node,
            creator,
        }
    }

    /// Sends a GET with `Host: pub.example` and returns (status, headers, body).
    async fn get(router: &Router, path: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        let req = Request::builder()
            .uri(path)
            .header("host", DOMAIN)
            .body(Body::empty())
            .unwrap();
        send(router, req).await
    }

    /// Sends a urlencoded POST and returns (status, headers, body).
    async fn post_form(router: &Router, path: &str, form: &str) -> (StatusCode, HeaderMap, Vec<u8>) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("host", DOMAIN)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap();
        send(router, req).await
    }

    /// Sends a POST with an optional content type and returns
    /// (status, headers, body).
    async fn post_raw(
        router: &Router,
        path: &str,
        content_type: Option<&str>,
        body: &str,
    ) -> (StatusCode, HeaderMap, Vec<u8>) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(path)
            .header("host", DOMAIN);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        send(router, builder.body(Body::from(body.to_string())).unwrap()).await
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        (status, headers, body)
    }

    fn decode_values(body: &[u8]) -> Vec<serde_json::Value> {
        serde_json::from_slice(body).unwrap()
    }

    // -- 1. Health ------------------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let h = harness(Options::default());
        let (status, _, body) = get(&h.router, "/health").await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    // -- 2. Decode ------------------------------------------------------------

    #[tokio::test]
    async fn decode_returns_one_verifiable_owid_per_value() {
        let h = harness(Options::default());
        let (status, headers, body) =
            get(&h.router, "/swan/api/v1/decode-as-json?accessKey=pub-key&data=blob").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "application/json");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");

        let values = decode_values(&body);
        assert_eq!(values.len(), 3);
        for value in &values {
            let owid = Owid::from_base64(value["value"].as_str().unwrap()).unwrap();
            assert_eq!(owid.domain(), DOMAIN);
            assert!(owid.verify(&h.creator.public_key()));
        }

        let calls = h.node.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].path(), "/swift/api/v1/decrypt");
        assert!(calls[0].query().unwrap().contains("accessKey=node-key"));
    }

    #[tokio::test]
    async fn decode_replaces_email_with_sid() {
        let h = harness(Options::default());
        let (_, _, body) =
            get(&h.router, "/swan/api/v1/decode-as-json?accessKey=pub-key&data=blob").await;

        let values = decode_values(&body);
        let keys: Vec<&str> = values.iter().map(|v| v["key"].as_str().unwrap()).collect();
        assert_eq!(keys, ["cbid", "sid", "allow"]);

        let sid = Owid::from_base64(values[1]["value"].as_str().unwrap()).unwrap();
        assert_eq!(sid.payload().len(), 32);
        assert!(!String::from_utf8_lossy(&body).contains("reader@example.com"));
    }

    #[tokio::test]
    async fn decode_stamps_expiry_within_timeout() {
        let h = harness(Options::default());
        let before = Utc::now();
        let (_, _, body) =
            get(&h.router, "/swan/api/v1/decode-as-json?accessKey=pub-key&data=blob").await;
        let after = Utc::now();

        for value in decode_values(&body) {
            let expires: DateTime<Utc> = value["expires"].as_str().unwrap().parse().unwrap();
            assert!(expires >= before);
            assert!(expires <= after + Duration::seconds(600));
        }
    }

    #[tokio::test]
    async fn decode_accepts_post_form() {
        let h = harness(Options::default());
        let (status, _, body) = post_form(
            &h.router,
            "/swan/api/v1/decode-as-json",
            "accessKey=pub-key&data=blob",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decode_values(&body).len(), 3);
    }

    #[tokio::test]
    async fn post_merges_query_string_with_form_body() {
        let h = harness(Options::default());
        let (status, _, body) = post_form(
            &h.router,
            "/swan/api/v1/decode-as-json?accessKey=pub-key",
            "data=blob",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decode_values(&body).len(), 3);
    }

    #[tokio::test]
    async fn post_without_body_reads_the_query_string() {
        let h = harness(Options::default());
        let (status, _, body) = post_raw(
            &h.router,
            "/swan/api/v1/decode-as-json?accessKey=pub-key&data=blob",
            None,
            "",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(decode_values(&body).len(), 3);
    }

    #[tokio::test]
    async fn form_body_wins_over_query_string() {
        let h = harness(Options::default());
        let (status, _, _) = post_form(
            &h.router,
            "/swan/api/v1/decode-as-json?accessKey=wrong&data=blob",
            "accessKey=pub-key",
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _, _) = post_form(
            &h.router,
            "/swan/api/v1/decode-as-json?accessKey=pub-key&data=blob",
            "accessKey=wrong",
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn non_form_body_is_400_with_the_usual_error_headers() {
        let h = harness(Options::default());
        for content_type in [None, Some("application/json")] {
            let (status, headers, body) = post_raw(
                &h.router,
                "/swan/api/v1/decode-as-json?accessKey=pub-key",
                content_type,
                "{\"data\":\"blob\"}",
            )
            .await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(headers[CACHE_CONTROL], "no-cache");
            assert!(body.is_empty());
        }
        assert!(h.node.calls().is_empty());
    }

    #[tokio::test]
    async fn non_form_body_names_the_content_type_in_debug() {
        let h = harness(Options {
            debug: true,
            ..Default::default()
        });
        let (status, _, body) = post_raw(
            &h.router,
            "/swan/api/v1/fetch?accessKey=pub-key",
            Some("text/plain"),
            "returnUrl=x",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let message = String::from_utf8(body).unwrap();
        assert!(message.contains("Content-Type"));
        assert!(message.contains("text/plain"));
    }

    #[test]
    fn merge_params_orders_body_before_query() {
        let params = merge_params(
            Some("a=query&b=2"),
            Some("application/x-www-form-urlencoded; charset=utf-8"),
            b"a=body&c=%3D3",
        )
        .unwrap();
        assert_eq!(params.get("a"), Some("body"));
        assert_eq!(params.get_all("a").collect::<Vec<_>>(), ["body", "query"]);
        assert_eq!(params.get("b"), Some("2"));
        assert_eq!(params.get("c"), Some("=3"));

        let empty = merge_params(None, None, b"").unwrap();
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn decode_for_unregistered_host_is_500() {
        let h = harness(Options {
            debug: true,
            ..Default::default()
        });
        let req = Request::builder()
            .uri("/swan/api/v1/decode-as-json?accessKey=pub-key&data=blob")
            .header("host", "stranger.example")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&h.router, req).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let message = String::from_utf8(body).unwrap();
        assert!(message.contains("No creator for 'stranger.example'"));
    }

    #[tokio::test]
    async fn malformed_results_are_422() {
        let h = harness(Options {
            results: vec![9, 9, 9],
            ..Default::default()
        });
        let (status, _, _) =
            get(&h.router, "/swan/api/v1/decode-as-json?accessKey=pub-key&data=blob").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn upstream_failure_is_502_with_details_in_debug() {
        let h = harness(Options {
            debug: true,
            fail_status: Some(503),
            ..Default::default()
        });
        let (status, _, body) =
            get(&h.router, "/swan/api/v1/decode-as-json?accessKey=pub-key&data=blob").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let message = String::from_utf8(body).unwrap();
        assert!(message.contains("returned '503'"));
        assert!(message.contains("node unhappy"));
    }

    // -- 3. Access gate -------------------------------------------------------

    #[tokio::test]
    async fn unauthorized_requests_never_reach_the_node() {
        let h = harness(Options::default());
        for path in [
            "/swan/api/v1/decode-as-json?accessKey=wrong&data=blob",
            "/swan/api/v1/fetch?returnUrl=https%3A%2F%2Fpub.example%2F",
            "/swan/api/v1/update?accessKey=&returnUrl=https%3A%2F%2Fpub.example%2F",
            "/swan/api/v1/create-offer-id?placement=top&pubdomain=pub.example",
        ] {
            let (status, headers, body) = get(&h.router, path).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", path);
            assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(headers[CACHE_CONTROL], "no-cache");
            assert!(body.is_empty());
        }
        assert!(h.node.calls().is_empty());
    }

    // -- 4. Fetch and update --------------------------------------------------

    #[tokio::test]
    async fn fetch_returns_next_hop_as_text() {
        let h = harness(Options::default());
        let (status, headers, body) = get(
            &h.router,
            "/swan/api/v1/fetch?accessKey=pub-key&returnUrl=https%3A%2F%2Fpub.example%2F",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, NEXT_HOP.as_bytes());
        assert_eq!(headers[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[CONTENT_LENGTH], NEXT_HOP.len().to_string().as_str());

        let calls = h.node.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].host_str(), Some("node.swift.example"));
        assert_eq!(calls[0].path(), "/swift/api/v1/create");

        let pairs: Vec<(String, String)> = calls[0].query_pairs().into_owned().collect();
        assert!(pairs.contains(&("returnUrl".into(), "https://pub.example/".into())));
        let cbid = pairs.iter().find(|(n, _)| n.starts_with("cbid<")).unwrap();
        assert!(uuid::Uuid::parse_str(&cbid.1).is_ok());
        assert!(pairs.iter().any(|(n, v)| n.starts_with("email<") && v.is_empty()));
        assert!(pairs.iter().any(|(n, v)| n.starts_with("allow<") && v.is_empty()));
    }

    #[tokio::test]
    async fn fetch_always_targets_the_swan_table() {
        let h = harness(Options::default());
        let (status, _, _) = get(
            &h.router,
            "/swan/api/v1/fetch?accessKey=pub-key&table=foo&table=bar\
             &returnUrl=https%3A%2F%2Fpub.example%2F",
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let calls = h.node.calls();
        let tables: Vec<String> = calls[0]
            .query_pairs()
            .filter(|(n, _)| n == "table")
            .map(|(_, v)| v.into_owned())
            .collect();
        assert_eq!(tables, ["swan"]);
    }

    #[tokio::test]
    async fn update_writes_supplied_values_as_stored_fields() {
        let h = harness(Options::default());
        let (status, _, _) = post_form(
            &h.router,
            "/swan/api/v1/update",
            "accessKey=pub-key&returnUrl=https%3A%2F%2Fpub.example%2F\
             &email=reader%40example.com&allow=on",
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let calls = h.node.calls();
        let pairs: Vec<(String, String)> = calls[0].query_pairs().into_owned().collect();
        assert!(!pairs.iter().any(|(n, _)| n == "email" || n == "allow"));
        assert!(pairs
            .iter()
            .any(|(n, v)| n.starts_with("email<") && v == "reader@example.com"));
        assert!(pairs.iter().any(|(n, v)| n.starts_with("allow<") && v == "on"));
        assert!(!pairs.iter().any(|(n, _)| n.starts_with("cbid<")));
    }

    #[tokio::test]
    async fn invalid_parameters_are_400_without_upstream_calls() {
        let h = harness(Options {
            debug: true,
            ..Default::default()
        });
        let (status, _, body) = get(
            &h.router,
            "/swan/api/v1/fetch?accessKey=pub-key&returnUrl=https%3A%2F%2Fpub.example%2F\
             &backgroundColor=blue",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(String::from_utf8(body).unwrap().contains("backgroundColor"));

        let (status, _, _) = get(&h.router, "/swan/api/v1/fetch?accessKey=pub-key").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(h.node.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_access_node_names_the_network_in_debug() {
        let h = harness(Options {
            access_node: None,
            debug: true,
            ..Default::default()
        });
        let (status, headers, body) = get(
            &h.router,
            "/swan/api/v1/fetch?accessKey=pub-key&returnUrl=https%3A%2F%2Fpub.example%2F",
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(headers[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        let message = String::from_utf8(body).unwrap();
        assert!(message.contains("'swan-test'"));
        assert!(message.contains("/swift/register"));
        assert!(h.node.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_access_node_hides_details_in_production() {
        let h = harness(Options {
            access_node: None,
            ..Default::default()
        });
        let (status, _, body) = get(
            &h.router,
            "/swan/api/v1/fetch?accessKey=pub-key&returnUrl=https%3A%2F%2Fpub.example%2F",
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
    }

    // -- 5. Offer IDs ---------------------------------------------------------

    #[tokio::test]
    async fn create_offer_id_returns_signed_offer() {
        let h = harness(Options::default());
        let (status, headers, body) = get(
            &h.router,
            "/swan/api/v1/create-offer-id?accessKey=pub-key&placement=top&pubdomain=pub.example&cbid=c-42",
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "text/plain; charset=utf-8");
        let owid = Owid::from_base64(std::str::from_utf8(&body).unwrap()).unwrap();
        assert!(owid.verify(&h.creator.public_key()));

        let offer: OfferId = serde_json::from_slice(owid.payload()).unwrap();
        assert_eq!(offer.placement, "top");
        assert_eq!(offer.cbid.as_deref(), Some("c-42"));
        assert!(h.node.calls().is_empty());
    }

    #[tokio::test]
    async fn create_offer_id_requires_placement() {
        let h = harness(Options::default());
        let (status, _, _) = get(
            &h.router,
            "/swan/api/v1/create-offer-id?accessKey=pub-key&pubdomain=pub.example",
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // -- 6. Preferences -------------------------------------------------------

    #[tokio::test]
    async fn preferences_page_is_html() {
        let h = harness(Options::default());
        let (status, headers, _) = get(&h.router, "/swan/preferences/anything").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[CONTENT_TYPE], "text/html; charset=utf-8");
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
    }

    #[test]
    fn status_mapping_covers_every_kind() {
        assert_eq!(status_for(ErrorKind::Authorization), StatusCode::UNAUTHORIZED);
        assert_eq!(status_for(ErrorKind::InvalidParameter), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorKind::Validation), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::Upstream), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Network), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Configuration), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(ErrorKind::Encoding), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
