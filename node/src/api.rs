//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the vault factory over HTTP. All
//! endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path                          | Description                          |
//! |--------|-------------------------------|--------------------------------------|
//! | GET    | `/health`                     | Liveness probe                       |
//! | GET    | `/status`                     | Node and factory summary             |
//! | GET    | `/vaults`                     | Registry, optionally paged           |
//! | POST   | `/vaults`                     | Create a vault                       |
//! | POST   | `/vaults/predict`             | Address a request would get          |
//! | GET    | `/vaults/:address`            | Record and live state of one vault   |
//! | POST   | `/vaults/:address/deposit`    | Deposit into a vault                 |
//! | POST   | `/vaults/:address/withdraw`   | Owner withdrawal                     |
//! | GET    | `/creators/:creator/vaults`   | Vaults created by one account        |
//! | GET    | `/ledger/:account/:asset`     | Ledger balance                       |
//! | POST   | `/faucet`                     | Mint test funds (devnet only)        |
//! | GET    | `/ws`                         | WebSocket for live vault events      |
//!
//! Failures come back as `{"error": <message>, "kind": <variant>}` with a
//! status code chosen by [`ApiError::status`].

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use piggybank_contracts::validation::lock_duration_from_signed;
use piggybank_contracts::{
    Payout, VaultError, VaultFactory, VaultRecord, VaultSnapshot, WithdrawalReceipt,
};
use piggybank_protocol::config::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, NETWORK_DEVNET};
use piggybank_protocol::{
    AccountId, AssetId, Clock, FactoryId, IdentifierDeriver, MemoryLedger, Salt, VaultAddress,
};

use crate::metrics::SharedMetrics;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone, everything behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network identifier (e.g., "devnet", "testnet", "mainnet").
    pub network: String,
    /// The factory and its registry.
    pub factory: Arc<VaultFactory>,
    /// The ledger the factory's vaults move funds through.
    pub ledger: Arc<MemoryLedger>,
    /// Whether `POST /faucet` may mint.
    pub faucet_enabled: bool,
    /// Broadcast channel for live event notifications.
    pub event_tx: broadcast::Sender<NodeEvent>,
    /// Reference to Prometheus metrics for in-handler recording.
    pub metrics: SharedMetrics,
}

impl AppState {
    /// Counts and logs a refused operation, then wraps it for the response.
    fn rejected(&self, operation: &'static str, err: VaultError) -> ApiError {
        self.metrics.record_rejection(err.kind());
        tracing::debug!(operation, kind = err.kind(), error = %err, "operation rejected");
        ApiError::Vault(err)
    }

    fn timer(&self, operation: &str) -> prometheus::HistogramTimer {
        self.metrics
            .operation_latency_seconds
            .with_label_values(&[operation])
            .start_timer()
    }
}

/// Wires a fresh factory for `(network, label)` over an empty in-memory
/// ledger.
pub fn build_state(
    network: &str,
    factory_label: &str,
    clock: Arc<dyn Clock>,
    metrics: SharedMetrics,
    event_tx: broadcast::Sender<NodeEvent>,
) -> AppState {
    let ledger = Arc::new(MemoryLedger::new());
    let factory = Arc::new(VaultFactory::new(
        FactoryId::derive(network, factory_label),
        ledger.clone(),
        clock,
    ));
    AppState {
        version: format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            piggybank_protocol::config::PROTOCOL_VERSION,
        ),
        network: network.to_string(),
        factory,
        ledger,
        faucet_enabled: network == NETWORK_DEVNET,
        event_tx,
        metrics,
    }
}

/// Events pushed to WebSocket subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeEvent {
    /// A vault was created and registered.
    #[serde(rename = "vault_created")]
    VaultCreated {
        identifier: VaultAddress,
        creator: AccountId,
        unlock_at: DateTime<Utc>,
    },
    /// A deposit was accepted.
    #[serde(rename = "deposited")]
    Deposited {
        vault: VaultAddress,
        caller: AccountId,
        asset: AssetId,
        amount: u64,
        balance: u64,
    },
    /// A vault paid out to its owner.
    #[serde(rename = "withdrawn")]
    Withdrawn {
        vault: VaultAddress,
        owner: AccountId,
        payouts: Vec<Payout>,
    },
}

// ---------------------------------------------------------------------------
// Router Construction
// ---------------------------------------------------------------------------

/// Builds the full axum [`Router`] with all API routes, CORS, and tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/vaults", get(list_vaults_handler).post(create_vault_handler))
        .route("/vaults/predict", post(predict_handler))
        .route("/vaults/:address", get(vault_handler))
        .route("/vaults/:address/deposit", post(deposit_handler))
        .route("/vaults/:address/withdraw", post(withdraw_handler))
        .route("/creators/:creator/vaults", get(creator_vaults_handler))
        .route("/ledger/:account/:asset", get(ledger_balance_handler))
        .route("/faucet", post(faucet_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything a handler can fail with.
#[derive(Debug)]
pub enum ApiError {
    /// Refused by the factory or a vault.
    Vault(VaultError),
    /// The request could not be interpreted (e.g. a malformed address).
    BadRequest(String),
    /// Minting is only offered on devnet.
    FaucetDisabled(String),
}

impl ApiError {
    /// HTTP status for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Vault(e) => match e {
                VaultError::InvalidArguments(_)
                | VaultError::InvalidAmount
                | VaultError::UnsupportedAsset(_) => StatusCode::BAD_REQUEST,
                VaultError::Unauthorized { .. } => StatusCode::FORBIDDEN,
                VaultError::VaultNotFound(_) => StatusCode::NOT_FOUND,
                VaultError::DuplicateAccount(_)
                | VaultError::AlreadyWithdrawn
                | VaultError::Finalized
                | VaultError::StillLocked { .. } => StatusCode::CONFLICT,
                VaultError::BalanceOverflow { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                VaultError::LedgerFailure(_) => StatusCode::BAD_GATEWAY,
            },
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::FaucetDisabled(_) => StatusCode::FORBIDDEN,
        }
    }

    /// Machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Vault(e) => e.kind(),
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::FaucetDisabled(_) => "FaucetDisabled",
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Vault(e) => write!(f, "{}", e),
            ApiError::BadRequest(msg) => write!(f, "bad request: {}", msg),
            ApiError::FaucetDisabled(network) => {
                write!(f, "faucet is disabled on network {}", network)
            }
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(e: VaultError) -> Self {
        ApiError::Vault(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.to_string(),
            kind: self.kind().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

fn parse_address(raw: &str) -> Result<VaultAddress, ApiError> {
    raw.parse::<VaultAddress>()
        .map_err(|e| ApiError::BadRequest(format!("malformed vault address {}: {}", raw, e)))
}

// ---------------------------------------------------------------------------
// Request / Response Types
// ---------------------------------------------------------------------------

/// Body of `POST /vaults`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateVaultRequest {
    /// Creator and future owner.
    pub creator: AccountId,
    /// Exactly three distinct asset ids.
    pub allowed_assets: Vec<AssetId>,
    /// Lock length in seconds. Negative values are refused.
    pub lock_duration_secs: i64,
    /// Free-form label.
    #[serde(default)]
    pub purpose: String,
}

/// Body of `POST /vaults/predict`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictRequest {
    pub creator: AccountId,
    pub allowed_assets: Vec<AssetId>,
    pub lock_duration_secs: i64,
    #[serde(default)]
    pub purpose: String,
    /// Explicit salt. Derived from creator and purpose when absent.
    #[serde(default)]
    pub salt: Option<Salt>,
}

/// Body of `POST /vaults/:address/deposit`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DepositRequest {
    pub caller: AccountId,
    pub asset: AssetId,
    pub amount: u64,
}

/// Body of `POST /vaults/:address/withdraw`.
#[derive(Debug, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub caller: AccountId,
}

/// Body of `POST /faucet`.
#[derive(Debug, Serialize, Deserialize)]
pub struct FaucetRequest {
    pub account: AccountId,
    pub asset: AssetId,
    pub amount: u64,
}

/// Query string of `GET /vaults`.
#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network identifier.
    pub network: String,
    /// Hex-encoded factory namespace.
    pub factory_id: String,
    /// Vaults in the registry.
    pub vault_count: usize,
    /// Whether `POST /faucet` is available.
    pub faucet_enabled: bool,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// Response payload for `GET /vaults`.
#[derive(Debug, Serialize, Deserialize)]
pub struct RecordsPage {
    /// Vaults in the registry.
    pub total: usize,
    /// Index of the first record returned.
    pub offset: usize,
    /// Records in creation order.
    pub records: Vec<VaultRecord>,
}

/// Response payload for `POST /vaults`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateVaultResponse {
    pub identifier: VaultAddress,
    pub record: VaultRecord,
}

/// Response payload for `POST /vaults/predict`.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub identifier: VaultAddress,
    pub salt: Salt,
}

/// Response payload for `GET /vaults/:address`.
#[derive(Debug, Serialize, Deserialize)]
pub struct VaultResponse {
    pub record: VaultRecord,
    pub vault: VaultSnapshot,
}

/// Response payload for `POST /vaults/:address/deposit`.
#[derive(Debug, Serialize, Deserialize)]
pub struct DepositResponse {
    pub vault: VaultAddress,
    pub asset: AssetId,
    /// The vault's balance of `asset` after the deposit.
    pub balance: u64,
}

/// Response payload for `GET /ledger/:account/:asset` and `POST /faucet`.
#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub account: AccountId,
    pub asset: AssetId,
    pub balance: u64,
}

/// Error body returned by every endpoint on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}

/// `GET /status`: node and factory summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        factory_id: state.factory.factory_id().to_hex(),
        vault_count: state.factory.vault_count(),
        faucet_enabled: state.faucet_enabled,
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// `GET /vaults`: the whole registry, or one page of it when `offset` or
/// `limit` is given. Page size is capped at [`MAX_PAGE_LIMIT`].
async fn list_vaults_handler(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Json<RecordsPage> {
    let total = state.factory.vault_count();
    let (offset, records) = match (page.offset, page.limit) {
        (None, None) => (0, state.factory.get_all_records()),
        (offset, limit) => {
            let offset = offset.unwrap_or(0);
            let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).min(MAX_PAGE_LIMIT);
            (offset, state.factory.records_page(offset, limit))
        }
    };
    Json(RecordsPage {
        total,
        offset,
        records,
    })
}

/// `POST /vaults`: creates a vault and broadcasts `vault_created`.
async fn create_vault_handler(
    State(state): State<AppState>,
    Json(req): Json<CreateVaultRequest>,
) -> Result<(StatusCode, Json<CreateVaultResponse>), ApiError> {
    let _timer = state.timer("create_vault");

    let lock_secs = lock_duration_from_signed(req.lock_duration_secs)
        .map_err(|e| state.rejected("create_vault", e))?;
    let (identifier, record) = state
        .factory
        .create_vault(&req.creator, &req.allowed_assets, lock_secs, &req.purpose)
        .map_err(|e| state.rejected("create_vault", e))?;

    state.metrics.vaults_created_total.inc();
    state
        .metrics
        .registered_vaults
        .set(state.factory.vault_count() as i64);
    let _ = state.event_tx.send(NodeEvent::VaultCreated {
        identifier,
        creator: record.creator.clone(),
        unlock_at: record.unlock_at,
    });

    Ok((
        StatusCode::CREATED,
        Json(CreateVaultResponse { identifier, record }),
    ))
}

/// `POST /vaults/predict`: the address a creation request would get.
/// Touches nothing.
async fn predict_handler(
    State(state): State<AppState>,
    Json(req): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, ApiError> {
    let lock_secs = lock_duration_from_signed(req.lock_duration_secs)
        .map_err(|e| state.rejected("predict", e))?;
    let salt = req
        .salt
        .unwrap_or_else(|| IdentifierDeriver::derive_salt(&req.creator, &req.purpose));
    let identifier = state
        .factory
        .compute_identifier(
            &req.creator,
            &req.allowed_assets,
            lock_secs,
            &req.purpose,
            &salt,
        )
        .map_err(|e| state.rejected("predict", e))?;
    Ok(Json(PredictResponse { identifier, salt }))
}

/// `GET /vaults/:address`: the record and a live snapshot.
async fn vault_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<VaultResponse>, ApiError> {
    let address = parse_address(&address)?;
    let vault = state.factory.vault(&address)?;
    let record = state
        .factory
        .record(&address)
        .ok_or(VaultError::VaultNotFound(address))?;
    Ok(Json(VaultResponse {
        record,
        vault: vault.snapshot(),
    }))
}

/// `POST /vaults/:address/deposit`: pays into a vault and broadcasts
/// `deposited`.
async fn deposit_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<DepositRequest>,
) -> Result<Json<DepositResponse>, ApiError> {
    let _timer = state.timer("deposit");
    let address = parse_address(&address)?;
    let vault = state.factory.vault(&address)?;

    let balance = vault
        .deposit(&req.caller, &req.asset, req.amount)
        .map_err(|e| state.rejected("deposit", e))?;

    state.metrics.deposits_total.inc();
    let _ = state.event_tx.send(NodeEvent::Deposited {
        vault: address,
        caller: req.caller,
        asset: req.asset.clone(),
        amount: req.amount,
        balance,
    });

    Ok(Json(DepositResponse {
        vault: address,
        asset: req.asset,
        balance,
    }))
}

/// `POST /vaults/:address/withdraw`: owner withdrawal; broadcasts
/// `withdrawn`.
async fn withdraw_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(req): Json<WithdrawRequest>,
) -> Result<Json<WithdrawalReceipt>, ApiError> {
    let _timer = state.timer("withdraw");
    let address = parse_address(&address)?;
    let vault = state.factory.vault(&address)?;

    let receipt = vault
        .withdraw(&req.caller)
        .map_err(|e| state.rejected("withdraw", e))?;

    state.metrics.withdrawals_total.inc();
    let _ = state.event_tx.send(NodeEvent::Withdrawn {
        vault: address,
        owner: receipt.owner.clone(),
        payouts: receipt.payouts.clone(),
    });

    Ok(Json(receipt))
}

/// `GET /creators/:creator/vaults`: records created by one account.
async fn creator_vaults_handler(
    State(state): State<AppState>,
    Path(creator): Path<String>,
) -> Json<Vec<VaultRecord>> {
    Json(state.factory.records_by_creator(&AccountId::new(creator)))
}

/// `GET /ledger/:account/:asset`: balance held on the ledger.
async fn ledger_balance_handler(
    State(state): State<AppState>,
    Path((account, asset)): Path<(String, String)>,
) -> Json<BalanceResponse> {
    let account = AccountId::new(account);
    let asset = AssetId::new(asset);
    let balance = state.ledger.balance_of(&account, &asset);
    Json(BalanceResponse {
        account,
        asset,
        balance,
    })
}

/// `POST /faucet`: mints test funds. Devnet only.
async fn faucet_handler(
    State(state): State<AppState>,
    Json(req): Json<FaucetRequest>,
) -> Result<Json<BalanceResponse>, ApiError> {
    if !state.faucet_enabled {
        return Err(ApiError::FaucetDisabled(state.network.clone()));
    }
    if req.amount == 0 {
        return Err(state.rejected("faucet", VaultError::InvalidAmount));
    }
    let balance = state
        .ledger
        .mint(&req.account, &req.asset, req.amount)
        .map_err(|e| state.rejected("faucet", e.into()))?;
    tracing::info!(account = %req.account, asset = %req.asset, amount = req.amount, "faucet mint");
    Ok(Json(BalanceResponse {
        account: req.account,
        asset: req.asset,
        balance,
    }))
}

/// `GET /ws`: WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`NodeEvent`] messages. The connection is
/// read-only from the server's perspective; client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(mut socket: WebSocket, state: AppState) {
    let mut rx = state.event_tx.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => {
                match event {
                    Ok(ev) => {
                        let payload = match serde_json::to_string(&ev) {
                            Ok(s) => s,
                            Err(e) => {
                                tracing::warn!("failed to serialize ws event: {}", e);
                                continue;
                            }
                        };
                        if socket.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
            msg = socket.recv() => {
                match msg {
                    Some(Ok(_)) => {}
                    _ => break,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NodeMetrics;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, TimeZone};
    use http_body_util::BodyExt;
    use piggybank_protocol::ManualClock;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct TestNode {
        router: Router,
        state: AppState,
        clock: Arc<ManualClock>,
    }

    /// Creates a router over a fresh factory with a frozen clock.
    fn test_node(network: &str) -> TestNode {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        ));
        let (event_tx, _) = broadcast::channel(16);
        let state = build_state(
            network,
            "api-test",
            clock.clone(),
            Arc::new(NodeMetrics::new()),
            event_tx,
        );
        TestNode {
            router: create_router(state.clone()),
            state,
            clock,
        }
    }

    /// Sends a GET request and returns the (status, json body).
    async fn get(router: &Router, path: &str) -> (StatusCode, Value) {
        let req = Request::builder().uri(path).body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    /// Sends a POST request with JSON body and returns (status, json body).
    async fn post_json(router: &Router, path: &str, body: Value) -> (StatusCode, Value) {
        let req = Request::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&body).unwrap())
    }

    fn savings_request() -> Value {
        json!({
            "creator": "U1",
            "allowed_assets": ["X", "Y", "Z"],
            "lock_duration_secs": 86_400,
            "purpose": "Test Savings",
        })
    }

    /// Creates the standard vault and returns its address.
    async fn create_savings(node: &TestNode) -> String {
        let (status, body) = post_json(&node.router, "/vaults", savings_request()).await;
        assert_eq!(status, StatusCode::CREATED);
        body["identifier"].as_str().unwrap().to_string()
    }

    // -- Liveness and status ------------------------------------------------

    #[tokio::test]
    async fn health_endpoint_returns_ok() {
        let node = test_node("devnet");
        let (status, body) = get(&node.router, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn status_reports_factory_and_count() {
        let node = test_node("devnet");
        create_savings(&node).await;

        let (status, body) = get(&node.router, "/status").await;
        assert_eq!(status, StatusCode::OK);
        let resp: StatusResponse = serde_json::from_value(body).unwrap();
        assert_eq!(resp.network, "devnet");
        assert_eq!(resp.vault_count, 1);
        assert_eq!(resp.factory_id, FactoryId::derive("devnet", "api-test").to_hex());
        assert!(resp.faucet_enabled);
    }

    // -- Creation and prediction --------------------------------------------

    #[tokio::test]
    async fn predicted_address_matches_created_address() {
        let node = test_node("devnet");
        let (status, predicted) =
            post_json(&node.router, "/vaults/predict", savings_request()).await;
        assert_eq!(status, StatusCode::OK);

        let created = create_savings(&node).await;
        assert_eq!(predicted["identifier"], created.as_str());
        assert_eq!(node.state.metrics.vaults_created_total.get(), 1);
        assert_eq!(node.state.metrics.registered_vaults.get(), 1);
    }

    #[tokio::test]
    async fn predict_accepts_explicit_salt() {
        let node = test_node("devnet");
        let salt = IdentifierDeriver::derive_salt(&"someone-else".into(), "other");
        let mut req = savings_request();
        req["salt"] = json!(salt.to_hex());

        let (status, body) = post_json(&node.router, "/vaults/predict", req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["salt"], salt.to_hex());

        let (_, derived) = post_json(&node.router, "/vaults/predict", savings_request()).await;
        assert_ne!(body["identifier"], derived["identifier"]);
    }

    #[tokio::test]
    async fn two_assets_are_rejected_on_both_paths() {
        let node = test_node("devnet");
        let mut req = savings_request();
        req["allowed_assets"] = json!(["X", "Y"]);

        for path in ["/vaults/predict", "/vaults"] {
            let (status, body) = post_json(&node.router, path, req.clone()).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["kind"], "InvalidArguments");
        }
        assert_eq!(node.state.factory.vault_count(), 0);
    }

    #[tokio::test]
    async fn negative_lock_is_rejected() {
        let node = test_node("devnet");
        let mut req = savings_request();
        req["lock_duration_secs"] = json!(-1);
        let (status, body) = post_json(&node.router, "/vaults", req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "InvalidArguments");
    }

    #[tokio::test]
    async fn duplicate_creation_conflicts() {
        let node = test_node("devnet");
        create_savings(&node).await;
        let (status, body) = post_json(&node.router, "/vaults", savings_request()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "DuplicateAccount");
        assert_eq!(
            node.state
                .metrics
                .rejected_operations_total
                .with_label_values(&["DuplicateAccount"])
                .get(),
            1
        );
    }

    // -- Registry queries ---------------------------------------------------

    #[tokio::test]
    async fn registry_listing_and_paging() {
        let node = test_node("devnet");
        for (creator, purpose) in [("U1", "a"), ("U2", "b"), ("U1", "c")] {
            let req = json!({
                "creator": creator,
                "allowed_assets": ["X", "Y", "Z"],
                "lock_duration_secs": 0,
                "purpose": purpose,
            });
            let (status, _) = post_json(&node.router, "/vaults", req).await;
            assert_eq!(status, StatusCode::CREATED);
        }

        let (_, all) = get(&node.router, "/vaults").await;
        assert_eq!(all["total"], 3);
        assert_eq!(all["records"].as_array().unwrap().len(), 3);

        let (_, page) = get(&node.router, "/vaults?offset=1&limit=1").await;
        assert_eq!(page["offset"], 1);
        assert_eq!(page["records"][0]["purpose"], "b");

        let (_, mine) = get(&node.router, "/creators/U1/vaults").await;
        let purposes: Vec<&str> = mine
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["purpose"].as_str().unwrap())
            .collect();
        assert_eq!(purposes, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn unknown_and_malformed_addresses() {
        let node = test_node("devnet");
        let unknown = VaultAddress::from_bytes([9; 20]).to_hex();
        let (status, body) = get(&node.router, &format!("/vaults/{}", unknown)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["kind"], "VaultNotFound");

        let (status, body) = get(&node.router, "/vaults/0xnothex").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "BadRequest");
    }

    // -- Vault lifecycle ----------------------------------------------------

    #[tokio::test]
    async fn deposit_lock_and_withdraw_over_http() {
        let node = test_node("devnet");
        let mut events = node.state.event_tx.subscribe();
        let addr = create_savings(&node).await;

        let (status, _) = post_json(
            &node.router,
            "/faucet",
            json!({ "account": "U2", "asset": "X", "amount": 1_000 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = post_json(
            &node.router,
            &format!("/vaults/{}/deposit", addr),
            json!({ "caller": "U2", "asset": "X", "amount": 400 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"], 400);

        let (status, body) = post_json(
            &node.router,
            &format!("/vaults/{}/deposit", addr),
            json!({ "caller": "U2", "asset": "W", "amount": 1 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["kind"], "UnsupportedAsset");

        let withdraw = format!("/vaults/{}/withdraw", addr);
        let (status, body) = post_json(&node.router, &withdraw, json!({ "caller": "U2" })).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "Unauthorized");

        let (status, body) = post_json(&node.router, &withdraw, json!({ "caller": "U1" })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "StillLocked");

        node.clock.advance(Duration::days(1));
        let (status, body) = post_json(&node.router, &withdraw, json!({ "caller": "U1" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["payouts"][0]["amount"], 400);

        let (_, balance) = get(&node.router, "/ledger/U1/X").await;
        assert_eq!(balance["balance"], 400);

        let (status, body) = post_json(&node.router, &withdraw, json!({ "caller": "U1" })).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["kind"], "AlreadyWithdrawn");

        let (_, view) = get(&node.router, &format!("/vaults/{}", addr)).await;
        assert_eq!(view["vault"]["state"], "Withdrawn");
        assert_eq!(view["record"]["purpose"], "Test Savings");

        let kinds: Vec<String> = std::iter::from_fn(|| events.try_recv().ok())
            .map(|ev| serde_json::to_value(ev).unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(kinds, vec!["vault_created", "deposited", "withdrawn"]);
    }

    #[tokio::test]
    async fn deposit_without_funds_is_a_ledger_failure() {
        let node = test_node("devnet");
        let addr = create_savings(&node).await;
        let (status, body) = post_json(
            &node.router,
            &format!("/vaults/{}/deposit", addr),
            json!({ "caller": "U3", "asset": "Y", "amount": 5 }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["kind"], "LedgerFailure");
    }

    #[tokio::test]
    async fn faucet_is_devnet_only() {
        let node = test_node("testnet");
        let (status, body) = post_json(
            &node.router,
            "/faucet",
            json!({ "account": "U1", "asset": "X", "amount": 10 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["kind"], "FaucetDisabled");
    }
}
