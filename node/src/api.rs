//! # REST + WebSocket API
//!
//! Builds the axum router that exposes the devnet node's HTTP interface.
//! All endpoints share application state through axum's `State` extractor.
//!
//! ## Endpoints
//!
//! | Method | Path               | Description                              |
//! |--------|--------------------|------------------------------------------|
//! | GET    | `/health`          | Liveness probe                           |
//! | GET    | `/status`          | Node and vault summary                   |
//! | GET    | `/deposits/:id`    | Deposit record and its status            |
//! | GET    | `/events`          | Vault event log (`user`, `depositId`)    |
//! | POST   | `/rpc`             | JSON-RPC 2.0 gateway                     |
//! | GET    | `/ws`              | WebSocket for live blocks/vault events   |
//!
//! ## JSON-RPC methods
//!
//! Parameters are passed by name. Amounts and IDs are `U256` and may be
//! given as decimal or `0x` hex strings.
//!
//! | Method                | Params                                              |
//! |-----------------------|-----------------------------------------------------|
//! | `vault_deposit`       | `caller, assetA, amountA, assetB, amountB, value?`  |
//! | `vault_withdraw`      | `caller, depositId`                                 |
//! | `vault_getDeposit`    | `depositId`                                         |
//! | `vault_nextDepositId` | none                                                |
//! | `token_approve`       | `token, owner, spender, amount`                     |
//! | `token_balanceOf`     | `token, account`                                    |
//! | `chain_nativeBalance` | `account`                                           |
//! | `chain_blockNumber`   | none                                                |

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use twinvault_contracts::{DepositRecord, DepositStatus, EventFilter, VaultError};
use twinvault_protocol::{Address, ChainError, U256};

use crate::devnet::Devnet;

// ---------------------------------------------------------------------------
// Application State
// ---------------------------------------------------------------------------

/// Shared application state available to all request handlers.
///
/// Cheap to clone: everything heavy sits behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// The node's reported version string.
    pub version: String,
    /// Network name derived from the chain ID.
    pub network: String,
    /// The devnet runtime.
    pub devnet: Arc<Devnet>,
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
        .route("/deposits/:id", get(deposit_handler))
        .route("/events", get(events_handler))
        .route("/rpc", post(rpc_handler))
        .route("/ws", get(ws_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// JSON-RPC Types
// ---------------------------------------------------------------------------

/// JSON-RPC error code for a vault call that reverted.
pub const VAULT_ERROR_CODE: i32 = -32010;

/// JSON-RPC error code for a host-level failure (e.g. no token contract).
pub const CHAIN_ERROR_CODE: i32 = -32011;

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version. Must be "2.0".
    pub jsonrpc: String,
    /// The method to invoke.
    pub method: String,
    /// Named method parameters.
    pub params: Option<Value>,
    /// Request identifier. Echoed back in the response.
    pub id: Value,
}

/// A JSON-RPC 2.0 response envelope.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version. Always "2.0".
    pub jsonrpc: String,
    /// The result on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// The error on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    /// Request identifier, echoed from the request.
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Numeric error code.
    pub code: i32,
    /// Short human-readable error description.
    pub message: String,
    /// Optional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            code: -32600,
            message: message.into(),
            data: None,
        }
    }

    fn method_not_found(method: &str) -> Self {
        Self {
            code: -32601,
            message: format!("Method not found: {}", method),
            data: None,
        }
    }

    fn invalid_params(message: impl std::fmt::Display) -> Self {
        Self {
            code: -32602,
            message: format!("Invalid params: {}", message),
            data: None,
        }
    }

    fn internal(message: impl std::fmt::Display) -> Self {
        Self {
            code: -32603,
            message: format!("Internal error: {}", message),
            data: None,
        }
    }
}

impl From<VaultError> for JsonRpcError {
    fn from(e: VaultError) -> Self {
        Self {
            code: VAULT_ERROR_CODE,
            message: e.to_string(),
            data: Some(json!({ "kind": e.code() })),
        }
    }
}

impl From<ChainError> for JsonRpcError {
    fn from(e: ChainError) -> Self {
        Self {
            code: CHAIN_ERROR_CODE,
            message: e.to_string(),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// RPC Params
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DepositParams {
    caller: Address,
    asset_a: Address,
    amount_a: U256,
    asset_b: Address,
    amount_b: U256,
    #[serde(default)]
    value: U256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct WithdrawParams {
    caller: Address,
    deposit_id: U256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct DepositIdParams {
    deposit_id: U256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ApproveParams {
    token: Address,
    owner: Address,
    spender: Address,
    amount: U256,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct BalanceParams {
    token: Address,
    account: Address,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AccountParams {
    account: Address,
}

/// Decodes named params, treating a missing `params` as `{}`.
fn params<T: DeserializeOwned>(raw: Option<Value>) -> Result<T, JsonRpcError> {
    serde_json::from_value(raw.unwrap_or_else(|| json!({}))).map_err(JsonRpcError::invalid_params)
}

/// The zero address is the native-asset sentinel, never an account.
fn require_account(caller: Address) -> Result<Address, JsonRpcError> {
    if caller.is_zero() {
        return Err(JsonRpcError::invalid_params("caller must be a non-zero address"));
    }
    Ok(caller)
}

fn to_value<T: Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(JsonRpcError::internal)
}

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// Response payload for `GET /status`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Node software version.
    pub version: String,
    /// Network name.
    pub network: String,
    /// Chain ID.
    pub chain_id: u64,
    /// Current block number.
    pub block_number: u64,
    /// The vault's account.
    pub vault: Address,
    /// The vault's public counter.
    pub next_deposit_id: U256,
    /// Vault events emitted so far.
    pub event_count: usize,
    /// ISO-8601 timestamp of the response.
    pub timestamp: String,
}

/// A deposit record together with its lifecycle status.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositView {
    /// The deposit ID.
    pub deposit_id: U256,
    /// Lifecycle status.
    pub status: DepositStatus,
    /// The stored record (zero-filled when nonexistent).
    #[serde(flatten)]
    pub record: DepositRecord,
}

impl DepositView {
    fn load(devnet: &Devnet, deposit_id: U256) -> Self {
        let (record, status) = devnet.get_deposit(deposit_id);
        Self {
            deposit_id,
            status,
            record,
        }
    }
}

/// Generic error body returned by REST endpoints on failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `GET /health`: returns 200 if the node is alive.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

/// `GET /status`: node and vault summary.
async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let devnet = &state.devnet;
    Json(StatusResponse {
        version: state.version.clone(),
        network: state.network.clone(),
        chain_id: devnet.chain_id(),
        block_number: devnet.block_number(),
        vault: devnet.vault_address(),
        next_deposit_id: devnet.next_deposit_id(),
        event_count: devnet.event_count(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

/// `GET /deposits/:id`: the record for a deposit ID.
///
/// Unknown IDs return 404 with the zero-filled record, mirroring what
/// `vault_getDeposit` returns.
async fn deposit_handler(
    Path(id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let deposit_id = match U256::from_str(&id) {
        Ok(id) => id,
        Err(e) => {
            let err = ErrorResponse {
                error: format!("invalid deposit id {:?}: {}", id, e),
            };
            return (StatusCode::BAD_REQUEST, Json(json!(err))).into_response();
        }
    };

    let view = DepositView::load(&state.devnet, deposit_id);
    let status = if view.status == DepositStatus::Nonexistent {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::OK
    };
    (status, Json(json!(view))).into_response()
}

/// `GET /events`: the vault event log, optionally filtered by `user`
/// and/or `depositId`.
async fn events_handler(
    Query(filter): Query<EventFilter>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    Json(state.devnet.events(&filter))
}

/// `POST /rpc`: JSON-RPC 2.0 gateway.
async fn rpc_handler(
    State(state): State<AppState>,
    Json(req): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let outcome = if req.jsonrpc != "2.0" {
        Err(JsonRpcError::invalid_request(
            "Invalid Request: jsonrpc must be \"2.0\"",
        ))
    } else {
        dispatch(&state, &req.method, req.params)
    };

    let (result, error) = match outcome {
        Ok(value) => (Some(value), None),
        Err(e) => (None, Some(e)),
    };

    Json(JsonRpcResponse {
        jsonrpc: "2.0".into(),
        result,
        error,
        id: req.id,
    })
}

/// Routes one JSON-RPC method call.
fn dispatch(state: &AppState, method: &str, raw: Option<Value>) -> Result<Value, JsonRpcError> {
    let devnet = &state.devnet;
    match method {
        "vault_deposit" => {
            let p: DepositParams = params(raw)?;
            let id = devnet.deposit(
                require_account(p.caller)?,
                p.value,
                p.asset_a,
                p.amount_a,
                p.asset_b,
                p.amount_b,
            )?;
            Ok(json!({ "depositId": id }))
        }
        "vault_withdraw" => {
            let p: WithdrawParams = params(raw)?;
            devnet.withdraw(require_account(p.caller)?, p.deposit_id)?;
            Ok(json!({ "depositId": p.deposit_id, "withdrawn": true }))
        }
        "vault_getDeposit" => {
            let p: DepositIdParams = params(raw)?;
            to_value(DepositView::load(devnet, p.deposit_id))
        }
        "vault_nextDepositId" => to_value(devnet.next_deposit_id()),
        "token_approve" => {
            let p: ApproveParams = params(raw)?;
            let ok = devnet.approve(p.token, require_account(p.owner)?, p.spender, p.amount)?;
            Ok(json!(ok))
        }
        "token_balanceOf" => {
            let p: BalanceParams = params(raw)?;
            to_value(devnet.token_balance(p.token, p.account)?)
        }
        "chain_nativeBalance" => {
            let p: AccountParams = params(raw)?;
            to_value(devnet.native_balance(p.account))
        }
        "chain_blockNumber" => Ok(json!(devnet.block_number())),
        _ => Err(JsonRpcError::method_not_found(method)),
    }
}

/// `GET /ws`: WebSocket upgrade for live event streaming.
///
/// Clients receive JSON-encoded [`NodeEvent`](crate::devnet::NodeEvent)
/// messages. Client messages are ignored.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_ws_connection(socket, state))
}

/// Drives a single WebSocket connection, forwarding broadcast events
/// until the client disconnects or the channel is closed.
async fn handle_ws_connection(socket: WebSocket, state: AppState) {
    let mut rx = state.devnet.subscribe();
    let (mut sink, mut stream) = socket.split();

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
                        if sink.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("ws subscriber lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }
}
