//! Simple REST API server demo for the royalty ledger.
//!
//! Run with: `cargo run --example server`
//!
//! ```bash
//! # Register an artist and a payout account
//! curl -X POST http://localhost:3000/artists \
//!   -H "Content-Type: application/json" \
//!   -d '{"id": 1, "brand": 1, "name": "Ysa"}'
//! curl -X POST http://localhost:3000/artists/1/payment-methods \
//!   -H "Content-Type: application/json" \
//!   -d '{"bank_code": "001", "bank_name": "First Bank", "account_reference": "ACC-1"}'
//!
//! # Book a streaming earning
//! curl -X POST http://localhost:3000/entries \
//!   -H "Content-Type: application/json" \
//!   -d '{"artist_id": 1, "kind": "earning", "source": "streaming", "platform": "Spotify", "amount": "100.00"}'
//!
//! # Request and settle a payout
//! curl -X POST http://localhost:3000/payments \
//!   -H "Content-Type: application/json" \
//!   -d '{"artist_id": 1, "method_id": 1, "amount": "40.00"}'
//! curl -X POST http://localhost:3000/payments/1/complete
//!
//! # Balance
//! curl http://localhost:3000/artists/1/balance
//!
//! # Audit cached balances
//! curl -X POST http://localhost:3000/reconciliation
//! ```

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use royalty_ledger::{
    Amount, Artist, ArtistId, BrandId, EntryId, EntryKind, Ledger, LedgerError, LogSink, NewEntry,
    NewPaymentMethod, Payment, PaymentId, PaymentMethodId, PaymentRequest, ReconciliationJob,
    ReleaseId, ValidationError,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

// === Request/Response DTOs ===

#[derive(Debug, Deserialize)]
pub struct ArtistRequest {
    pub id: u32,
    pub brand: u16,
    pub name: String,
}

/// Request body for booking a ledger entry.
///
/// ```json
/// {"artist_id": 1, "kind": "royalty", "amount": "25.00"}
/// ```
#[derive(Debug, Deserialize)]
pub struct EntryRequest {
    pub artist_id: u32,
    #[serde(flatten)]
    pub kind: EntryKind,
    pub amount: Decimal,
    pub release_id: Option<u32>,
    pub description: Option<String>,
    pub recorded_at: Option<DateTime<Utc>>,
    pub corrects: Option<u64>,
}

impl EntryRequest {
    fn into_entry(self) -> Result<NewEntry, AppError> {
        Ok(NewEntry {
            artist_id: ArtistId(self.artist_id),
            kind: self.kind,
            amount: parse_amount(self.amount)?,
            release_id: self.release_id.map(ReleaseId),
            description: self.description,
            recorded_at: self.recorded_at.unwrap_or_else(Utc::now),
            corrects: self.corrects.map(EntryId),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct PaymentBody {
    pub artist_id: u32,
    pub method_id: u32,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
pub struct FailBody {
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: u64,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: u64,
    pub artist: u32,
    pub amount: Decimal,
    pub status: String,
    pub failure_reason: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.0,
            artist: payment.artist_id.0,
            amount: payment.amount.to_decimal(),
            status: payment.status.to_string(),
            failure_reason: payment.failure_reason,
        }
    }
}

/// Response body for an artist's balance.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub artist: u32,
    pub earnings: Decimal,
    pub royalties: Decimal,
    pub expenses: Decimal,
    pub paid: Decimal,
    pub balance: Decimal,
    pub pending_payment: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    pub artists_checked: usize,
    pub consistent: usize,
    pub seeded: usize,
    pub divergences: usize,
    pub failures: usize,
}

/// Response body for errors.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// === Application State ===

/// Shared application state containing the ledger.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
}

// === Error Handling ===

/// Wrapper for converting `LedgerError` into HTTP responses.
pub enum AppError {
    Ledger(LedgerError),
    InvalidAmount(Decimal),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        AppError::Ledger(err)
    }
}

fn parse_amount(value: Decimal) -> Result<Amount, AppError> {
    Amount::from_decimal(value).ok_or(AppError::InvalidAmount(value))
}

fn classify(err: &LedgerError) -> (StatusCode, &'static str) {
    match err {
        LedgerError::Validation(validation) => match validation {
            ValidationError::NegativeAmount(_) => (StatusCode::BAD_REQUEST, "NEGATIVE_AMOUNT"),
            ValidationError::NonPositivePayment(_) => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT"),
            ValidationError::UnknownArtist(_) => (StatusCode::NOT_FOUND, "ARTIST_NOT_FOUND"),
            ValidationError::DuplicateArtist(_) => (StatusCode::CONFLICT, "DUPLICATE_ARTIST"),
            ValidationError::UnknownRelease(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_RELEASE"),
            ValidationError::DuplicateRelease(_) => (StatusCode::CONFLICT, "DUPLICATE_RELEASE"),
            ValidationError::ReleaseNotCredited { .. } => {
                (StatusCode::BAD_REQUEST, "RELEASE_NOT_CREDITED")
            }
            ValidationError::DuplicateCatalogNumber(_) => {
                (StatusCode::CONFLICT, "DUPLICATE_CATALOG_NUMBER")
            }
            ValidationError::UnknownPaymentMethod(_) => {
                (StatusCode::BAD_REQUEST, "UNKNOWN_PAYMENT_METHOD")
            }
            ValidationError::PaymentMethodNotOwned { .. } => {
                (StatusCode::FORBIDDEN, "PAYMENT_METHOD_NOT_OWNED")
            }
            ValidationError::UnknownCorrectedEntry(_) => {
                (StatusCode::BAD_REQUEST, "UNKNOWN_CORRECTED_ENTRY")
            }
            ValidationError::EmptyField(_) => (StatusCode::BAD_REQUEST, "EMPTY_FIELD"),
        },
        LedgerError::InsufficientFunds { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_FUNDS")
        }
        LedgerError::PaymentInProgress(_) => (StatusCode::CONFLICT, "PAYMENT_IN_PROGRESS"),
        LedgerError::PaymentNotFound(_) => (StatusCode::NOT_FOUND, "PAYMENT_NOT_FOUND"),
        LedgerError::PaymentAlreadyDispatched(_) => {
            (StatusCode::CONFLICT, "PAYMENT_ALREADY_DISPATCHED")
        }
        LedgerError::InvalidPaymentTransition { .. } => {
            (StatusCode::CONFLICT, "INVALID_PAYMENT_TRANSITION")
        }
        LedgerError::InvalidReleaseTransition { .. } => {
            (StatusCode::CONFLICT, "INVALID_RELEASE_TRANSITION")
        }
        LedgerError::BalanceOverflow(_) => (StatusCode::INTERNAL_SERVER_ERROR, "BALANCE_OVERFLOW"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, error) = match &self {
            AppError::Ledger(err) => {
                let (status, code) = classify(err);
                (status, code, err.to_string())
            }
            AppError::InvalidAmount(value) => (
                StatusCode::BAD_REQUEST,
                "INVALID_AMOUNT",
                format!("amount {value} has more than two decimal places or is out of range"),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

// === Handlers ===

/// POST /artists - Register an artist.
async fn create_artist(
    State(state): State<AppState>,
    Json(request): Json<ArtistRequest>,
) -> Result<StatusCode, AppError> {
    state.ledger.roster().register_artist(Artist {
        id: ArtistId(request.id),
        brand: BrandId(request.brand),
        name: request.name,
    })?;
    Ok(StatusCode::CREATED)
}

/// POST /artists/:id/payment-methods - Register a payout account.
async fn create_payment_method(
    State(state): State<AppState>,
    Path(id): Path<u32>,
    Json(request): Json<NewPaymentMethod>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let method = state
        .ledger
        .roster()
        .add_payment_method(ArtistId(id), request)?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            id: u64::from(method.id.0),
        }),
    ))
}

/// POST /entries - Book a ledger entry.
async fn create_entry(
    State(state): State<AppState>,
    Json(request): Json<EntryRequest>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let id = state.ledger.append(request.into_entry()?)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: id.0 })))
}

/// POST /payments - Open a pending payment.
async fn create_payment(
    State(state): State<AppState>,
    Json(request): Json<PaymentBody>,
) -> Result<(StatusCode, Json<CreatedResponse>), AppError> {
    let id = state.ledger.request_payment(PaymentRequest {
        artist_id: ArtistId(request.artist_id),
        method_id: PaymentMethodId(request.method_id),
        amount: parse_amount(request.amount)?,
    })?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id: id.0 })))
}

/// GET /payments/:id - Get a payment.
async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state
        .ledger
        .payment(PaymentId(id))
        .ok_or(LedgerError::PaymentNotFound(PaymentId(id)))?;
    Ok(Json(payment.into()))
}

/// POST /payments/:id/complete - Confirm a payout.
async fn complete_payment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state.ledger.complete_payment(PaymentId(id))?;
    Ok(Json(payment.into()))
}

/// POST /payments/:id/fail - Record a failed payout.
async fn fail_payment(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(body): Json<FailBody>,
) -> Result<Json<PaymentResponse>, AppError> {
    let payment = state.ledger.fail_payment(PaymentId(id), body.reason)?;
    Ok(Json(payment.into()))
}

/// GET /artists/:id/balance - Balance with per-class totals.
async fn get_balance(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> Result<Json<BalanceResponse>, AppError> {
    let artist_id = ArtistId(id);
    let totals = state.ledger.breakdown(artist_id, None)?;
    Ok(Json(BalanceResponse {
        artist: id,
        earnings: totals.earnings.to_decimal(),
        royalties: totals.royalties.to_decimal(),
        expenses: totals.expenses.to_decimal(),
        paid: totals.paid.to_decimal(),
        balance: totals.balance.to_decimal(),
        pending_payment: state.ledger.pending_payment(artist_id).map(|id| id.0),
    }))
}

/// POST /reconciliation - Run one reconciliation pass.
async fn run_reconciliation(
    State(state): State<AppState>,
) -> Result<Json<ReconciliationResponse>, (StatusCode, Json<ErrorResponse>)> {
    let ledger = state.ledger.clone();
    let report = tokio::task::spawn_blocking(move || ReconciliationJob::new(&ledger, &LogSink).run())
        .await
        .map_err(|err| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: err.to_string(),
                    code: "RECONCILIATION_ABORTED".to_string(),
                }),
            )
        })?;

    Ok(Json(ReconciliationResponse {
        artists_checked: report.artists_checked,
        consistent: report.consistent,
        seeded: report.seeded,
        divergences: report.divergences.len(),
        failures: report.failures.len(),
    }))
}

// === Router ===

fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/artists", post(create_artist))
        .route("/artists/{id}/payment-methods", post(create_payment_method))
        .route("/artists/{id}/balance", get(get_balance))
        .route("/entries", post(create_entry))
        .route("/payments", post(create_payment))
        .route("/payments/{id}", get(get_payment))
        .route("/payments/{id}/complete", post(complete_payment))
        .route("/payments/{id}/fail", post(fail_payment))
        .route("/reconciliation", post(run_reconciliation))
        .with_state(state)
}

// === Main ===

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let state = AppState {
        ledger: Arc::new(Ledger::new()),
    };

    let app = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:3000").await.unwrap();
    info!("royalty ledger API listening on http://127.0.0.1:3000");
    println!("Endpoints:");
    println!("  POST /artists                       - Register an artist");
    println!("  POST /artists/:id/payment-methods   - Register a payout account");
    println!("  GET  /artists/:id/balance           - Balance with totals");
    println!("  POST /entries                       - Book an entry");
    println!("  POST /payments                      - Request a payout");
    println!("  GET  /payments/:id                  - Get a payment");
    println!("  POST /payments/:id/complete         - Confirm a payout");
    println!("  POST /payments/:id/fail             - Record a failed payout");
    println!("  POST /reconciliation                - Audit cached balances");

    axum::serve(listener, app).await.unwrap();
}
