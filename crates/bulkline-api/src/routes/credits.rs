//! Credit routes — balance, ledger, purchases.

use axum::{
    extract::{Extension, Query, State},
    middleware,
    routing::{get, post},
    Json, Router,
};
use bulkline_common::{
    error::{BulklineError, BulklineResult},
    models::credit::{CreditTransaction, LedgerQuery, PurchaseCreditsRequest, TransactionKind},
    validation::validate_request,
};
use bulkline_db::repository::credits::{self, LedgerOutcome};
use serde::Serialize;
use std::sync::Arc;

use crate::{middleware::AuthContext, routes, AppState};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/credits", get(get_balance))
        .route("/credits/transactions", get(list_transactions))
        .route("/credits/purchase", post(purchase))
        .route_layer(middleware::from_fn(crate::middleware::auth_middleware))
}

#[derive(Serialize)]
struct BalanceResponse {
    balance: i64,
}

/// GET /api/v1/credits
async fn get_balance(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
) -> BulklineResult<Json<BalanceResponse>> {
    let balance = credits::get_balance(&state.db.pool, auth.user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// GET /api/v1/credits/transactions
async fn list_transactions(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LedgerQuery>,
) -> BulklineResult<Json<Vec<CreditTransaction>>> {
    let (limit, offset) = routes::page(query.limit, query.offset);
    Ok(Json(
        credits::list_transactions(&state.db.pool, auth.user_id, limit, offset).await?,
    ))
}

/// Trimmed payment receipt; blank receipts are rejected.
fn receipt_reference(raw: &str) -> BulklineResult<&str> {
    let reference = raw.trim();
    if reference.is_empty() {
        return Err(BulklineError::validation("Payment reference is required"));
    }
    Ok(reference)
}

/// POST /api/v1/credits/purchase
///
/// Records a completed purchase. The caller is trusted to have confirmed the
/// payment; `reference` carries its receipt (e.g. an M-Pesa confirmation
/// code) and a receipt already credited is refused.
async fn purchase(
    Extension(auth): Extension<AuthContext>,
    State(state): State<Arc<AppState>>,
    Json(body): Json<PurchaseCreditsRequest>,
) -> BulklineResult<Json<CreditTransaction>> {
    validate_request(&body)?;

    let reference = receipt_reference(&body.reference)?;
    let outcome = credits::apply_transaction(
        &state.db.pool,
        auth.user_id,
        body.amount,
        TransactionKind::Purchase,
        &format!("Purchased {} credits", body.amount),
        Some(reference),
    )
    .await
    .map_err(|e| {
        let duplicate = matches!(&e, sqlx::Error::Database(db) if db.is_unique_violation());
        if duplicate {
            BulklineError::AlreadyExists {
                resource: format!("Purchase with reference '{reference}'"),
            }
        } else {
            BulklineError::from(e)
        }
    })?;

    let entry = match outcome {
        LedgerOutcome::Applied(entry) => entry,
        // Unreachable for a positive amount.
        LedgerOutcome::Insufficient { available } => {
            return Err(BulklineError::InsufficientCredits {
                required: body.amount,
                available,
            })
        }
    };

    routes::invalidate_tenant_cache(&state.perf, auth.user_id);
    tracing::info!(user_id = %auth.user_id, amount = body.amount, reference, balance = entry.balance_after, "Credits purchased");

    Ok(Json(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purchases_need_a_receipt() {
        assert_eq!(receipt_reference("  QKJ4ABC123 ").unwrap(), "QKJ4ABC123");
        assert!(receipt_reference("").is_err());
        assert!(receipt_reference("   ").is_err());
    }

    #[test]
    fn purchase_body_without_reference_is_rejected() {
        let missing = serde_json::from_str::<PurchaseCreditsRequest>(r#"{"amount":100}"#);
        assert!(missing.is_err());

        let blank: PurchaseCreditsRequest =
            serde_json::from_str(r#"{"amount":100,"reference":""}"#).unwrap();
        assert!(validate_request(&blank).is_err());
    }
}
