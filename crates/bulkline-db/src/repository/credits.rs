//! Credit repository — balances and the transaction ledger.
//!
//! A balance change and its ledger row are written in one transaction, with the
//! balance row locked, so `balance_after` always matches the stored balance.

use bulkline_common::{
    ids,
    models::credit::{CreditAccount, CreditTransaction, TransactionKind},
};
use sqlx::PgPool;
use uuid::Uuid;

/// Result of applying a ledger entry.
#[derive(Debug)]
pub enum LedgerOutcome {
    Applied(CreditTransaction),
    /// A debit would have taken the balance below zero; nothing was written.
    Insufficient { available: i64 },
}

/// Create the balance row for a user if it does not exist yet.
pub async fn ensure_account(pool: &PgPool, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_credits (user_id, balance, updated_at) VALUES ($1, 0, NOW()) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Current balance, or zero for users without an account row.
pub async fn get_balance(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
    let row: Option<CreditAccount> =
        sqlx::query_as::<_, CreditAccount>("SELECT * FROM user_credits WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|a| a.balance).unwrap_or(0))
}

/// Apply a signed amount to a user's balance and record it in the ledger.
pub async fn apply_transaction(
    pool: &PgPool,
    user_id: Uuid,
    amount: i64,
    kind: TransactionKind,
    description: &str,
    reference: Option<&str>,
) -> Result<LedgerOutcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO user_credits (user_id, balance, updated_at) VALUES ($1, 0, NOW()) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(user_id)
    .execute(&mut *tx)
    .await?;

    let (balance,): (i64,) =
        sqlx::query_as("SELECT balance FROM user_credits WHERE user_id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_one(&mut *tx)
            .await?;

    let balance_after = balance + amount;
    if balance_after < 0 {
        tx.rollback().await?;
        return Ok(LedgerOutcome::Insufficient { available: balance });
    }

    sqlx::query("UPDATE user_credits SET balance = $2, updated_at = NOW() WHERE user_id = $1")
        .bind(user_id)
        .bind(balance_after)
        .execute(&mut *tx)
        .await?;

    let entry = sqlx::query_as::<_, CreditTransaction>(
        r#"
        INSERT INTO credit_transactions (id, user_id, amount, kind, description, reference,
                                         balance_after, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
        RETURNING *
        "#,
    )
    .bind(ids::generate_id())
    .bind(user_id)
    .bind(amount)
    .bind(kind)
    .bind(description)
    .bind(reference)
    .bind(balance_after)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(%user_id, amount, balance_after, "Credit ledger entry applied");
    Ok(LedgerOutcome::Applied(entry))
}

pub async fn list_transactions(
    pool: &PgPool,
    user_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<CreditTransaction>, sqlx::Error> {
    sqlx::query_as::<_, CreditTransaction>(
        r#"
        SELECT * FROM credit_transactions
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}

/// Total credits ever purchased on the platform.
pub async fn total_purchased(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (Option<i64>,) = sqlx::query_as(
        "SELECT SUM(amount)::BIGINT FROM credit_transactions WHERE kind = 'purchase'",
    )
    .fetch_one(pool)
    .await?;
    Ok(row.0.unwrap_or(0))
}
