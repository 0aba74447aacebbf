/// Credit balance changes
///
/// Every change to `users.credits` goes through this module so that the
/// balance and the ledger (`credit_transactions`) move together in one
/// transaction. Executions are pre-paid: [`charge_for_execution`] deducts the
/// cost and opens a pending execution log atomically, and
/// [`refund_execution`] gives the credits back if the action then fails.
///
/// The deduction is a single guarded `UPDATE ... WHERE credits >= cost`, so
/// concurrent executions can never drive a balance below zero.
///
/// # Example
///
/// ```no_run
/// use wfahub_shared::credits::{charge_for_execution, refund_execution, CreditError};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, user_id: Uuid, template_id: Uuid) -> Result<(), CreditError> {
/// let inputs = serde_json::json!({"email": "client@example.com"});
///
/// match charge_for_execution(&pool, user_id, template_id, 3, &inputs).await {
///     Ok(charge) => {
///         // run the action; on failure:
///         refund_execution(&pool, user_id, charge.execution_id, 3, "SMTP unreachable").await?;
///     }
///     Err(CreditError::InsufficientCredits { required, available }) => {
///         println!("need {} credits, have {}", required, available);
///     }
///     Err(e) => return Err(e),
/// }
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::credit_transaction::{CreditTransaction, NewCreditTransaction, TransactionKind};
use crate::models::execution_log::ExecutionLog;
use crate::models::user::User;

#[derive(Debug, thiserror::Error)]
pub enum CreditError {
    #[error("Insufficient credits: {required} required, {available} available")]
    InsufficientCredits { required: i32, available: i32 },

    #[error("Invalid credit amount: {0}")]
    InvalidAmount(String),

    #[error("User not found")]
    UserNotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result of a successful deduction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Charge {
    /// The pending execution log opened with the charge
    pub execution_id: Uuid,
    pub balance_after: i32,
}

/// Admin balance edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "amount", rename_all = "lowercase")]
pub enum Adjustment {
    /// Replace the balance
    Set(i32),
    /// Add a signed delta; the result is clamped at zero
    Add(i32),
}

impl Adjustment {
    /// New balance starting from `current`
    pub fn apply(self, current: i32) -> Result<i32, CreditError> {
        match self {
            Adjustment::Set(value) if value < 0 => Err(CreditError::InvalidAmount(
                "Balance cannot be negative".to_string(),
            )),
            Adjustment::Set(value) => Ok(value),
            Adjustment::Add(delta) => Ok(current.saturating_add(delta).max(0)),
        }
    }
}

/// Deducts `cost` and opens a pending execution log
///
/// # Errors
///
/// `InsufficientCredits` when the balance is below `cost`; nothing is written
/// in that case.
pub async fn charge_for_execution(
    pool: &PgPool,
    user_id: Uuid,
    template_id: Uuid,
    cost: i32,
    input_data: &JsonValue,
) -> Result<Charge, CreditError> {
    if cost < 0 {
        return Err(CreditError::InvalidAmount(format!("negative cost {}", cost)));
    }

    let mut tx = pool.begin().await?;

    let deducted: Option<(i32,)> = sqlx::query_as(
        r#"
        UPDATE users
        SET credits = credits - $2, updated_at = NOW()
        WHERE id = $1 AND credits >= $2
        RETURNING credits
        "#,
    )
    .bind(user_id)
    .bind(cost)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((balance_after,)) = deducted else {
        let available = current_balance(&mut *tx, user_id).await?;
        tx.rollback().await?;
        return Err(match available {
            Some(available) => CreditError::InsufficientCredits {
                required: cost,
                available,
            },
            None => CreditError::UserNotFound,
        });
    };

    let execution_id =
        ExecutionLog::insert_pending(&mut *tx, user_id, template_id, cost, input_data).await?;

    if cost > 0 {
        CreditTransaction::record(
            &mut *tx,
            NewCreditTransaction {
                user_id,
                amount: -cost,
                balance_after,
                kind: TransactionKind::ExecutionCharge,
                execution_id: Some(execution_id),
                description: None,
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::debug!(
        user_id = %user_id,
        execution_id = %execution_id,
        cost,
        balance_after,
        "Charged execution"
    );

    Ok(Charge {
        execution_id,
        balance_after,
    })
}

/// Marks a pending execution failed and returns its charge
///
/// Returns the balance after the refund, or `None` if the execution had
/// already been finalized (nothing is refunded twice).
pub async fn refund_execution(
    pool: &PgPool,
    user_id: Uuid,
    execution_id: Uuid,
    amount: i32,
    error_message: &str,
) -> Result<Option<i32>, CreditError> {
    let amount = amount.max(0);
    let mut tx = pool.begin().await?;

    if !ExecutionLog::mark_failed(&mut *tx, execution_id, error_message, amount).await? {
        tx.rollback().await?;
        return Ok(None);
    }

    let (balance_after,): (i32,) = sqlx::query_as(
        "UPDATE users SET credits = credits + $2, updated_at = NOW() WHERE id = $1 RETURNING credits",
    )
    .bind(user_id)
    .bind(amount)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(CreditError::UserNotFound)?;

    if amount > 0 {
        CreditTransaction::record(
            &mut *tx,
            NewCreditTransaction {
                user_id,
                amount,
                balance_after,
                kind: TransactionKind::ExecutionRefund,
                execution_id: Some(execution_id),
                description: Some(truncate(error_message, 200)),
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        execution_id = %execution_id,
        refunded = amount,
        "Refunded failed execution"
    );

    Ok(Some(balance_after))
}

/// Applies an admin edit and writes an `admin_adjustment` ledger row
///
/// Returns the new balance. No ledger row is written when the balance
/// doesn't change.
pub async fn adjust_balance(
    pool: &PgPool,
    user_id: Uuid,
    adjustment: Adjustment,
    description: Option<String>,
) -> Result<i32, CreditError> {
    let mut tx = pool.begin().await?;

    let current: Option<(i32,)> =
        sqlx::query_as("SELECT credits FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
    let (current,) = current.ok_or(CreditError::UserNotFound)?;

    let balance_after = adjustment.apply(current)?;
    if balance_after == current {
        tx.rollback().await?;
        return Ok(current);
    }

    sqlx::query("UPDATE users SET credits = $2, updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .bind(balance_after)
        .execute(&mut *tx)
        .await?;

    CreditTransaction::record(
        &mut *tx,
        NewCreditTransaction {
            user_id,
            amount: balance_after - current,
            balance_after,
            kind: TransactionKind::AdminAdjustment,
            execution_id: None,
            description,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user_id,
        before = current,
        after = balance_after,
        "Adjusted credits"
    );

    Ok(balance_after)
}

/// Writes the opening-balance ledger row for a freshly created user
///
/// Call on the registration transaction right after [`User::create`].
pub async fn record_signup_bonus(conn: &mut PgConnection, user: &User) -> Result<(), sqlx::Error> {
    if user.credits <= 0 {
        return Ok(());
    }

    CreditTransaction::record(
        conn,
        NewCreditTransaction {
            user_id: user.id,
            amount: user.credits,
            balance_after: user.credits,
            kind: TransactionKind::SignupBonus,
            execution_id: None,
            description: None,
        },
    )
    .await?;

    Ok(())
}

async fn current_balance(conn: &mut PgConnection, user_id: Uuid) -> Result<Option<i32>, sqlx::Error> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT credits FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;

    Ok(row.map(|(credits,)| credits))
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adjustment_set() {
        assert_eq!(Adjustment::Set(50).apply(10).unwrap(), 50);
        assert_eq!(Adjustment::Set(0).apply(10).unwrap(), 0);
        assert!(matches!(
            Adjustment::Set(-1).apply(10),
            Err(CreditError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_adjustment_add_clamps_at_zero() {
        assert_eq!(Adjustment::Add(5).apply(10).unwrap(), 15);
        assert_eq!(Adjustment::Add(-4).apply(10).unwrap(), 6);
        assert_eq!(Adjustment::Add(-40).apply(10).unwrap(), 0);
        assert_eq!(Adjustment::Add(i32::MAX).apply(10).unwrap(), i32::MAX);
    }

    #[test]
    fn test_adjustment_serde() {
        let adj: Adjustment = serde_json::from_str(r#"{"mode": "add", "amount": -3}"#).unwrap();
        assert_eq!(adj, Adjustment::Add(-3));

        let adj: Adjustment = serde_json::from_str(r#"{"mode": "set", "amount": 100}"#).unwrap();
        assert_eq!(adj, Adjustment::Set(100));
    }

    #[test]
    fn test_insufficient_message() {
        let err = CreditError::InsufficientCredits {
            required: 5,
            available: 2,
        };
        assert_eq!(err.to_string(), "Insufficient credits: 5 required, 2 available");
    }

    #[test]
    fn test_truncate_is_char_safe() {
        assert_eq!(truncate("ãããã", 2), "ãã");
        assert_eq!(truncate("ok", 10), "ok");
    }
}
