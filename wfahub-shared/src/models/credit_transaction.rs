/// Credit ledger
///
/// Append-only: one row per balance change with the signed amount and the
/// balance that resulted. Rows are written on the same connection (and in the
/// same transaction) as the balance update they describe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::UnknownVariant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    SignupBonus,
    ExecutionCharge,
    ExecutionRefund,
    AdminAdjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::SignupBonus => "signup_bonus",
            TransactionKind::ExecutionCharge => "execution_charge",
            TransactionKind::ExecutionRefund => "execution_refund",
            TransactionKind::AdminAdjustment => "admin_adjustment",
        }
    }
}

impl TryFrom<String> for TransactionKind {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "signup_bonus" => Ok(TransactionKind::SignupBonus),
            "execution_charge" => Ok(TransactionKind::ExecutionCharge),
            "execution_refund" => Ok(TransactionKind::ExecutionRefund),
            "admin_adjustment" => Ok(TransactionKind::AdminAdjustment),
            _ => Err(UnknownVariant::new("transaction kind", value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CreditTransaction {
    pub id: i64,
    pub user_id: Uuid,

    /// Negative for charges
    pub amount: i32,

    pub balance_after: i32,

    #[sqlx(try_from = "String")]
    pub kind: TransactionKind,

    pub execution_id: Option<Uuid>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Ledger row to append
#[derive(Debug, Clone)]
pub struct NewCreditTransaction {
    pub user_id: Uuid,
    pub amount: i32,
    pub balance_after: i32,
    pub kind: TransactionKind,
    pub execution_id: Option<Uuid>,
    pub description: Option<String>,
}

impl CreditTransaction {
    pub async fn record(
        conn: &mut PgConnection,
        entry: NewCreditTransaction,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, CreditTransaction>(
            r#"
            INSERT INTO credit_transactions
                (user_id, amount, balance_after, kind, execution_id, description)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, user_id, amount, balance_after, kind, execution_id, description, created_at
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.amount)
        .bind(entry.balance_after)
        .bind(entry.kind.as_str())
        .bind(entry.execution_id)
        .bind(entry.description)
        .fetch_one(conn)
        .await
    }

    /// A user's ledger, newest first
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, CreditTransaction>(
            r#"
            SELECT id, user_id, amount, balance_after, kind, execution_id, description, created_at
            FROM credit_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
    }

    pub async fn count_for_user(pool: &PgPool, user_id: Uuid) -> Result<i64, sqlx::Error> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM credit_transactions WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(pool)
                .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            TransactionKind::SignupBonus,
            TransactionKind::ExecutionCharge,
            TransactionKind::ExecutionRefund,
            TransactionKind::AdminAdjustment,
        ] {
            assert_eq!(TransactionKind::try_from(kind.as_str().to_string()).unwrap(), kind);
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
        assert!(TransactionKind::try_from("purchase".to_string()).is_err());
    }
}
