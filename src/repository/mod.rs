//! Repository
//!
//! Owns all persistent state (users, orders, withdrawals) and the
//! in-memory grading queue. Handlers and the grading pipeline only ever
//! touch storage through this interface; database transactions are the
//! sole synchronization mechanism between them.

use chrono::{DateTime, SubsecRound, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::warn;

use crate::models::{Balance, GradingTask, OrderRecord, OrderStatus, WithdrawalRecord};

/// Bound on the grading queue. Overflow falls back to an asynchronous
/// send so `load_order` never blocks a request on queue capacity.
pub const TASK_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("login already in use")]
    LoginTaken,
    #[error("invalid credentials")]
    BadCredentials,
    #[error("order already uploaded by this user")]
    OrderOwnedBySelf,
    #[error("order already uploaded by another user")]
    OrderOwnedByOther,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub struct Repository {
    pool: PgPool,
    task_tx: mpsc::Sender<GradingTask>,
}

impl Repository {
    /// Wraps a pool and opens the grading queue. The receiver half goes to
    /// the worker pool.
    pub fn new(pool: PgPool) -> (Self, mpsc::Receiver<GradingTask>) {
        let (task_tx, task_rx) = mpsc::channel(TASK_QUEUE_CAPACITY);
        (Self { pool, task_tx }, task_rx)
    }

    pub async fn create_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<i64, RepositoryError> {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (login, password_hash) VALUES ($1, $2) RETURNING user_id",
        )
        .bind(login)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                RepositoryError::LoginTaken
            } else {
                RepositoryError::Database(e)
            }
        })
    }

    pub async fn auth_user(
        &self,
        login: &str,
        password_hash: &str,
    ) -> Result<i64, RepositoryError> {
        let user_id: Option<i64> = sqlx::query_scalar(
            "SELECT user_id FROM users WHERE login = $1 AND password_hash = $2",
        )
        .bind(login)
        .bind(password_hash)
        .fetch_optional(&self.pool)
        .await?;

        user_id.ok_or(RepositoryError::BadCredentials)
    }

    /// Registers a new order for grading. The unique constraint on
    /// `order_id` arbitrates concurrent double-submission; when the insert
    /// loses, the surviving row's owner decides which sentinel comes back.
    pub async fn load_order(&self, order_id: &str, user_id: i64) -> Result<(), RepositoryError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO orders (order_id, user_id, status, uploaded_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (order_id) DO NOTHING
            "#,
        )
        .bind(order_id)
        .bind(user_id)
        .bind(OrderStatus::New.to_string())
        .bind(Utc::now().trunc_subsecs(0))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if inserted == 0 {
            let owner: Option<i64> =
                sqlx::query_scalar("SELECT user_id FROM orders WHERE order_id = $1")
                    .bind(order_id)
                    .fetch_optional(&self.pool)
                    .await?;
            return match owner {
                Some(existing) if existing == user_id => Err(RepositoryError::OrderOwnedBySelf),
                Some(_) => Err(RepositoryError::OrderOwnedByOther),
                // Order rows are never deleted, so a lost insert always
                // leaves an owner to read back.
                None => Err(RepositoryError::Corrupt(format!(
                    "order {} conflicted but has no row",
                    order_id
                ))),
            };
        }

        self.enqueue(GradingTask {
            user_id,
            order_id: order_id.to_string(),
        });
        Ok(())
    }

    /// Queues a grading task without blocking the caller. A full channel
    /// falls back to a spawned send; a closed channel means shutdown.
    pub fn enqueue(&self, task: GradingTask) {
        match self.task_tx.try_send(task) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(task)) => {
                let tx = self.task_tx.clone();
                tokio::spawn(async move {
                    if tx.send(task).await.is_err() {
                        warn!("grading queue closed, dropping task");
                    }
                });
            }
            Err(mpsc::error::TrySendError::Closed(task)) => {
                warn!(order_id = %task.order_id, "grading queue closed, dropping task");
            }
        }
    }

    pub async fn orders_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<OrderRecord>, RepositoryError> {
        let rows: Vec<(String, String, Decimal, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT order_id, status, accrual, uploaded_at
            FROM orders WHERE user_id = $1
            ORDER BY uploaded_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(order_record_from_row).collect()
    }

    pub async fn balance(&self, user_id: i64) -> Result<Balance, RepositoryError> {
        let (current, withdrawn): (Decimal, Decimal) =
            sqlx::query_as("SELECT current, withdrawn FROM users WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(Balance { current, withdrawn })
    }

    /// Debits the balance and records the withdrawal in one transaction.
    /// The debit is read back inside the transaction; a negative result
    /// rolls everything back, so `current >= 0` holds at every commit.
    pub async fn withdraw(
        &self,
        order_id: &str,
        user_id: i64,
        sum: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current: Decimal = sqlx::query_scalar(
            r#"
            UPDATE users SET current = current - $1, withdrawn = withdrawn + $1
            WHERE user_id = $2
            RETURNING current
            "#,
        )
        .bind(sum)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        if current < Decimal::ZERO {
            tx.rollback().await?;
            return Err(RepositoryError::InsufficientFunds);
        }

        sqlx::query(
            "INSERT INTO withdrawals (order_id, user_id, sum, processed_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(order_id)
        .bind(user_id)
        .bind(sum)
        .bind(Utc::now().trunc_subsecs(0))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn withdrawals_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<WithdrawalRecord>, RepositoryError> {
        let rows: Vec<(String, Decimal, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT order_id, sum, processed_at
            FROM withdrawals WHERE user_id = $1
            ORDER BY processed_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(order, sum, processed_at)| WithdrawalRecord {
                order,
                sum,
                processed_at,
            })
            .collect())
    }

    /// NEW -> PROCESSING (or a PROCESSING re-poll). Terminal rows are left
    /// untouched.
    pub async fn mark_order_processing(&self, order_id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE orders SET status = $1
            WHERE order_id = $2 AND status NOT IN ('PROCESSED', 'INVALID')
            "#,
        )
        .bind(OrderStatus::Processing.to_string())
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal INVALID transition; no points move.
    pub async fn mark_order_invalid(&self, order_id: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            UPDATE orders SET status = $1
            WHERE order_id = $2 AND status NOT IN ('PROCESSED', 'INVALID')
            "#,
        )
        .bind(OrderStatus::Invalid.to_string())
        .bind(order_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Terminal PROCESSED transition plus the balance credit, atomically.
    /// The credit only happens when the order row actually transitioned,
    /// so a redelivered PROCESSED grade cannot credit twice.
    pub async fn apply_accrual(
        &self,
        order_id: &str,
        user_id: i64,
        accrual: Decimal,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE orders SET status = $1, accrual = $2
            WHERE order_id = $3 AND status NOT IN ('PROCESSED', 'INVALID')
            "#,
        )
        .bind(OrderStatus::Processed.to_string())
        .bind(accrual)
        .bind(order_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if updated == 1 {
            sqlx::query("UPDATE users SET current = current + $1 WHERE user_id = $2")
                .bind(accrual)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Re-enqueues every non-terminal order. The queue is in-memory, so a
    /// restart would otherwise strand rows in NEW/PROCESSING forever.
    pub async fn recover_pending_orders(&self) -> Result<usize, RepositoryError> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT order_id, user_id FROM orders
            WHERE status NOT IN ('PROCESSED', 'INVALID')
            ORDER BY uploaded_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let count = rows.len();
        for (order_id, user_id) in rows {
            self.enqueue(GradingTask { user_id, order_id });
        }
        Ok(count)
    }

    /// Releases the pool. Workers exit once the task channel closes, which
    /// happens when the owning state (and its sender) is dropped.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn order_record_from_row(
    (number, status, accrual, uploaded_at): (String, String, Decimal, DateTime<Utc>),
) -> Result<OrderRecord, RepositoryError> {
    let status: OrderStatus = status.parse().map_err(RepositoryError::Corrupt)?;
    Ok(OrderRecord {
        number,
        status,
        accrual: (accrual > Decimal::ZERO).then_some(accrual),
        uploaded_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_row_maps_zero_accrual_to_none() {
        let row = (
            "12345678903".to_string(),
            "NEW".to_string(),
            dec!(0.00),
            Utc::now(),
        );
        let record = order_record_from_row(row).unwrap();
        assert_eq!(record.status, OrderStatus::New);
        assert_eq!(record.accrual, None);
    }

    #[test]
    fn order_row_keeps_positive_accrual() {
        let row = (
            "12345678903".to_string(),
            "PROCESSED".to_string(),
            dec!(42.50),
            Utc::now(),
        );
        let record = order_record_from_row(row).unwrap();
        assert_eq!(record.status, OrderStatus::Processed);
        assert_eq!(record.accrual, Some(dec!(42.50)));
    }

    #[test]
    fn order_row_with_unknown_status_is_corrupt() {
        let row = (
            "12345678903".to_string(),
            "GRADED".to_string(),
            dec!(0),
            Utc::now(),
        );
        assert!(matches!(
            order_record_from_row(row),
            Err(RepositoryError::Corrupt(_))
        ));
    }
}
