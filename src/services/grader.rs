//! Grading Pipeline
//!
//! A fixed pool of workers drains the repository's task queue, polls the
//! accrual service for each order, and applies the resulting transition.
//! Each worker carries its own rate-limit backoff: a 429 pauses that
//! worker only, and the in-flight task is re-inserted at the queue tail
//! once the pause ends so no order is lost.
//!
//! Faults here are logged with order and user context and never surface
//! to API clients; order rows stay non-terminal and get retried.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::models::GradingTask;
use crate::repository::Repository;
use crate::services::accrual::{AccrualClient, AccrualReply, AccrualStatus};

#[derive(Debug, Clone)]
pub struct GraderConfig {
    pub workers: usize,
    pub backoff: Duration,
}

/// What one accrual reply means for the task, as a pure decision so the
/// whole table is testable without I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
enum GradeAction {
    /// Remote side not done yet (or transient failure): try again later.
    Requeue,
    /// Order entered grading remotely: record it, then try again later.
    MarkProcessing,
    /// Terminal rejection: record it, drop the task.
    MarkInvalid,
    /// Terminal success: credit the points, drop the task.
    Credit(Decimal),
    /// Rate limited: pause this worker, keep the task.
    Backoff,
}

fn dispatch(reply: &AccrualReply) -> GradeAction {
    match reply.status_code.as_u16() {
        200 => match &reply.grade {
            Some(grade) => match grade.status {
                AccrualStatus::Registered => GradeAction::Requeue,
                AccrualStatus::Processing => GradeAction::MarkProcessing,
                AccrualStatus::Invalid => GradeAction::MarkInvalid,
                AccrualStatus::Processed => {
                    GradeAction::Credit(grade.accrual.unwrap_or(Decimal::ZERO))
                }
            },
            None => GradeAction::Requeue,
        },
        429 => GradeAction::Backoff,
        // 5xx and anything unexpected: transient.
        _ => GradeAction::Requeue,
    }
}

/// Spawns the worker pool. Workers run for process lifetime and exit when
/// the task channel closes.
pub fn spawn_workers(
    config: GraderConfig,
    repo: Arc<Repository>,
    client: Arc<AccrualClient>,
    task_rx: mpsc::Receiver<GradingTask>,
) {
    let workers = config.workers.max(1);
    let task_rx = Arc::new(Mutex::new(task_rx));

    for worker_id in 0..workers {
        let repo = repo.clone();
        let client = client.clone();
        let task_rx = task_rx.clone();
        let backoff = config.backoff;
        tokio::spawn(async move {
            worker_loop(worker_id, repo, client, task_rx, backoff).await;
        });
    }

    info!("grading pipeline started with {} workers", workers);
}

async fn worker_loop(
    worker_id: usize,
    repo: Arc<Repository>,
    client: Arc<AccrualClient>,
    task_rx: Arc<Mutex<mpsc::Receiver<GradingTask>>>,
    backoff: Duration,
) {
    loop {
        // Lock only around the receive so siblings can consume while this
        // worker talks to the accrual service.
        let task = { task_rx.lock().await.recv().await };
        let Some(task) = task else {
            debug!("worker {} exiting, task queue closed", worker_id);
            return;
        };

        if grade_one(&repo, &client, &task).await == Flow::Backoff {
            warn!(
                worker = worker_id,
                order_id = %task.order_id,
                "rate limited by accrual service, backing off {:?}",
                backoff
            );
            tokio::time::sleep(backoff).await;
            // Tail re-insert keeps the pipeline fair across orders.
            repo.enqueue(task);
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Backoff,
}

async fn grade_one(repo: &Repository, client: &AccrualClient, task: &GradingTask) -> Flow {
    let reply = match client.order_grade(&task.order_id).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(
                order_id = %task.order_id,
                user_id = task.user_id,
                "accrual request failed, requeueing: {}",
                e
            );
            repo.enqueue(task.clone());
            return Flow::Continue;
        }
    };

    match dispatch(&reply) {
        GradeAction::Requeue => repo.enqueue(task.clone()),
        GradeAction::MarkProcessing => {
            if let Err(e) = repo.mark_order_processing(&task.order_id).await {
                error!(
                    order_id = %task.order_id,
                    user_id = task.user_id,
                    "failed to mark order processing: {}",
                    e
                );
            }
            repo.enqueue(task.clone());
        }
        GradeAction::MarkInvalid => {
            if let Err(e) = repo.mark_order_invalid(&task.order_id).await {
                error!(
                    order_id = %task.order_id,
                    user_id = task.user_id,
                    "failed to mark order invalid, requeueing: {}",
                    e
                );
                repo.enqueue(task.clone());
            }
        }
        GradeAction::Credit(accrual) => {
            if let Err(e) = repo.apply_accrual(&task.order_id, task.user_id, accrual).await {
                error!(
                    order_id = %task.order_id,
                    user_id = task.user_id,
                    "failed to apply accrual, requeueing: {}",
                    e
                );
                repo.enqueue(task.clone());
            }
        }
        GradeAction::Backoff => return Flow::Backoff,
    }

    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::accrual::OrderGrade;
    use reqwest::StatusCode;
    use rust_decimal_macros::dec;

    fn reply(code: u16, grade: Option<OrderGrade>) -> AccrualReply {
        AccrualReply {
            status_code: StatusCode::from_u16(code).unwrap(),
            grade,
        }
    }

    fn graded(status: AccrualStatus, accrual: Option<Decimal>) -> Option<OrderGrade> {
        Some(OrderGrade {
            order: "12345678903".to_string(),
            status,
            accrual,
        })
    }

    #[test]
    fn registered_requeues_without_db_writes() {
        let action = dispatch(&reply(200, graded(AccrualStatus::Registered, None)));
        assert_eq!(action, GradeAction::Requeue);
    }

    #[test]
    fn processing_marks_and_requeues() {
        let action = dispatch(&reply(200, graded(AccrualStatus::Processing, None)));
        assert_eq!(action, GradeAction::MarkProcessing);
    }

    #[test]
    fn invalid_is_terminal() {
        let action = dispatch(&reply(200, graded(AccrualStatus::Invalid, None)));
        assert_eq!(action, GradeAction::MarkInvalid);
    }

    #[test]
    fn processed_credits_the_reported_accrual() {
        let action = dispatch(&reply(200, graded(AccrualStatus::Processed, Some(dec!(42.5)))));
        assert_eq!(action, GradeAction::Credit(dec!(42.5)));
    }

    #[test]
    fn processed_without_accrual_credits_zero() {
        let action = dispatch(&reply(200, graded(AccrualStatus::Processed, None)));
        assert_eq!(action, GradeAction::Credit(Decimal::ZERO));
    }

    #[test]
    fn rate_limit_backs_off() {
        assert_eq!(dispatch(&reply(429, None)), GradeAction::Backoff);
    }

    #[test]
    fn server_errors_requeue() {
        assert_eq!(dispatch(&reply(500, None)), GradeAction::Requeue);
        assert_eq!(dispatch(&reply(502, None)), GradeAction::Requeue);
        assert_eq!(dispatch(&reply(503, None)), GradeAction::Requeue);
    }

    #[test]
    fn unexpected_statuses_are_treated_as_transient() {
        assert_eq!(dispatch(&reply(204, None)), GradeAction::Requeue);
        assert_eq!(dispatch(&reply(404, None)), GradeAction::Requeue);
        assert_eq!(dispatch(&reply(200, None)), GradeAction::Requeue);
    }
}
