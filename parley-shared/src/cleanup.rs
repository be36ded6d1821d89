/// Best-effort cascading cleanup for user deletion
///
/// Deleting a user sweeps every dependent resource family the user owns:
/// messages, conversations, sessions, transactions, balances, presets,
/// plugin credentials, shared links, files, and tool-call records.
///
/// The sweep is a saga of independent steps with no shared transaction:
/// every step is fired concurrently, each failure is caught and logged in
/// isolation, and the user row is removed only after the whole batch has
/// settled — fire all, await all, then delete. A step that fails leaves
/// orphaned rows rather than blocking the deletion; that is the accepted
/// tradeoff, and nothing retries automatically.

use futures::future::join_all;
use sqlx::PgPool;
use std::future::Future;
use uuid::Uuid;

use crate::models::user::User;

/// Dependent resource families swept during user deletion
///
/// Each entry is a table with a `user_id` column. The list is the single
/// source of truth for the cascade; adding a resource family means adding
/// its table here.
pub const DEPENDENT_TABLES: [&str; 10] = [
    "messages",
    "conversations",
    "sessions",
    "transactions",
    "balances",
    "presets",
    "plugin_credentials",
    "shared_links",
    "files",
    "tool_calls",
];

/// Result of one cleanup step
#[derive(Debug, Clone)]
pub struct CleanupOutcome {
    /// Resource family this step swept
    pub resource: &'static str,

    /// Rows removed, or the error that was swallowed
    pub result: Result<u64, String>,
}

/// Settled results of a whole cleanup batch
#[derive(Debug, Clone)]
pub struct CleanupReport {
    /// Per-step outcomes, in firing order
    pub outcomes: Vec<CleanupOutcome>,
}

impl CleanupReport {
    /// Number of steps that failed
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }

    /// Number of steps that succeeded
    pub fn succeeded(&self) -> usize {
        self.outcomes.len() - self.failed()
    }

    /// Total rows removed by the successful steps
    pub fn rows_removed(&self) -> u64 {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .sum()
    }
}

/// Awaits a batch of cleanup steps and collects their outcomes
///
/// The steps run concurrently and every one of them runs to completion;
/// no outcome aborts the batch.
pub async fn settle_all<F>(steps: Vec<F>) -> CleanupReport
where
    F: Future<Output = CleanupOutcome>,
{
    CleanupReport {
        outcomes: join_all(steps).await,
    }
}

/// Deletes one resource family's rows for a user
async fn delete_owned_rows(
    pool: &PgPool,
    table: &'static str,
    user_id: Uuid,
) -> Result<u64, sqlx::Error> {
    // Table names come from the static DEPENDENT_TABLES list only.
    let sql = format!("DELETE FROM {} WHERE user_id = $1", table);
    let result = sqlx::query(&sql).bind(user_id).execute(pool).await?;
    Ok(result.rows_affected())
}

/// Sweeps every dependent resource family a user owns
///
/// Each step's failure is caught, logged, and recorded in the report; it
/// never escalates or prevents the other steps from running.
pub async fn purge_user_data(pool: &PgPool, user_id: Uuid) -> CleanupReport {
    let steps: Vec<_> = DEPENDENT_TABLES
        .iter()
        .map(|&table| {
            let pool = pool.clone();
            async move {
                match delete_owned_rows(&pool, table, user_id).await {
                    Ok(rows) => CleanupOutcome {
                        resource: table,
                        result: Ok(rows),
                    },
                    Err(e) => {
                        tracing::warn!(
                            resource = table,
                            user_id = %user_id,
                            error = %e,
                            "Cleanup step failed; continuing with remaining steps"
                        );
                        CleanupOutcome {
                            resource: table,
                            result: Err(e.to_string()),
                        }
                    }
                }
            }
        })
        .collect();

    let report = settle_all(steps).await;

    tracing::info!(
        user_id = %user_id,
        succeeded = report.succeeded(),
        failed = report.failed(),
        rows_removed = report.rows_removed(),
        "User resource cleanup settled"
    );

    report
}

/// Deletes a user once its cleanup batch has settled
///
/// The cascade gates the row removal: the user record is deleted only
/// after every cleanup step has run, whether or not any of them failed.
///
/// # Returns
///
/// True if the user row was removed
///
/// # Errors
///
/// Returns an error only if the final user-row delete itself fails;
/// cleanup failures are reported through logs, never through this result.
pub async fn delete_user_with_cleanup(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let report = purge_user_data(pool, user_id).await;

    if report.failed() > 0 {
        tracing::warn!(
            user_id = %user_id,
            failed = report.failed(),
            "Deleting user despite partial cleanup failure"
        );
    }

    User::delete(pool, user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn ok_step(resource: &'static str, rows: u64) -> BoxFuture<'static, CleanupOutcome> {
        async move {
            CleanupOutcome {
                resource,
                result: Ok(rows),
            }
        }
        .boxed()
    }

    fn failing_step(resource: &'static str) -> BoxFuture<'static, CleanupOutcome> {
        async move {
            CleanupOutcome {
                resource,
                result: Err("storage unreachable".to_string()),
            }
        }
        .boxed()
    }

    #[tokio::test]
    async fn test_settle_all_runs_every_step_despite_failures() {
        let ran = Arc::new(AtomicUsize::new(0));

        let mut steps: Vec<BoxFuture<'static, CleanupOutcome>> = Vec::new();
        for (i, resource) in ["files", "messages", "presets"].into_iter().enumerate() {
            let ran = Arc::clone(&ran);
            steps.push(
                async move {
                    ran.fetch_add(1, Ordering::SeqCst);
                    if i == 1 {
                        CleanupOutcome {
                            resource,
                            result: Err("boom".to_string()),
                        }
                    } else {
                        CleanupOutcome {
                            resource,
                            result: Ok(1),
                        }
                    }
                }
                .boxed(),
            );
        }

        let report = settle_all(steps).await;

        assert_eq!(ran.load(Ordering::SeqCst), 3);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.succeeded(), 2);
    }

    #[tokio::test]
    async fn test_report_counts_and_rows() {
        let report = settle_all(vec![
            ok_step("messages", 12),
            failing_step("files"),
            ok_step("sessions", 3),
            failing_step("balances"),
        ])
        .await;

        assert_eq!(report.failed(), 2);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.rows_removed(), 15);
    }

    #[tokio::test]
    async fn test_outcomes_preserve_firing_order() {
        let report = settle_all(vec![
            ok_step("messages", 0),
            failing_step("files"),
            ok_step("tool_calls", 0),
        ])
        .await;

        let order: Vec<&str> = report.outcomes.iter().map(|o| o.resource).collect();
        assert_eq!(order, vec!["messages", "files", "tool_calls"]);
    }

    #[test]
    fn test_every_dependent_family_is_listed() {
        for family in [
            "messages",
            "conversations",
            "sessions",
            "transactions",
            "balances",
            "presets",
            "plugin_credentials",
            "shared_links",
            "files",
            "tool_calls",
        ] {
            assert!(
                DEPENDENT_TABLES.contains(&family),
                "{family} missing from cascade"
            );
        }
    }
}
