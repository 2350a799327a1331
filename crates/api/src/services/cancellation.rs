//! Pool teardown on ride cancellation.
//!
//! Unwinding a pool touches money, so every contribution gets an explicit
//! per-item outcome collected into a report instead of being logged and
//! forgotten. The handler persists the outcomes; callers and tests can assert
//! exactly which payments were returned and which need manual follow-up.

use domain::models::{Contribution, ContributionStatus};
use uuid::Uuid;

use super::payments::PaymentGateway;

/// What the teardown did with one contribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelAction {
    /// Pending seat lock, no money involved.
    MarkedCanceled,
    /// Uncaptured authorization released at the gateway.
    ReleasedAuthorization,
    /// Captured payment refunded at the gateway.
    Refunded,
    /// Already canceled or refunded, nothing to do.
    Skipped,
}

/// Per-contribution outcome of a pool teardown.
#[derive(Debug, Clone)]
pub struct ContributionOutcome {
    pub contribution_id: Uuid,
    pub action: CancelAction,
    /// Status to persist, present when the row's state actually changed.
    pub new_status: Option<&'static str>,
    /// Gateway failure detail; the row is left untouched for retry.
    pub error: Option<String>,
}

impl ContributionOutcome {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Every contribution's outcome from unwinding one pool.
#[derive(Debug, Default)]
pub struct CancellationReport {
    pub outcomes: Vec<ContributionOutcome>,
}

impl CancellationReport {
    /// Payments confirmed returned: refunds plus released authorizations.
    pub fn refunded_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| {
                o.succeeded()
                    && matches!(
                        o.action,
                        CancelAction::Refunded | CancelAction::ReleasedAuthorization
                    )
            })
            .count()
    }

    /// Money-holding rows the gateway refused to unwind.
    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.succeeded()).count()
    }
}

/// Unwind every contribution in a pool against the payment gateway.
///
/// Best effort: a failed gateway call is recorded in the report and the loop
/// carries on, so one stuck refund never blocks the cancellation.
pub async fn unwind_contributions(
    gateway: &dyn PaymentGateway,
    rows: &[Contribution],
) -> CancellationReport {
    let mut report = CancellationReport::default();
    for contribution in rows {
        report.outcomes.push(unwind_one(gateway, contribution).await);
    }
    report
}

async fn unwind_one(gateway: &dyn PaymentGateway, c: &Contribution) -> ContributionOutcome {
    match c.status {
        ContributionStatus::Pending => ContributionOutcome {
            contribution_id: c.id,
            action: CancelAction::MarkedCanceled,
            new_status: Some("canceled"),
            error: None,
        },
        ContributionStatus::Authorized => match c.payment_ref.as_deref() {
            None => ContributionOutcome {
                contribution_id: c.id,
                action: CancelAction::ReleasedAuthorization,
                new_status: None,
                error: Some("authorized contribution has no payment reference".to_string()),
            },
            Some(payment_ref) => match gateway.cancel_authorization(payment_ref).await {
                Ok(()) => ContributionOutcome {
                    contribution_id: c.id,
                    action: CancelAction::ReleasedAuthorization,
                    new_status: Some("canceled"),
                    error: None,
                },
                Err(e) => ContributionOutcome {
                    contribution_id: c.id,
                    action: CancelAction::ReleasedAuthorization,
                    new_status: None,
                    error: Some(e.to_string()),
                },
            },
        },
        ContributionStatus::Paid => match c.payment_ref.as_deref() {
            None => ContributionOutcome {
                contribution_id: c.id,
                action: CancelAction::Refunded,
                new_status: None,
                error: Some("paid contribution has no payment reference".to_string()),
            },
            Some(payment_ref) => match gateway.refund(payment_ref).await {
                Ok(()) => ContributionOutcome {
                    contribution_id: c.id,
                    action: CancelAction::Refunded,
                    new_status: Some("refunded"),
                    error: None,
                },
                Err(e) => ContributionOutcome {
                    contribution_id: c.id,
                    action: CancelAction::Refunded,
                    new_status: None,
                    error: Some(e.to_string()),
                },
            },
        },
        ContributionStatus::Canceled | ContributionStatus::Refunded => ContributionOutcome {
            contribution_id: c.id,
            action: CancelAction::Skipped,
            new_status: None,
            error: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::payments::{CheckoutSession, PaymentError};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Gateway stub that fails refunds for payment refs containing "bad".
    #[derive(Default)]
    struct StubGateway {
        refunds: AtomicUsize,
        releases: AtomicUsize,
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn create_checkout_session(
            &self,
            _contribution_id: Uuid,
            _amount_minor: i64,
            _currency: &str,
        ) -> Result<CheckoutSession, PaymentError> {
            Err(PaymentError::NotConfigured)
        }

        async fn cancel_authorization(&self, payment_ref: &str) -> Result<(), PaymentError> {
            if payment_ref.contains("bad") {
                return Err(PaymentError::ProviderError("declined".to_string()));
            }
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn refund(&self, payment_ref: &str) -> Result<(), PaymentError> {
            if payment_ref.contains("bad") {
                return Err(PaymentError::ProviderError("declined".to_string()));
            }
            self.refunds.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn create_transfer(
            &self,
            _account_id: &str,
            _amount_minor: i64,
            _currency: &str,
        ) -> Result<String, PaymentError> {
            Err(PaymentError::NotConfigured)
        }
    }

    fn contribution(status: ContributionStatus, payment_ref: Option<&str>) -> Contribution {
        Contribution {
            id: Uuid::new_v4(),
            pool_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            currency: "gbp".to_string(),
            user_share_minor: 1500,
            platform_fee_minor: 75,
            seats: 1,
            backpacks: 0,
            small_items: 0,
            large_items: 0,
            status,
            is_host: false,
            payment_ref: payment_ref.map(String::from),
            checked_in_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_mixed_paid_and_authorized_teardown() {
        let gateway = StubGateway::default();
        let rows = vec![
            contribution(ContributionStatus::Paid, Some("cs_1")),
            contribution(ContributionStatus::Authorized, Some("cs_2")),
            contribution(ContributionStatus::Pending, None),
        ];

        let report = unwind_contributions(&gateway, &rows).await;

        assert_eq!(report.refunded_count(), 2);
        assert_eq!(report.failed_count(), 0);
        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.releases.load(Ordering::SeqCst), 1);

        assert_eq!(report.outcomes[0].new_status, Some("refunded"));
        assert_eq!(report.outcomes[1].new_status, Some("canceled"));
        assert_eq!(report.outcomes[2].new_status, Some("canceled"));
        assert_eq!(report.outcomes[2].action, CancelAction::MarkedCanceled);
    }

    #[tokio::test]
    async fn test_failed_refund_recorded_not_fatal() {
        let gateway = StubGateway::default();
        let rows = vec![
            contribution(ContributionStatus::Paid, Some("cs_bad")),
            contribution(ContributionStatus::Paid, Some("cs_good")),
        ];

        let report = unwind_contributions(&gateway, &rows).await;

        assert_eq!(report.refunded_count(), 1);
        assert_eq!(report.failed_count(), 1);
        assert!(!report.outcomes[0].succeeded());
        assert_eq!(report.outcomes[0].new_status, None);
        assert_eq!(report.outcomes[1].new_status, Some("refunded"));
    }

    #[tokio::test]
    async fn test_missing_payment_ref_counts_as_failure() {
        let gateway = StubGateway::default();
        let rows = vec![contribution(ContributionStatus::Paid, None)];

        let report = unwind_contributions(&gateway, &rows).await;

        assert_eq!(report.refunded_count(), 0);
        assert_eq!(report.failed_count(), 1);
    }

    #[tokio::test]
    async fn test_terminal_rows_skipped() {
        let gateway = StubGateway::default();
        let rows = vec![
            contribution(ContributionStatus::Canceled, None),
            contribution(ContributionStatus::Refunded, Some("cs_1")),
        ];

        let report = unwind_contributions(&gateway, &rows).await;

        assert_eq!(report.refunded_count(), 0);
        assert_eq!(report.failed_count(), 0);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.action == CancelAction::Skipped));
        assert_eq!(gateway.refunds.load(Ordering::SeqCst), 0);
    }
}
