//! Booker handoff rules.
//!
//! The booker is the pool member who opens the provider deep link and pays
//! the driver. The original booker holds the role exclusively for a grace
//! period after the check-in code is issued; after that any eligible
//! checked-in contributor may claim it.

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::models::pool::PoolStatus;

/// Whether a caller may issue or refresh the check-in code. The role is not
/// shared with the host; only the current booker manages codes.
pub fn may_issue_code(caller: Uuid, booker: Uuid) -> bool {
    caller == booker
}

/// Snapshot of everything the claim decision depends on.
#[derive(Debug, Clone, Copy)]
pub struct ClaimContext {
    pub now: DateTime<Utc>,
    pub pool_status: PoolStatus,
    pub code_issued_at: Option<DateTime<Utc>>,
    pub grace_secs: i64,
    pub booker_checked_in: bool,
    pub claimant_is_booker: bool,
    pub claimant_paid: bool,
    pub claimant_checked_in: bool,
    pub checked_in_count: i32,
    pub min_contributors: i32,
}

/// Why a claim was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ClaimRejection {
    #[error("pool is not in a claimable state")]
    WrongPoolState,
    #[error("claimant already holds the booker role")]
    AlreadyBooker,
    #[error("claimant has not paid into the pool")]
    NotPaid,
    #[error("claimant has not checked in")]
    NotCheckedIn,
    #[error("no check-in code has been issued")]
    NoCodeIssued,
    #[error("the booker's grace period has not elapsed")]
    GraceNotElapsed,
    #[error("the booker has checked in and keeps the role")]
    BookerActive,
    #[error("not enough contributors have checked in")]
    QuorumNotMet,
}

/// Decides whether the claimant may take over the booker role.
///
/// The role can be claimed only while the pool is checking in or ready to
/// book, by a paid checked-in contributor other than the current booker, once
/// the grace period after code issuance has fully elapsed, provided the
/// original booker never checked in and the check-in quorum holds.
pub fn evaluate_claim(ctx: &ClaimContext) -> Result<(), ClaimRejection> {
    if !matches!(
        ctx.pool_status,
        PoolStatus::CheckingIn | PoolStatus::ReadyToBook
    ) {
        return Err(ClaimRejection::WrongPoolState);
    }
    if ctx.claimant_is_booker {
        return Err(ClaimRejection::AlreadyBooker);
    }
    if !ctx.claimant_paid {
        return Err(ClaimRejection::NotPaid);
    }
    if !ctx.claimant_checked_in {
        return Err(ClaimRejection::NotCheckedIn);
    }

    let issued_at = ctx.code_issued_at.ok_or(ClaimRejection::NoCodeIssued)?;
    if ctx.now < issued_at + Duration::seconds(ctx.grace_secs) {
        return Err(ClaimRejection::GraceNotElapsed);
    }

    if ctx.booker_checked_in {
        return Err(ClaimRejection::BookerActive);
    }

    if ctx.checked_in_count < ctx.min_contributors {
        return Err(ClaimRejection::QuorumNotMet);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimable() -> ClaimContext {
        let issued = Utc::now() - Duration::seconds(300);
        ClaimContext {
            now: Utc::now(),
            pool_status: PoolStatus::CheckingIn,
            code_issued_at: Some(issued),
            grace_secs: 180,
            booker_checked_in: false,
            claimant_is_booker: false,
            claimant_paid: true,
            claimant_checked_in: true,
            checked_in_count: 2,
            min_contributors: 2,
        }
    }

    #[test]
    fn test_only_booker_issues_code() {
        let booker = Uuid::new_v4();
        assert!(may_issue_code(booker, booker));
        assert!(!may_issue_code(Uuid::new_v4(), booker));
    }

    #[test]
    fn test_claim_succeeds_after_grace() {
        assert!(evaluate_claim(&claimable()).is_ok());
    }

    #[test]
    fn test_claim_allowed_in_ready_to_book() {
        let mut ctx = claimable();
        ctx.pool_status = PoolStatus::ReadyToBook;
        assert!(evaluate_claim(&ctx).is_ok());
    }

    #[test]
    fn test_claim_rejected_in_other_pool_states() {
        for status in [
            PoolStatus::Collecting,
            PoolStatus::Bookable,
            PoolStatus::Booking,
            PoolStatus::Booked,
            PoolStatus::Paid,
            PoolStatus::Canceled,
        ] {
            let mut ctx = claimable();
            ctx.pool_status = status;
            assert_eq!(evaluate_claim(&ctx), Err(ClaimRejection::WrongPoolState));
        }
    }

    #[test]
    fn test_current_booker_cannot_claim() {
        let mut ctx = claimable();
        ctx.claimant_is_booker = true;
        assert_eq!(evaluate_claim(&ctx), Err(ClaimRejection::AlreadyBooker));
    }

    #[test]
    fn test_unpaid_claimant_rejected() {
        let mut ctx = claimable();
        ctx.claimant_paid = false;
        assert_eq!(evaluate_claim(&ctx), Err(ClaimRejection::NotPaid));
    }

    #[test]
    fn test_unchecked_claimant_rejected() {
        let mut ctx = claimable();
        ctx.claimant_checked_in = false;
        assert_eq!(evaluate_claim(&ctx), Err(ClaimRejection::NotCheckedIn));
    }

    #[test]
    fn test_no_code_issued_rejected() {
        let mut ctx = claimable();
        ctx.code_issued_at = None;
        assert_eq!(evaluate_claim(&ctx), Err(ClaimRejection::NoCodeIssued));
    }

    #[test]
    fn test_grace_boundary() {
        let issued = Utc::now();
        let mut ctx = claimable();
        ctx.code_issued_at = Some(issued);
        ctx.grace_secs = 180;

        ctx.now = issued + Duration::seconds(179);
        assert_eq!(evaluate_claim(&ctx), Err(ClaimRejection::GraceNotElapsed));

        // Eligible at exactly the grace boundary.
        ctx.now = issued + Duration::seconds(180);
        assert!(evaluate_claim(&ctx).is_ok());
    }

    #[test]
    fn test_checked_in_booker_keeps_role() {
        let mut ctx = claimable();
        ctx.booker_checked_in = true;
        assert_eq!(evaluate_claim(&ctx), Err(ClaimRejection::BookerActive));
    }

    #[test]
    fn test_quorum_enforced() {
        let mut ctx = claimable();
        ctx.checked_in_count = 1;
        assert_eq!(evaluate_claim(&ctx), Err(ClaimRejection::QuorumNotMet));

        // The claim quorum is the pool's own minimum, with no extra floor.
        ctx.min_contributors = 1;
        assert!(evaluate_claim(&ctx).is_ok());
    }
}
