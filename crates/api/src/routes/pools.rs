//! Pool endpoint handlers: funding, check-in, booker handoff and booking.
//!
//! Every mutating handler takes the per-ride lock before reading pool state
//! so concurrent seat locks, claims and confirmations serialize per ride.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use domain::models::{
    seat_lock_expires_at, CheckInRequest, Contribution, ContributionStatus, PoolStatus, PoolTotals,
    Ride, RidePool, SeatRequest,
};
use domain::services::booking;
use domain::services::handoff::{self, ClaimContext, ClaimRejection};
use persistence::repositories::{
    ContributionRepository, PayoutRepository, PoolRepository, ProfileRepository, RideRepository,
    SeatLockInput,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::metrics as business_metrics;

/// Strips the check-in code from a pool payload unless the viewer holds it
/// legitimately (host or current booker).
fn pool_view(mut pool: RidePool, viewer: Uuid, host: Uuid) -> RidePool {
    if viewer != host && viewer != pool.booker_user_id {
        pool.checkin_code = None;
    }
    pool
}

async fn load_active_ride(state: &AppState, ride_id: Uuid) -> Result<Ride, ApiError> {
    let rides = RideRepository::new(state.pool.clone());
    let ride: Ride = rides
        .find_by_id(ride_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ride not found".into()))?
        .into();
    if !ride.is_active() {
        return Err(ApiError::NotFound("Ride not found".into()));
    }
    Ok(ride)
}

async fn load_pool(state: &AppState, ride_id: Uuid) -> Result<RidePool, ApiError> {
    let pools = PoolRepository::new(state.pool.clone());
    Ok(pools
        .find_by_ride(ride_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("This ride has no pool yet".into()))?
        .into())
}

/// Record the host's declared seats and luggage as a zero-amount baseline
/// row. It never counts toward paid capacity or quorum.
async fn seed_host_baseline(
    state: &AppState,
    pool: &RidePool,
    ride: &Ride,
) -> Result<(), ApiError> {
    let contributions = ContributionRepository::new(state.pool.clone());
    contributions
        .ensure_host_baseline(
            pool.id,
            ride.host_user_id,
            &pool.currency,
            ride.host_seats,
            ride.host_backpacks,
            ride.host_small_items,
            ride.host_large_items,
        )
        .await?;
    Ok(())
}

async fn load_contributions(
    state: &AppState,
    pool_id: Uuid,
) -> Result<Vec<Contribution>, ApiError> {
    let contributions = ContributionRepository::new(state.pool.clone());
    Ok(contributions
        .find_by_pool(pool_id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect())
}

/// Get or lazily create the pool for a ride. The host starts out as booker.
///
/// POST /api/v1/rides/:ride_id/pool
pub async fn ensure_pool(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<(StatusCode, Json<RidePool>), ApiError> {
    let ride = load_active_ride(&state, ride_id).await?;

    let pools = PoolRepository::new(state.pool.clone());
    let (entity, was_created) = pools
        .ensure_for_ride(
            ride_id,
            ride.host_user_id,
            &state.config.payments.currency,
            state.config.pool.min_contributors,
        )
        .await?;
    let pool: RidePool = entity.into();
    seed_host_baseline(&state, &pool, &ride).await?;

    if was_created {
        info!(pool_id = %pool.id, ride_id = %ride_id, "Pool created");
    }

    let status = if was_created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(pool_view(pool, auth.user_id, ride.host_user_id))))
}

#[derive(Debug, Serialize)]
pub struct BookingStatusResponse {
    pub status: booking::BookingStatus,
    pub pool_status: PoolStatus,
    pub remaining: booking::RemainingCapacity,
    /// Current price of one seat in minor units.
    pub per_seat_minor: i64,
    pub checked_in_count: i64,
    pub quorum_met: bool,
    /// True while an unexpired check-in code is outstanding.
    pub code_active: bool,
    pub is_booker: bool,
}

/// Resolve the booking view for a ride, creating its pool on first read.
///
/// GET /api/v1/rides/:ride_id/booking-status
pub async fn booking_status(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<BookingStatusResponse>, ApiError> {
    let ride = load_active_ride(&state, ride_id).await?;

    let pools = PoolRepository::new(state.pool.clone());
    let (entity, was_created) = pools
        .ensure_for_ride(
            ride_id,
            ride.host_user_id,
            &state.config.payments.currency,
            state.config.pool.min_contributors,
        )
        .await?;
    let pool: RidePool = entity.into();
    seed_host_baseline(&state, &pool, &ride).await?;
    if was_created {
        info!(pool_id = %pool.id, ride_id = %ride_id, "Pool created on status read");
    }

    let rows = load_contributions(&state, pool.id).await?;
    let paid = PoolTotals::from_contributions(&rows);
    let remaining = booking::remaining_capacity(&ride, &paid);
    let per_seat =
        booking::per_seat_minor(booking::estimate_minor(&ride), ride.host_seats, paid.seats);
    let checked_in_count = rows
        .iter()
        .filter(|c| c.status == ContributionStatus::Paid && c.is_checked_in())
        .count() as i64;

    Ok(Json(BookingStatusResponse {
        status: booking::coarse_status(&pool, &rows),
        pool_status: pool.status,
        remaining,
        per_seat_minor: per_seat,
        checked_in_count,
        quorum_met: checked_in_count >= i64::from(pool.min_contributors),
        code_active: pool.code_active(Utc::now()),
        is_booker: auth.user_id == pool.booker_user_id,
    }))
}

#[derive(Debug, Serialize)]
pub struct SeatLockResponse {
    pub contribution: Contribution,
    /// When the lock lapses unless checkout completes.
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// Indicative per-seat quote in minor units; checkout reprices the hold.
    pub per_seat_minor: i64,
}

/// Lock seats ahead of checkout.
///
/// POST /api/v1/rides/:ride_id/pool/seats
pub async fn lock_seat(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
    Json(request): Json<SeatRequest>,
) -> Result<(StatusCode, Json<SeatLockResponse>), ApiError> {
    request.validate()?;

    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    let ride = load_active_ride(&state, ride_id).await?;
    if ride.host_user_id == auth.user_id {
        return Err(ApiError::Forbidden(
            "The host does not pay into their own pool".into(),
        ));
    }

    let pools = PoolRepository::new(state.pool.clone());
    let (pool_entity, _) = pools
        .ensure_for_ride(
            ride_id,
            ride.host_user_id,
            &state.config.payments.currency,
            state.config.pool.min_contributors,
        )
        .await?;
    let pool: RidePool = pool_entity.into();
    seed_host_baseline(&state, &pool, &ride).await?;

    if pool.status != PoolStatus::Collecting {
        return Err(ApiError::InvalidState(format!(
            "Seats can only be locked while the pool is collecting, not {}",
            pool.status
        )));
    }

    let rows = load_contributions(&state, pool.id).await?;
    let paid = PoolTotals::from_contributions(&rows);
    let remaining = booking::remaining_capacity(&ride, &paid);
    booking::validate_seat_request(&request, &remaining)?;

    // The lock reserves capacity only; amounts stay zero until checkout
    // prices the hold against the group size at that moment.
    let per_seat =
        booking::per_seat_minor(booking::estimate_minor(&ride), ride.host_seats, paid.seats);

    let contributions = ContributionRepository::new(state.pool.clone());
    let locked: Contribution = contributions
        .upsert_seat_lock(SeatLockInput {
            pool_id: pool.id,
            user_id: auth.user_id,
            currency: pool.currency.clone(),
            seats: request.seats,
            backpacks: request.backpacks,
            small_items: request.small_items,
            large_items: request.large_items,
        })
        .await?
        .ok_or_else(|| {
            ApiError::InvalidState("You already hold a confirmed contribution in this pool".into())
        })?
        .into();

    business_metrics::record_seat_lock();
    info!(
        pool_id = %pool.id,
        user_id = %auth.user_id,
        seats = request.seats,
        "Seat lock taken"
    );

    let expires_at = seat_lock_expires_at(locked.created_at);
    Ok((
        StatusCode::CREATED,
        Json(SeatLockResponse {
            contribution: locked,
            expires_at,
            per_seat_minor: per_seat,
        }),
    ))
}

#[derive(Debug, Serialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub url: String,
}

/// Create a hosted checkout session for the caller's pending seat lock.
///
/// The hold is priced here, against the group size at checkout time, not
/// when the seats were locked.
///
/// POST /api/v1/rides/:ride_id/pool/checkout
pub async fn checkout_session(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<CheckoutSessionResponse>, ApiError> {
    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    let ride = load_active_ride(&state, ride_id).await?;
    let pool = load_pool(&state, ride_id).await?;

    let contributions = ContributionRepository::new(state.pool.clone());
    let own: Contribution = contributions
        .find_by_pool_and_user(pool.id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No seat lock found for this pool".into()))?
        .into();

    if own.status != ContributionStatus::Pending {
        return Err(ApiError::InvalidState(format!(
            "Contribution is {}, not pending",
            own.status
        )));
    }
    if Utc::now() >= seat_lock_expires_at(own.created_at) {
        return Err(ApiError::InvalidState("The seat lock has expired".into()));
    }

    let rows = load_contributions(&state, pool.id).await?;
    let paid = PoolTotals::from_contributions(&rows);
    let per_seat =
        booking::per_seat_minor(booking::estimate_minor(&ride), ride.host_seats, paid.seats);
    let user_share = per_seat * i64::from(own.seats);
    let platform_fee = user_share * state.config.payments.platform_fee_bps / 10_000;

    let own: Contribution = contributions
        .price_seat_lock(own.id, user_share, platform_fee)
        .await?
        .ok_or_else(|| ApiError::NotFound("No seat lock found for this pool".into()))?
        .into();

    let amount = own.user_share_minor + own.platform_fee_minor;
    let session = state
        .gateway
        .create_checkout_session(own.id, amount, &own.currency)
        .await
        .map_err(|e| ApiError::ServiceUnavailable(e.to_string()))?;

    contributions
        .set_payment_ref(own.id, &session.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No seat lock found for this pool".into()))?;

    Ok(Json(CheckoutSessionResponse {
        session_id: session.id,
        url: session.url,
    }))
}

/// Issue (or re-issue) the check-in code and move the pool to checking-in.
/// Current booker only.
///
/// POST /api/v1/rides/:ride_id/pool/code
pub async fn issue_code(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RidePool>, ApiError> {
    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    load_active_ride(&state, ride_id).await?;
    let pool = load_pool(&state, ride_id).await?;

    if !handoff::may_issue_code(auth.user_id, pool.booker_user_id) {
        return Err(ApiError::Forbidden(
            "Only the booker can issue a check-in code".into(),
        ));
    }
    if !pool.status.can_transition(PoolStatus::CheckingIn) {
        return Err(ApiError::InvalidState(format!(
            "A code cannot be issued while the pool is {}",
            pool.status
        )));
    }

    let code = shared::code::generate_code(shared::code::DEFAULT_CODE_LENGTH);
    let ttl = domain::models::effective_code_ttl(state.config.pool.code_ttl_secs);
    let issued_at = Utc::now();
    let expires_at = issued_at + Duration::seconds(ttl);

    let pools = PoolRepository::new(state.pool.clone());
    let updated: RidePool = pools
        .issue_code(pool.id, &code, issued_at, expires_at)
        .await?
        .ok_or_else(|| ApiError::NotFound("Pool not found".into()))?
        .into();

    info!(pool_id = %pool.id, ttl_secs = ttl, "Check-in code issued");
    Ok(Json(updated))
}

#[derive(Debug, Serialize)]
pub struct CheckInResponse {
    pub checked_in: bool,
    pub pool_status: PoolStatus,
}

/// Check in with the pool's active code.
///
/// POST /api/v1/rides/:ride_id/pool/check-in
pub async fn check_in(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
    Json(request): Json<CheckInRequest>,
) -> Result<Json<CheckInResponse>, ApiError> {
    request.validate()?;

    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    load_active_ride(&state, ride_id).await?;
    let pool = load_pool(&state, ride_id).await?;

    if !matches!(
        pool.status,
        PoolStatus::CheckingIn | PoolStatus::ReadyToBook
    ) {
        return Err(ApiError::InvalidState(format!(
            "Check-in is not open while the pool is {}",
            pool.status
        )));
    }

    let now = Utc::now();
    if !pool.code_active(now) {
        return Err(ApiError::Forbidden("The check-in code has expired".into()));
    }
    if pool.checkin_code.as_deref() != Some(request.code.as_str()) {
        return Err(ApiError::Forbidden("Wrong check-in code".into()));
    }

    let contributions = ContributionRepository::new(state.pool.clone());
    let own: Contribution = contributions
        .find_by_pool_and_user(pool.id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::Forbidden("Only paid contributors can check in".into()))?
        .into();
    if own.status != ContributionStatus::Paid {
        return Err(ApiError::Forbidden(
            "Only paid contributors can check in".into(),
        ));
    }

    contributions
        .mark_checked_in(own.id, now)
        .await?
        .ok_or_else(|| ApiError::NotFound("Contribution not found".into()))?;

    let checked_in = contributions.count_checked_in_paid(pool.id).await?;

    let mut pool_status = pool.status;
    if pool.status == PoolStatus::CheckingIn && checked_in >= i64::from(pool.min_contributors) {
        let pools = PoolRepository::new(state.pool.clone());
        pools.update_status(pool.id, "ready_to_book").await?;
        pool_status = PoolStatus::ReadyToBook;
        info!(pool_id = %pool.id, checked_in, "Pool ready to book");
    }

    Ok(Json(CheckInResponse {
        checked_in: true,
        pool_status,
    }))
}

/// Claim the booker role after the grace period.
///
/// POST /api/v1/rides/:ride_id/pool/claim-booker
pub async fn claim_booker(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RidePool>, ApiError> {
    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    let ride = load_active_ride(&state, ride_id).await?;
    let pool = load_pool(&state, ride_id).await?;

    let contributions = ContributionRepository::new(state.pool.clone());
    let own: Option<Contribution> = contributions
        .find_by_pool_and_user(pool.id, auth.user_id)
        .await?
        .map(Into::into);
    let booker: Option<Contribution> = contributions
        .find_by_pool_and_user(pool.id, pool.booker_user_id)
        .await?
        .map(Into::into);
    let checked_in = contributions.count_checked_in_paid(pool.id).await?;

    let ctx = ClaimContext {
        now: Utc::now(),
        pool_status: pool.status,
        code_issued_at: pool.code_issued_at,
        grace_secs: domain::models::effective_claim_grace(state.config.pool.claim_grace_secs),
        booker_checked_in: booker.as_ref().is_some_and(|c| c.is_checked_in()),
        claimant_is_booker: auth.user_id == pool.booker_user_id,
        claimant_paid: own
            .as_ref()
            .is_some_and(|c| c.status == ContributionStatus::Paid),
        claimant_checked_in: own.as_ref().is_some_and(|c| c.is_checked_in()),
        checked_in_count: checked_in as i32,
        min_contributors: pool.min_contributors,
    };

    handoff::evaluate_claim(&ctx).map_err(|rejection| match rejection {
        ClaimRejection::NotPaid | ClaimRejection::NotCheckedIn => {
            ApiError::Forbidden(rejection.to_string())
        }
        other => ApiError::InvalidState(other.to_string()),
    })?;

    let pools = PoolRepository::new(state.pool.clone());
    let mut updated: RidePool = pools
        .set_booker(pool.id, auth.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Pool not found".into()))?
        .into();

    // A successful takeover means the quorum is checked in and waiting.
    if updated.status == PoolStatus::CheckingIn {
        updated = pools
            .update_status(pool.id, "ready_to_book")
            .await?
            .ok_or_else(|| ApiError::NotFound("Pool not found".into()))?
            .into();
    }

    info!(
        pool_id = %pool.id,
        from = %pool.booker_user_id,
        to = %auth.user_id,
        "Booker role claimed"
    );
    Ok(Json(pool_view(updated, auth.user_id, ride.host_user_id)))
}

#[derive(Debug, Serialize)]
pub struct ProviderLinkResponse {
    pub url: String,
}

/// Hand the booker the ride-hailing deep link and move the pool to booking.
///
/// GET /api/v1/rides/:ride_id/pool/provider-link
pub async fn provider_link(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<ProviderLinkResponse>, ApiError> {
    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    let ride = load_active_ride(&state, ride_id).await?;
    let pool = load_pool(&state, ride_id).await?;

    if auth.user_id != pool.booker_user_id {
        return Err(ApiError::Forbidden(
            "Only the booker can open the booking link".into(),
        ));
    }
    if !matches!(pool.status, PoolStatus::ReadyToBook | PoolStatus::Booking) {
        return Err(ApiError::InvalidState(format!(
            "The booking link is not available while the pool is {}",
            pool.status
        )));
    }

    let url = build_provider_link(&state.config.payments.provider_link_base, &ride)?;

    if pool.status == PoolStatus::ReadyToBook {
        let pools = PoolRepository::new(state.pool.clone());
        pools.update_status(pool.id, "booking").await?;
        info!(pool_id = %pool.id, "Booking started");
    }

    Ok(Json(ProviderLinkResponse { url }))
}

fn build_provider_link(base: &str, ride: &Ride) -> Result<String, ApiError> {
    let url = reqwest::Url::parse_with_params(
        base,
        &[
            ("action", "setPickup".to_string()),
            ("pickup[latitude]", ride.origin_lat.to_string()),
            ("pickup[longitude]", ride.origin_lng.to_string()),
            ("pickup[nickname]", ride.origin_name.clone()),
            ("dropoff[latitude]", ride.destination_lat.to_string()),
            ("dropoff[longitude]", ride.destination_lng.to_string()),
            ("dropoff[nickname]", ride.destination_name.clone()),
        ],
    )
    .map_err(|e| ApiError::Internal(format!("Invalid provider link base: {}", e)))?;
    Ok(url.into())
}

#[derive(Debug, Serialize)]
pub struct ConfirmBookedResponse {
    pub pool: RidePool,
    /// Status of the payout transfer to the booker.
    pub payout_status: String,
}

/// Confirm the ride was booked and pay the collected fare share out to the
/// booker.
///
/// The collected amount and the booker's payout account are validated before
/// anything is written; the pool is only marked booked once the transfer has
/// gone through, so a gateway failure leaves it retryable.
///
/// POST /api/v1/rides/:ride_id/pool/confirm-booked
pub async fn confirm_booked(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<ConfirmBookedResponse>, ApiError> {
    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    load_active_ride(&state, ride_id).await?;
    let pool = load_pool(&state, ride_id).await?;

    if auth.user_id != pool.booker_user_id {
        return Err(ApiError::Forbidden(
            "Only the booker can confirm the booking".into(),
        ));
    }
    if !pool.status.can_transition(PoolStatus::Booked) {
        return Err(ApiError::InvalidState(format!(
            "The pool cannot be confirmed while {}",
            pool.status
        )));
    }

    let profiles = ProfileRepository::new(state.pool.clone());
    let profile = profiles
        .find_by_id(pool.booker_user_id)
        .await?
        .map(domain::models::Profile::from);
    booking::validate_payout_preconditions(pool.collected_user_share_minor, profile.as_ref())
        .map_err(|e| ApiError::InvalidState(e.to_string()))?;
    let account_id = profile
        .and_then(|p| p.payout_account_id)
        .ok_or_else(|| ApiError::InvalidState("The booker has no verified payout account".into()))?;

    let (pool, payout_status) = settle_booker_payout(&state, pool, &account_id).await?;

    Ok(Json(ConfirmBookedResponse {
        pool,
        payout_status,
    }))
}

/// Creates (or resumes) the payout row, sends the transfer, and only then
/// advances the pool through booked to paid. A failed transfer is marked on
/// the payout row and surfaced to the caller without touching pool status.
async fn settle_booker_payout(
    state: &AppState,
    pool: RidePool,
    account_id: &str,
) -> Result<(RidePool, String), ApiError> {
    let payouts = PayoutRepository::new(state.pool.clone());
    let payout = match payouts
        .create_pending(
            pool.id,
            pool.booker_user_id,
            &pool.currency,
            pool.collected_user_share_minor,
        )
        .await?
    {
        Some(entity) => entity,
        // A previous confirm attempt already created the row; resume it.
        None => payouts
            .find_by_pool(pool.id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Payout not found".into()))?,
    };

    if payout.status != "sent" {
        match state
            .gateway
            .create_transfer(account_id, payout.amount_minor, &pool.currency)
            .await
        {
            Ok(transfer_ref) => {
                payouts.mark_sent(payout.id, &transfer_ref).await?;
                info!(pool_id = %pool.id, transfer_ref = %transfer_ref, "Booker payout sent");
            }
            Err(e) => {
                warn!(pool_id = %pool.id, error = %e, "Booker payout failed");
                payouts.mark_failed(payout.id).await?;
                return Err(ApiError::ServiceUnavailable(
                    "The payout transfer failed; confirm the booking again to retry".into(),
                ));
            }
        }
    }

    let pools = PoolRepository::new(state.pool.clone());
    pools
        .update_status(pool.id, "booked")
        .await?
        .ok_or_else(|| ApiError::NotFound("Pool not found".into()))?;
    business_metrics::record_pool_booked();
    info!(pool_id = %pool.id, "Pool booked");

    let paid: RidePool = pools
        .update_status(pool.id, "paid")
        .await?
        .ok_or_else(|| ApiError::NotFound("Pool not found".into()))?
        .into();

    Ok((paid, "sent".to_string()))
}
