//! Ride endpoint handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use domain::models::{
    Contribution, ContributionStatus, CreateRideRequest, PoolTotals, Ride, RidePool,
    UpdateRideRequest, VehicleClass,
};
use domain::services::booking;
use persistence::repositories::{
    ContributionRepository, PoolRepository, ProfileRepository, RideInput, RideRepository,
    RideUpdateInput,
};
use shared::pagination::{Page, PageParams};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::UserAuth;
use crate::middleware::metrics as business_metrics;
use crate::services::cancellation;

/// Ride payload with live pricing context.
#[derive(Debug, Serialize)]
pub struct RideView {
    #[serde(flatten)]
    pub ride: Ride,
    pub remaining_seats: i32,
    /// Current price of one seat in minor units.
    pub per_seat_minor: i64,
}

fn ride_view(ride: Ride, paid: &PoolTotals) -> RideView {
    let remaining = booking::remaining_capacity(&ride, paid);
    let price = booking::per_seat_minor(
        booking::estimate_minor(&ride),
        ride.host_seats,
        paid.seats,
    );
    RideView {
        remaining_seats: remaining.seats,
        per_seat_minor: price,
        ride,
    }
}

async fn paid_totals_for_ride(
    state: &AppState,
    ride_id: Uuid,
) -> Result<PoolTotals, ApiError> {
    let pools = PoolRepository::new(state.pool.clone());
    let Some(pool) = pools.find_by_ride(ride_id).await? else {
        return Ok(PoolTotals::default());
    };

    let contributions = ContributionRepository::new(state.pool.clone());
    let rows: Vec<Contribution> = contributions
        .find_by_pool(pool.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(PoolTotals::from_contributions(&rows))
}

/// Publish a new ride.
///
/// POST /api/v1/rides
pub async fn create_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Json(request): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<RideView>), ApiError> {
    request.validate()?;

    let vehicle_class = request.vehicle_class.unwrap_or_default();
    let limits = vehicle_class.limits();
    if request.seats > limits.seats {
        return Err(ApiError::Validation(format!(
            "A {} has only {} seats",
            vehicle_class, limits.seats
        )));
    }

    let rides = RideRepository::new(state.pool.clone());
    let ride: Ride = rides
        .create(RideInput {
            host_user_id: auth.user_id,
            origin_name: request.origin_name,
            origin_lat: request.origin_lat,
            origin_lng: request.origin_lng,
            destination_name: request.destination_name,
            destination_lat: request.destination_lat,
            destination_lng: request.destination_lng,
            departs_at: request.departs_at,
            host_seats: request.seats,
            host_backpacks: request.backpacks,
            host_small_items: request.small_items,
            host_large_items: request.large_items,
            total_items_limit: request.total_items_limit,
            vehicle_class: vehicle_class.to_string(),
            estimated_fare: request.estimated_fare,
        })
        .await?
        .into();

    info!(ride_id = %ride.id, host = %auth.user_id, "Ride created");
    let view = ride_view(ride, &PoolTotals::default());
    Ok((StatusCode::CREATED, Json(view)))
}

/// List active upcoming rides.
///
/// GET /api/v1/rides
pub async fn list_rides(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<Ride>>, ApiError> {
    let rides = RideRepository::new(state.pool.clone());
    let now = Utc::now();

    let data: Vec<Ride> = rides
        .list_active(now, params.limit(), params.offset())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let total = rides.count_active(now).await?;

    Ok(Json(Page::new(data, total, params)))
}

/// Fetch one ride with live pricing.
///
/// GET /api/v1/rides/:ride_id
pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<RideView>, ApiError> {
    let rides = RideRepository::new(state.pool.clone());
    let ride: Ride = rides
        .find_by_id(ride_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ride not found".into()))?
        .into();

    if !ride.is_active() {
        return Err(ApiError::NotFound("Ride not found".into()));
    }

    let paid = paid_totals_for_ride(&state, ride_id).await?;
    Ok(Json(ride_view(ride, &paid)))
}

/// Edit a ride. Host only, and only while nobody has committed money.
///
/// PATCH /api/v1/rides/:ride_id
pub async fn update_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
    Json(request): Json<UpdateRideRequest>,
) -> Result<Json<RideView>, ApiError> {
    request.validate()?;

    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    let rides = RideRepository::new(state.pool.clone());
    let ride: Ride = rides
        .find_by_id(ride_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ride not found".into()))?
        .into();

    if ride.host_user_id != auth.user_id {
        return Err(ApiError::Forbidden("Only the host can edit a ride".into()));
    }
    if !ride.is_active() {
        return Err(ApiError::NotFound("Ride not found".into()));
    }

    let pools = PoolRepository::new(state.pool.clone());
    if let Some(pool) = pools.find_by_ride(ride_id).await? {
        let contributions = ContributionRepository::new(state.pool.clone());
        let rows: Vec<Contribution> = contributions
            .find_by_pool(pool.id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        // The host's own baseline row never blocks an edit.
        let committed = rows.iter().any(|c| {
            !c.is_host
                && matches!(
                    c.status,
                    ContributionStatus::Pending
                        | ContributionStatus::Authorized
                        | ContributionStatus::Paid
                )
        });
        if committed {
            return Err(ApiError::InvalidState(
                "Ride cannot be edited once passengers have joined the pool".into(),
            ));
        }
    }

    if let Some(seats) = request.seats {
        let class: VehicleClass = request
            .vehicle_class
            .unwrap_or(ride.vehicle_class);
        if seats > class.limits().seats {
            return Err(ApiError::Validation(format!(
                "A {} has only {} seats",
                class,
                class.limits().seats
            )));
        }
    }

    let updated: Ride = rides
        .update(
            ride_id,
            RideUpdateInput {
                departs_at: request.departs_at,
                host_seats: request.seats,
                host_backpacks: request.backpacks,
                host_small_items: request.small_items,
                host_large_items: request.large_items,
                vehicle_class: request.vehicle_class.map(|c| c.to_string()),
                estimated_fare: request.estimated_fare,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound("Ride not found".into()))?
        .into();

    Ok(Json(ride_view(updated, &PoolTotals::default())))
}

async fn caller_is_admin(state: &AppState, user_id: Uuid) -> Result<bool, ApiError> {
    let profiles = ProfileRepository::new(state.pool.clone());
    Ok(profiles
        .find_by_id(user_id)
        .await?
        .map(|p| p.is_admin)
        .unwrap_or(false))
}

/// Result of canceling a ride and unwinding its pool.
#[derive(Debug, Serialize)]
pub struct CancelRideResponse {
    pub ride_id: Uuid,
    /// Payments successfully returned (refunds plus released authorizations).
    pub refunded_count: usize,
    /// Payments that could not be returned and need manual follow-up.
    pub failed_count: usize,
}

/// Cancel a ride. Host or admin only. Unwinds the pool best effort: every captured
/// payment is refunded, every open authorization released, and items that
/// fail are left untouched for retry.
///
/// DELETE /api/v1/rides/:ride_id
pub async fn delete_ride(
    State(state): State<AppState>,
    auth: UserAuth,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<CancelRideResponse>, ApiError> {
    let lock = state.ride_locks.for_ride(ride_id);
    let _guard = lock.lock().await;

    let rides = RideRepository::new(state.pool.clone());
    let ride: Ride = rides
        .find_by_id(ride_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Ride not found".into()))?
        .into();

    if ride.host_user_id != auth.user_id && !caller_is_admin(&state, auth.user_id).await? {
        return Err(ApiError::Forbidden(
            "Only the host or an admin can cancel a ride".into(),
        ));
    }
    if !ride.is_active() {
        return Err(ApiError::NotFound("Ride not found".into()));
    }

    let pools = PoolRepository::new(state.pool.clone());
    let contributions = ContributionRepository::new(state.pool.clone());

    let mut refunded_count = 0usize;
    let mut failed_count = 0usize;

    if let Some(pool_entity) = pools.find_by_ride(ride_id).await? {
        let pool: RidePool = pool_entity.into();

        if pool.status.can_transition(domain::models::PoolStatus::Canceled) {
            let rows: Vec<Contribution> = contributions
                .find_by_pool(pool.id)
                .await?
                .into_iter()
                .map(Into::into)
                .collect();

            let report = cancellation::unwind_contributions(state.gateway.as_ref(), &rows).await;
            for outcome in &report.outcomes {
                if let Some(status) = outcome.new_status {
                    contributions
                        .update_status(outcome.contribution_id, status)
                        .await?;
                }
                if let Some(ref error) = outcome.error {
                    warn!(
                        contribution_id = %outcome.contribution_id,
                        error = %error,
                        "Contribution left for manual follow-up"
                    );
                }
            }
            refunded_count = report.refunded_count();
            failed_count = report.failed_count();

            pools.update_status(pool.id, "canceled").await?;
            business_metrics::record_pool_canceled(refunded_count);

            notify_contributors_canceled(&state, &ride, &rows).await;
        }
    }

    rides.soft_delete(ride_id).await?;
    info!(
        ride_id = %ride_id,
        refunded = refunded_count,
        failed = failed_count,
        "Ride canceled"
    );

    Ok(Json(CancelRideResponse {
        ride_id,
        refunded_count,
        failed_count,
    }))
}

/// Best-effort cancellation emails to contributors who had money in the pool.
async fn notify_contributors_canceled(state: &AppState, ride: &Ride, rows: &[Contribution]) {
    let profiles = ProfileRepository::new(state.pool.clone());

    for c in rows {
        if !matches!(
            c.status,
            ContributionStatus::Authorized | ContributionStatus::Paid
        ) {
            continue;
        }

        let email = match profiles.find_by_id(c.user_id).await {
            Ok(Some(profile)) => profile.email,
            _ => None,
        };
        let Some(email) = email else { continue };

        if let Err(e) = state
            .email
            .send_pool_canceled(&email, &ride.origin_name, &ride.destination_name)
            .await
        {
            tracing::debug!(user_id = %c.user_id, error = %e, "Cancellation email not sent");
        }
    }
}
