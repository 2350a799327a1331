//! Payment provider webhook handler.
//!
//! The webhook is the only path that moves a contribution to paid; the
//! checkout redirect is never trusted. Deliveries are verified against the
//! signed header before the payload is parsed, and processing is idempotent
//! because contribution status updates and pool aggregation both converge.

use axum::{extract::State, http::HeaderMap, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use domain::models::{Contribution, ContributionStatus, PoolStatus, PoolTotals, SeatRequest};
use domain::services::booking;
use persistence::repositories::{
    ContributionRepository, PoolRepository, ProfileRepository, RideRepository,
};

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::metrics as business_metrics;
use crate::services::aggregator;
use crate::services::payments::verify_webhook_signature;

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Debug, Deserialize)]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    data: WebhookData,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: WebhookObject,
}

#[derive(Debug, Deserialize)]
struct WebhookObject {
    id: String,
    #[serde(default)]
    metadata: WebhookMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct WebhookMetadata {
    contribution_id: Option<Uuid>,
}

/// Receive a signed provider webhook.
///
/// POST /api/v1/payments/webhook
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Validation("Missing signature header".into()))?;

    verify_webhook_signature(
        &body,
        signature,
        &state.config.payments.webhook_secrets,
        state.config.payments.webhook_tolerance_secs,
        Utc::now().timestamp(),
    )
    .map_err(|e| ApiError::Validation(e.to_string()))?;

    let event: WebhookEvent = serde_json::from_str(&body)
        .map_err(|e| ApiError::Validation(format!("Malformed webhook payload: {}", e)))?;

    match event.event_type.as_str() {
        "checkout.session.completed" => {
            handle_session_completed(&state, &event.data.object).await?;
        }
        "checkout.session.expired" => {
            handle_session_expired(&state, &event.data.object).await?;
        }
        other => {
            // Unsubscribed event types are acknowledged so the provider
            // stops retrying them.
            info!(event_type = other, "Ignoring webhook event");
        }
    }

    Ok(Json(json!({ "received": true })))
}

async fn find_contribution(
    state: &AppState,
    object: &WebhookObject,
) -> Result<Option<Contribution>, ApiError> {
    let contributions = ContributionRepository::new(state.pool.clone());

    if let Some(entity) = contributions.find_by_payment_ref(&object.id).await? {
        return Ok(Some(entity.into()));
    }

    // The payment_ref may never have been written if the process died between
    // session creation and the UPDATE; the session metadata carries the ID.
    if let Some(contribution_id) = object.metadata.contribution_id {
        return Ok(contributions
            .find_by_id(contribution_id)
            .await?
            .map(Into::into));
    }

    Ok(None)
}

async fn handle_session_completed(
    state: &AppState,
    object: &WebhookObject,
) -> Result<(), ApiError> {
    let Some(found) = find_contribution(state, object).await? else {
        warn!(session_id = %object.id, "Completed session matches no contribution");
        return Ok(());
    };

    let pools = PoolRepository::new(state.pool.clone());
    let Some(pool_entity) = pools.find_by_id(found.pool_id).await? else {
        return Ok(());
    };
    let pool = domain::models::RidePool::from(pool_entity);

    // Paid-marking changes capacity, so it serializes with seat locks and
    // the other pool mutations for this ride.
    let lock = state.ride_locks.for_ride(pool.ride_id);
    let _guard = lock.lock().await;

    let contributions = ContributionRepository::new(state.pool.clone());
    let Some(contribution) = find_contribution(state, object).await? else {
        return Ok(());
    };

    if !matches!(
        contribution.status,
        ContributionStatus::Pending | ContributionStatus::Authorized
    ) {
        // Duplicate delivery or a contribution already unwound.
        info!(
            contribution_id = %contribution.id,
            status = %contribution.status,
            "Ignoring completed session for settled contribution"
        );
        return Ok(());
    }

    if !paid_capacity_holds(state, &pool, &contribution).await? {
        warn!(
            contribution_id = %contribution.id,
            pool_id = %pool.id,
            "Pool filled before payment completed, refunding"
        );
        if let Some(ref payment_ref) = contribution.payment_ref {
            match state.gateway.refund(payment_ref).await {
                Ok(()) => {
                    contributions
                        .update_status(contribution.id, "refunded")
                        .await?;
                }
                Err(e) => {
                    // Left pending for the expiry job and manual follow-up.
                    warn!(contribution_id = %contribution.id, error = %e, "Refund failed");
                }
            }
        }
        return Ok(());
    }

    contributions
        .update_status(contribution.id, "paid")
        .await?
        .ok_or_else(|| ApiError::NotFound("Contribution not found".into()))?;
    business_metrics::record_contribution_paid();
    info!(
        contribution_id = %contribution.id,
        pool_id = %contribution.pool_id,
        "Contribution paid"
    );

    let updated = aggregator::recalc_pool(&pools, &contributions, contribution.pool_id).await?;

    if updated.status == PoolStatus::Bookable && pool.status != PoolStatus::Bookable {
        notify_host_bookable(state, &updated).await;
    }

    Ok(())
}

/// Re-checks that the contribution still fits the vehicle now that earlier
/// payments may have landed.
async fn paid_capacity_holds(
    state: &AppState,
    pool: &domain::models::RidePool,
    contribution: &Contribution,
) -> Result<bool, ApiError> {
    let rides = RideRepository::new(state.pool.clone());
    let Some(ride_entity) = rides.find_by_id(pool.ride_id).await? else {
        return Ok(false);
    };
    let ride = domain::models::Ride::from(ride_entity);

    let contributions = ContributionRepository::new(state.pool.clone());
    let rows: Vec<Contribution> = contributions
        .find_by_pool(pool.id)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    let paid = PoolTotals::from_contributions(&rows);
    let remaining = booking::remaining_capacity(&ride, &paid);

    let request = SeatRequest {
        seats: contribution.seats,
        backpacks: contribution.backpacks,
        small_items: contribution.small_items,
        large_items: contribution.large_items,
    };
    Ok(booking::validate_seat_request(&request, &remaining).is_ok())
}

async fn handle_session_expired(state: &AppState, object: &WebhookObject) -> Result<(), ApiError> {
    let Some(contribution) = find_contribution(state, object).await? else {
        return Ok(());
    };

    if contribution.status != ContributionStatus::Pending {
        return Ok(());
    }

    let contributions = ContributionRepository::new(state.pool.clone());
    contributions
        .update_status(contribution.id, "canceled")
        .await?
        .ok_or_else(|| ApiError::NotFound("Contribution not found".into()))?;
    info!(
        contribution_id = %contribution.id,
        "Seat lock released after expired checkout"
    );

    let pools = PoolRepository::new(state.pool.clone());
    aggregator::recalc_pool(&pools, &contributions, contribution.pool_id).await?;

    Ok(())
}

/// Best-effort email to the host when the pool first reaches quorum.
async fn notify_host_bookable(state: &AppState, pool: &domain::models::RidePool) {
    let rides = RideRepository::new(state.pool.clone());
    let ride = match rides.find_by_id(pool.ride_id).await {
        Ok(Some(entity)) => domain::models::Ride::from(entity),
        _ => return,
    };

    let profiles = ProfileRepository::new(state.pool.clone());
    let email = match profiles.find_by_id(ride.host_user_id).await {
        Ok(Some(profile)) => profile.email,
        _ => None,
    };
    let Some(email) = email else { return };

    if let Err(e) = state
        .email
        .send_pool_bookable(&email, &ride.origin_name, &ride.destination_name)
        .await
    {
        tracing::debug!(pool_id = %pool.id, error = %e, "Bookable email not sent");
    }
}
