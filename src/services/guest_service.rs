use crate::{
    database::MongoDB,
    middleware::auth::RequestIdentity,
    models::{CareerResult, Guest, PredictionRecord, PredictionView, ProfileAnswers, MAX_GUEST_PREDICTIONS},
    utils::AppError,
};
use mongodb::bson::{self, doc, DateTime as BsonDateTime};
use mongodb::options::ReturnDocument;
use serde::Serialize;

pub const LIMIT_REACHED_MESSAGE: &str =
    "Guest prediction limit reached. Please sign up for unlimited predictions.";

#[derive(Debug, Serialize, PartialEq, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestCheckResponse {
    pub is_guest: bool,
    pub guest_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, utoipa::ToSchema)]
pub struct PredictionsCountResponse {
    pub count: i32,
}

#[derive(Debug, Serialize, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GuestHistory {
    pub predictions: Vec<PredictionView>,
    pub remaining_predictions: i32,
}

/// A guest session to hand back to the client.
#[derive(Debug, Clone, PartialEq)]
pub struct GuestSession {
    pub guest_id: String,
    pub created: bool,
}

pub fn new_guest_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Starts a guest session, or reuses the one the request already carries.
pub async fn create_session(db: &MongoDB, identity: &RequestIdentity) -> Result<GuestSession, AppError> {
    match identity {
        RequestIdentity::User(claims) => {
            return Err(AppError::Conflict(format!(
                "Already signed in as {}",
                claims.username
            )));
        }
        RequestIdentity::Guest(guest_id) => {
            if db.guests().find_one(doc! { "guest_id": guest_id }).await?.is_some() {
                db.guests()
                    .update_one(
                        doc! { "guest_id": guest_id },
                        doc! { "$set": { "last_active": BsonDateTime::now() } },
                    )
                    .await?;
                return Ok(GuestSession {
                    guest_id: guest_id.clone(),
                    created: false,
                });
            }
        }
        RequestIdentity::Anonymous => {}
    }

    let guest = Guest::new(new_guest_id());
    db.guests().insert_one(&guest).await?;
    log::info!("👤 Guest session created: {}", guest.guest_id);

    Ok(GuestSession {
        guest_id: guest.guest_id,
        created: true,
    })
}

pub fn check(identity: &RequestIdentity) -> GuestCheckResponse {
    match identity {
        RequestIdentity::Guest(guest_id) => GuestCheckResponse {
            is_guest: true,
            guest_id: Some(guest_id.clone()),
        },
        _ => GuestCheckResponse {
            is_guest: false,
            guest_id: None,
        },
    }
}

/// Predictions used so far; 0 without a guest cookie or for an unknown guest.
pub async fn predictions_count(db: &MongoDB, identity: &RequestIdentity) -> Result<i32, AppError> {
    let RequestIdentity::Guest(guest_id) = identity else {
        return Ok(0);
    };

    let guest = db.guests().find_one(doc! { "guest_id": guest_id }).await?;
    Ok(guest.map(|g| g.predictions_count).unwrap_or(0))
}

/// Consumes one prediction from the guest's allowance and returns the new count.
///
/// The increment is conditional on the count being under the cap, so concurrent
/// requests can never push it past `MAX_GUEST_PREDICTIONS`. An id with no
/// record yet is created with its first prediction already counted.
pub async fn reserve_prediction(db: &MongoDB, guest_id: &str) -> Result<i32, AppError> {
    let guests = db.guests();

    for _ in 0..2 {
        let updated = guests
            .find_one_and_update(
                doc! {
                    "guest_id": guest_id,
                    "predictions_count": { "$lt": MAX_GUEST_PREDICTIONS },
                },
                doc! {
                    "$inc": { "predictions_count": 1 },
                    "$set": { "last_active": BsonDateTime::now() },
                },
            )
            .return_document(ReturnDocument::After)
            .await?;

        if let Some(guest) = updated {
            return Ok(guest.predictions_count);
        }

        if let Some(guest) = guests.find_one(doc! { "guest_id": guest_id }).await? {
            if guest.limit_reached() {
                log::warn!("🚫 Guest {} reached the prediction limit", guest_id);
                return Err(AppError::LimitReached(LIMIT_REACHED_MESSAGE.to_string()));
            }
            continue;
        }

        let now = BsonDateTime::now();
        let upsert = guests
            .update_one(
                doc! { "guest_id": guest_id },
                doc! {
                    "$setOnInsert": {
                        "created_at": now,
                        "predictions_count": 1,
                        "predictions": [],
                    },
                    "$set": { "last_active": now },
                },
            )
            .upsert(true)
            .await?;

        if upsert.upserted_id.is_some() {
            log::info!("👤 Guest record created on first prediction: {}", guest_id);
            return Ok(1);
        }
        // Another request created the record first; go back to the conditional increment
    }

    Err(AppError::Internal(format!(
        "Could not reserve a prediction for guest {}",
        guest_id
    )))
}

pub async fn record_prediction(
    db: &MongoDB,
    guest_id: &str,
    answers: &ProfileAnswers,
    result: &CareerResult,
) -> Result<(), AppError> {
    let now = BsonDateTime::now();
    let record = PredictionRecord {
        answers: answers.clone(),
        result: result.clone(),
        created_at: now,
    };

    db.guests()
        .update_one(
            doc! { "guest_id": guest_id },
            doc! {
                "$push": { "predictions": bson::to_bson(&record)? },
                "$set": { "last_active": now },
            },
        )
        .await?;

    Ok(())
}

pub async fn history(db: &MongoDB, identity: &RequestIdentity) -> Result<GuestHistory, AppError> {
    let RequestIdentity::Guest(guest_id) = identity else {
        return Err(AppError::Unauthorized("No guest session".to_string()));
    };

    let guest = db
        .guests()
        .find_one(doc! { "guest_id": guest_id })
        .await?
        .ok_or_else(|| AppError::NotFound("Guest session not found".to_string()))?;

    Ok(GuestHistory {
        predictions: guest.predictions.iter().map(PredictionView::from).collect(),
        remaining_predictions: guest.remaining_predictions(),
    })
}
