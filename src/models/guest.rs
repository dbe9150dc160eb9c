use super::career::{CareerResult, ProfileAnswers};
use mongodb::bson::{oid::ObjectId, DateTime as BsonDateTime};
use serde::{Deserialize, Serialize};

/// Free AI predictions granted to a guest session.
pub const MAX_GUEST_PREDICTIONS: i32 = 3;

/// Document in the "guests" collection
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Guest {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub guest_id: String,
    pub created_at: BsonDateTime,
    pub last_active: BsonDateTime,
    #[serde(default)]
    pub predictions_count: i32,
    #[serde(default)]
    pub predictions: Vec<PredictionRecord>,
}

impl Guest {
    pub fn new(guest_id: String) -> Self {
        let now = BsonDateTime::now();
        Self {
            id: None,
            guest_id,
            created_at: now,
            last_active: now,
            predictions_count: 0,
            predictions: Vec::new(),
        }
    }

    pub fn limit_reached(&self) -> bool {
        self.predictions_count >= MAX_GUEST_PREDICTIONS
    }

    pub fn remaining_predictions(&self) -> i32 {
        (MAX_GUEST_PREDICTIONS - self.predictions_count).max(0)
    }
}

/// One past suggestion kept on the guest document.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PredictionRecord {
    #[serde(flatten)]
    pub answers: ProfileAnswers,
    pub result: CareerResult,
    pub created_at: BsonDateTime,
}

/// API view of a `PredictionRecord`.
#[derive(Debug, Serialize, Clone, utoipa::ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PredictionView {
    pub answers: ProfileAnswers,
    pub result: CareerResult,
    pub created_at: String,
}

impl From<&PredictionRecord> for PredictionView {
    fn from(record: &PredictionRecord) -> Self {
        Self {
            answers: record.answers.clone(),
            result: record.result.clone(),
            created_at: record
                .created_at
                .try_to_rfc3339_string()
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_guest_has_full_allowance() {
        let guest = Guest::new("g1".to_string());
        assert_eq!(guest.predictions_count, 0);
        assert!(!guest.limit_reached());
        assert_eq!(guest.remaining_predictions(), MAX_GUEST_PREDICTIONS);
    }

    #[test]
    fn test_limit_reached_at_cap() {
        let mut guest = Guest::new("g1".to_string());
        guest.predictions_count = MAX_GUEST_PREDICTIONS;
        assert!(guest.limit_reached());
        assert_eq!(guest.remaining_predictions(), 0);
    }
}
