//! Durable records that a subject satisfied a session's attendance requirement.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::types::{RedemptionId, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RedemptionMethod {
    /// The subject presented the session's current token.
    Qr,
    /// The session owner set presence directly.
    Manual,
}

impl RedemptionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionMethod::Qr => "qr",
            RedemptionMethod::Manual => "manual",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate, ToSchema)]
pub struct GeoPoint {
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Redemption {
    #[schema(value_type = String)]
    pub id: RedemptionId,
    #[schema(value_type = String)]
    pub session_id: SessionId,
    #[schema(value_type = String)]
    pub subject_id: UserId,
    pub present: bool,
    pub method: RedemptionMethod,
    pub redeemed_at: DateTime<Utc>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Redemption {
    pub fn geo(&self) -> Option<GeoPoint> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint {
                latitude,
                longitude,
            }),
            _ => None,
        }
    }

    /// Builds the record an upsert inserts when no row exists for the pair yet.
    pub fn from_upsert(upsert: &RedemptionUpsert) -> Self {
        Self {
            id: RedemptionId::new(),
            session_id: upsert.session_id,
            subject_id: upsert.subject_id,
            present: upsert.present,
            method: upsert.method,
            redeemed_at: upsert.occurred_at,
            latitude: upsert.geo.map(|g| g.latitude),
            longitude: upsert.geo.map(|g| g.longitude),
            notes: upsert.notes.clone(),
            created_at: upsert.occurred_at,
            updated_at: upsert.occurred_at,
        }
    }

    /// Applies a later upsert for the same (session, subject) pair in place.
    pub fn apply_upsert(&mut self, upsert: &RedemptionUpsert) {
        self.present = upsert.present;
        self.method = upsert.method;
        self.redeemed_at = upsert.occurred_at;
        if let Some(geo) = upsert.geo {
            self.latitude = Some(geo.latitude);
            self.longitude = Some(geo.longitude);
        }
        if upsert.notes.is_some() {
            self.notes = upsert.notes.clone();
        }
        self.updated_at = upsert.occurred_at;
    }
}

/// Write applied by the ledger, keyed by (session_id, subject_id).
#[derive(Debug, Clone)]
pub struct RedemptionUpsert {
    pub session_id: SessionId,
    pub subject_id: UserId,
    pub present: bool,
    pub method: RedemptionMethod,
    pub occurred_at: DateTime<Utc>,
    pub geo: Option<GeoPoint>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub redemption: Redemption,
    /// True when the upsert inserted the row rather than updating it.
    pub created: bool,
    /// True for the one write that first marked the subject present.
    pub first_present: bool,
}

/// Redemption joined with the subject's display fields, for exports.
#[derive(Debug, Clone, FromRow)]
pub struct RedemptionExportRow {
    pub full_name: String,
    pub roll_number: Option<String>,
    pub present: bool,
    pub method: RedemptionMethod,
    pub redeemed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct RedeemRequest {
    #[validate(length(min = 1, max = 256))]
    pub token: String,
    #[validate(nested)]
    pub geo: Option<GeoPoint>,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ManualOverrideRequest {
    pub present: bool,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RedemptionResponse {
    pub redemption: Redemption,
    /// Redeemed count of the session after this call.
    pub redeemed_count: i32,
    /// False when an existing record was updated in place.
    pub created: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn upsert(at: DateTime<Utc>, method: RedemptionMethod) -> RedemptionUpsert {
        RedemptionUpsert {
            session_id: SessionId::new(),
            subject_id: UserId::new(),
            present: true,
            method,
            occurred_at: at,
            geo: Some(GeoPoint {
                latitude: 35.0,
                longitude: 139.0,
            }),
            notes: None,
        }
    }

    #[test]
    fn apply_upsert_updates_timestamp_and_keeps_known_geo() {
        let first_at = Utc::now();
        let first = upsert(first_at, RedemptionMethod::Qr);
        let mut record = Redemption::from_upsert(&first);

        let mut later = first.clone();
        later.occurred_at = first_at + Duration::minutes(5);
        later.geo = None;
        later.method = RedemptionMethod::Manual;
        later.present = false;
        record.apply_upsert(&later);

        assert_eq!(record.redeemed_at, first_at + Duration::minutes(5));
        assert_eq!(record.created_at, first_at);
        assert_eq!(record.method, RedemptionMethod::Manual);
        assert!(!record.present);
        assert_eq!(record.geo().map(|g| g.latitude), Some(35.0));
    }

    #[test]
    fn method_serializes_snake_case() {
        assert_eq!(serde_json::to_value(RedemptionMethod::Manual).unwrap(), "manual");
        assert_eq!(RedemptionMethod::Qr.as_str(), "qr");
    }
}
