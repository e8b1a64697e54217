use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A durable 1:1 conversation scoped to one organization.
/// Membership is immutable after creation; a new pair always yields a new row.
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: Uuid,
    pub participant_low: Uuid,
    pub participant_high: Uuid,
    pub organization_code: String,
    pub created_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn participants(&self) -> [Uuid; 2] {
        [self.participant_low, self.participant_high]
    }

    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        if user_id == self.participant_low {
            Some(self.participant_high)
        } else if user_id == self.participant_high {
            Some(self.participant_low)
        } else {
            None
        }
    }
}

/// Normalize a participant pair so lookups are symmetric in the two ids.
pub fn normalize_pair(a: Uuid, b: Uuid) -> (Uuid, Uuid) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_pair_is_symmetric() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(normalize_pair(a, b), normalize_pair(b, a));
    }

    #[test]
    fn normalize_pair_orders_low_first() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (low, high) = normalize_pair(a, b);
        assert!(low <= high);
    }

    #[test]
    fn peer_of_returns_other_participant() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let (low, high) = normalize_pair(a, b);
        let conv = Conversation {
            id: Uuid::new_v4(),
            participant_low: low,
            participant_high: high,
            organization_code: "org-1".into(),
            created_at: Utc::now(),
            last_message_at: Utc::now(),
        };
        assert_eq!(conv.peer_of(low), Some(high));
        assert_eq!(conv.peer_of(high), Some(low));
        assert_eq!(conv.peer_of(Uuid::new_v4()), None);
    }
}
