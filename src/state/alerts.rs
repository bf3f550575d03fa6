//! Pending expiry acknowledgements. An alert stays on the board until an operator dismisses it,
//! which hands the station over to checkout.

use dashmap::DashMap;
use time::OffsetDateTime;
use uuid::Uuid;

/// Who an event is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Audience {
    /// A single named seat.
    Member(String),
    /// Every seat of the station that hit the condition in the same tick.
    Everyone,
}

impl Audience {
    /// Name shown on the acknowledgement dialog.
    pub fn label(&self) -> &str {
        match self {
            Audience::Member(name) => name,
            Audience::Everyone => "everyone",
        }
    }
}

/// Blocking acknowledgement raised when time runs out at a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryAlert {
    pub id: Uuid,
    pub station_id: Uuid,
    pub station_name: String,
    pub audience: Audience,
    pub raised_at: OffsetDateTime,
}

/// Node-local registry of undismissed expiry alerts.
#[derive(Default)]
pub struct AlertBoard {
    pending: DashMap<Uuid, ExpiryAlert>,
}

impl AlertBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new alert and return it.
    pub fn raise(
        &self,
        station_id: Uuid,
        station_name: &str,
        audience: Audience,
        now: OffsetDateTime,
    ) -> ExpiryAlert {
        let alert = ExpiryAlert {
            id: Uuid::new_v4(),
            station_id,
            station_name: station_name.to_string(),
            audience,
            raised_at: now,
        };
        self.pending.insert(alert.id, alert.clone());
        alert
    }

    /// Undismissed alerts, oldest first.
    pub fn pending(&self) -> Vec<ExpiryAlert> {
        let mut alerts: Vec<_> = self
            .pending
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        alerts.sort_by_key(|alert| alert.raised_at);
        alerts
    }

    /// Remove an alert, returning it when it was still pending.
    pub fn dismiss(&self, id: Uuid) -> Option<ExpiryAlert> {
        self.pending.remove(&id).map(|(_, alert)| alert)
    }
}

#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;

    #[test]
    fn dismiss_removes_alert_once() {
        let board = AlertBoard::new();
        let now = OffsetDateTime::UNIX_EPOCH;
        let station = Uuid::new_v4();
        let first = board.raise(station, "PS5", Audience::Everyone, now + Duration::seconds(5));
        let second = board.raise(station, "PS5", Audience::Member("Sam".into()), now);

        assert_eq!(board.pending(), vec![second.clone(), first.clone()]);
        assert_eq!(board.dismiss(first.id), Some(first.clone()));
        assert_eq!(board.dismiss(first.id), None);
        assert_eq!(board.pending(), vec![second]);
    }

    #[test]
    fn everyone_label() {
        assert_eq!(Audience::Everyone.label(), "everyone");
        assert_eq!(Audience::Member("Kim".into()).label(), "Kim");
    }
}
