use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::{common::election::ElectionState, mongodb::Id};

/// An election. Owned by the election-management subsystem; read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Election {
    #[serde(rename = "_id")]
    pub id: Id,
    pub title: String,
    pub description: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub end_time: DateTime<Utc>,
}

impl Election {
    /// The election's state at the given instant, derived from the window.
    pub fn state_at(&self, now: DateTime<Utc>) -> ElectionState {
        if now < self.start_time {
            ElectionState::Upcoming
        } else if now <= self.end_time {
            ElectionState::Active
        } else {
            ElectionState::Closed
        }
    }

    /// Is the voting window open at the given instant?
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.state_at(now) == ElectionState::Active
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl Election {
        /// An election whose window is currently open.
        pub fn example_active() -> Self {
            let now = Utc::now();
            Self {
                id: Id::new(),
                title: "Student Union President".to_string(),
                description: "Annual presidential election".to_string(),
                start_time: now - Duration::days(1),
                end_time: now + Duration::days(1),
            }
        }

        /// An election whose window has not opened yet.
        pub fn example_upcoming() -> Self {
            let now = Utc::now();
            Self {
                title: "Next Year's Committee".to_string(),
                start_time: now + Duration::days(10),
                end_time: now + Duration::days(20),
                ..Self::example_active()
            }
        }

        /// An election whose window has closed.
        pub fn example_closed() -> Self {
            let now = Utc::now();
            Self {
                title: "Last Year's Committee".to_string(),
                start_time: now - Duration::days(20),
                end_time: now - Duration::days(10),
                ..Self::example_active()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_follows_window() {
        let now = Utc::now();
        assert_eq!(
            Election::example_upcoming().state_at(now),
            ElectionState::Upcoming
        );
        assert_eq!(
            Election::example_active().state_at(now),
            ElectionState::Active
        );
        assert_eq!(
            Election::example_closed().state_at(now),
            ElectionState::Closed
        );
    }
}
