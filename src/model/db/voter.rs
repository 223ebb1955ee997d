use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A registered voter. Owned by the registration subsystem; this crate only
/// ever reads voters, it never creates or modifies them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Voter {
    #[serde(rename = "_id")]
    pub id: Id,
    /// Display name.
    pub name: String,
    /// Hash of the voter's identity document; never the document itself.
    pub document_hash: String,
    pub email: String,
    /// Login credential hash, owned and checked by the upstream
    /// authentication service. Opaque here.
    pub credential_hash: String,
    /// Biometric face template captured at registration. Empty if the voter
    /// registered without a camera.
    pub face_template: Vec<f64>,
    pub status: VoterStatus,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub registered_at: DateTime<Utc>,
}

impl Voter {
    /// May this voter cast votes at all?
    pub fn is_eligible(&self) -> bool {
        self.status == VoterStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoterStatus {
    Active,
    Suspended,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use chrono::Duration;

    use super::*;

    impl Voter {
        pub fn example() -> Self {
            Self {
                id: Id::new(),
                name: "Asha Patel".to_string(),
                document_hash: "2f1e6b9c".to_string(),
                email: "asha@example.com".to_string(),
                credential_hash: "$argon2id$stub".to_string(),
                face_template: vec![0.12, -0.44, 0.87],
                status: VoterStatus::Active,
                registered_at: Utc::now() - Duration::days(30),
            }
        }

        pub fn example_without_template() -> Self {
            Self {
                face_template: Vec::new(),
                email: "no-camera@example.com".to_string(),
                ..Self::example()
            }
        }

        pub fn example_suspended() -> Self {
            Self {
                status: VoterStatus::Suspended,
                email: "suspended@example.com".to_string(),
                ..Self::example()
            }
        }
    }
}
