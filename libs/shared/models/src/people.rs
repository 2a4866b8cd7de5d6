use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// Read-only views of the doctor and patient records owned by the user CRUD surface.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub appointment_fee: f64,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn new(name: &str, email: &str, appointment_fee: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            appointment_fee,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Patient {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl Patient {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            email: email.to_string(),
            is_deleted: false,
            created_at: Utc::now(),
        }
    }
}
