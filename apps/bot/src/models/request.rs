use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    Open,
    /// A response was chosen.
    InProgress,
    /// Closed manually by the owner.
    Closed,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "OPEN",
            RequestStatus::InProgress => "IN_PROGRESS",
            RequestStatus::Closed => "CLOSED",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OPEN" => Ok(RequestStatus::Open),
            "IN_PROGRESS" => Ok(RequestStatus::InProgress),
            "CLOSED" => Ok(RequestStatus::Closed),
            other => anyhow::bail!("unknown request status '{other}'"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub id: Uuid,
    pub details_text: String,
    pub designer_id: Uuid,
    pub status: RequestStatus,
    pub chosen_response_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Request {
    pub fn is_open(&self) -> bool {
        self.status == RequestStatus::Open
    }
}

#[derive(Debug, Clone)]
pub struct NewRequest {
    pub details_text: String,
    pub designer_id: Uuid,
}
