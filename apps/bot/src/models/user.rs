use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Pending,
    Designer,
    Supplier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Pending => "PENDING",
            Role::Designer => "DESIGNER",
            Role::Supplier => "SUPPLIER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Role::Pending),
            "DESIGNER" => Ok(Role::Designer),
            "SUPPLIER" => Ok(Role::Supplier),
            other => anyhow::bail!("unknown role '{other}'"),
        }
    }
}

/// Internal profile of somebody who talked to the bot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: Uuid,
    /// Chat the transport delivers to. Users created by moderators may have none.
    pub external_chat_id: Option<i64>,
    pub role: Role,
    pub is_confirmed: bool,
    pub contact_info: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A confirmed user with a chosen role may act in that role.
    pub fn acts_as(&self, role: Role) -> bool {
        self.is_confirmed && self.role == role && role != Role::Pending
    }

    pub fn contact_or_placeholder(&self) -> &str {
        self.contact_info
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("Не указаны")
    }
}

/// Partial profile update applied during onboarding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub role: Option<Role>,
    pub contact_info: Option<String>,
}
