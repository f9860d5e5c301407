use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{AppError, UserId};

/// Kind of principal behind an audited action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// An authenticated end user.
    User,
    /// Scheduled or internal processing with no user behind it.
    System,
}

impl ActorType {
    /// Returns the storage string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
        }
    }
}

impl FromStr for ActorType {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "system" => Ok(Self::System),
            _ => Err(AppError::Validation(format!("unknown actor type '{value}'"))),
        }
    }
}

/// Already-authenticated caller information passed into audited operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    user_id: Option<UserId>,
    actor_type: ActorType,
    ip_address: Option<String>,
    user_agent: Option<String>,
}

impl Actor {
    /// Creates an actor for an authenticated user.
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            actor_type: ActorType::User,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Creates the system actor used by scheduled sweeps.
    #[must_use]
    pub fn system() -> Self {
        Self {
            user_id: None,
            actor_type: ActorType::System,
            ip_address: None,
            user_agent: None,
        }
    }

    /// Attaches request origin details.
    #[must_use]
    pub fn with_origin(mut self, ip_address: Option<String>, user_agent: Option<String>) -> Self {
        self.ip_address = ip_address;
        self.user_agent = user_agent;
        self
    }

    /// Returns the user behind the action, if any.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    /// Returns the actor kind.
    #[must_use]
    pub fn actor_type(&self) -> ActorType {
        self.actor_type
    }

    /// Returns the caller IP address, if known.
    #[must_use]
    pub fn ip_address(&self) -> Option<&str> {
        self.ip_address.as_deref()
    }

    /// Returns the caller user agent, if known.
    #[must_use]
    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_actor_has_no_user() {
        let actor = Actor::system().with_origin(Some("10.0.0.1".to_owned()), None);
        assert_eq!(actor.user_id(), None);
        assert_eq!(actor.actor_type(), ActorType::System);
        assert_eq!(actor.ip_address(), Some("10.0.0.1"));
    }

    #[test]
    fn actor_type_parses_storage_values() {
        assert!(matches!(ActorType::from_str("user"), Ok(ActorType::User)));
        assert!(matches!(
            ActorType::from_str("robot"),
            Err(AppError::Validation(_))
        ));
    }
}
