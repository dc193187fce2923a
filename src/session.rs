use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::api::{CareApi, ClientResult};
use crate::config::SessionConfig;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    #[default]
    User,
    Admin,
}

/// Who the API calls are made for. Passed explicitly to every call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub user_id: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub access: AccessLevel,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("no user id configured; pass --user or set [session] user_id")]
    MissingUser,
    #[error("user {0} does not have admin access")]
    NotAdmin(u64),
}

impl Session {
    pub fn new(user_id: u64) -> Self {
        Self {
            user_id,
            username: None,
            access: AccessLevel::User,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Result<Self, SessionError> {
        let user_id = config.user_id.ok_or(SessionError::MissingUser)?;
        Ok(Self {
            user_id,
            username: config.username.clone().filter(|name| !name.trim().is_empty()),
            access: AccessLevel::User,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.access == AccessLevel::Admin
    }

    /// Asks the API whether this user is an admin and records the answer.
    pub async fn resolve_access(mut self, api: &dyn CareApi) -> ClientResult<Self> {
        let admin = api.is_admin(&self).await?;
        debug!("user {} admin={admin}", self.user_id);
        self.access = if admin {
            AccessLevel::Admin
        } else {
            AccessLevel::User
        };
        Ok(self)
    }

    pub fn require_admin(&self) -> Result<(), SessionError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(SessionError::NotAdmin(self.user_id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MemoryCareApi;
    use crate::records::ReferenceData;

    #[test]
    fn missing_user_id_is_reported() {
        let config = SessionConfig::default();
        assert_eq!(Session::from_config(&config), Err(SessionError::MissingUser));
    }

    #[test]
    fn blank_username_is_dropped() {
        let config = SessionConfig {
            user_id: Some(4),
            username: Some("  ".to_string()),
        };
        let session = Session::from_config(&config).expect("session");
        assert_eq!(session.user_id, 4);
        assert_eq!(session.username, None);
        assert!(session.require_admin().is_err());
    }

    #[tokio::test]
    async fn resolves_admin_access_through_the_api() {
        let api = MemoryCareApi::new(ReferenceData::default()).with_admins(vec![1]);
        let admin = Session::new(1).resolve_access(&api).await.expect("resolve");
        assert!(admin.require_admin().is_ok());

        let user = Session::new(2).resolve_access(&api).await.expect("resolve");
        assert_eq!(user.require_admin(), Err(SessionError::NotAdmin(2)));
    }
}
