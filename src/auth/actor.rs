//! The authenticated caller: either a user or an NGO account.

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Author, UserRole};

pub const ONG_ROLE: &str = "ong";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    User,
    Ong,
}

/// Normalized `{id, role}` attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct Actor {
    pub id: Uuid,
    pub kind: ActorKind,
    pub user_role: Option<UserRole>,
    /// For users, the NGO they collaborate with. For NGOs, their own id.
    pub ong_id: Option<Uuid>,
}

impl Actor {
    pub fn user(id: Uuid, role: UserRole, ong_id: Option<Uuid>) -> Self {
        Self {
            id,
            kind: ActorKind::User,
            user_role: Some(role),
            ong_id,
        }
    }

    pub fn ong(id: Uuid) -> Self {
        Self {
            id,
            kind: ActorKind::Ong,
            user_role: None,
            ong_id: Some(id),
        }
    }

    pub fn role(&self) -> &'static str {
        match self.user_role {
            Some(role) => role.as_str(),
            None => ONG_ROLE,
        }
    }

    pub fn is_ong(&self) -> bool {
        self.kind == ActorKind::Ong
    }

    pub fn is_admin(&self) -> bool {
        self.user_role == Some(UserRole::Admin)
    }

    pub fn as_author(&self) -> Author {
        match self.kind {
            ActorKind::User => Author::User(self.id),
            ActorKind::Ong => Author::Ong(self.id),
        }
    }

    /// True for the NGO itself and for collaborators attached to it.
    pub fn manages_ong(&self, ong_id: Uuid) -> bool {
        match self.kind {
            ActorKind::Ong => self.id == ong_id,
            ActorKind::User => {
                self.user_role == Some(UserRole::Collaborator) && self.ong_id == Some(ong_id)
            }
        }
    }

    /// The NGO on whose behalf the actor may manage projects and requests.
    pub fn managed_ong(&self) -> Option<Uuid> {
        match self.kind {
            ActorKind::Ong => Some(self.id),
            ActorKind::User if self.user_role == Some(UserRole::Collaborator) => self.ong_id,
            ActorKind::User => None,
        }
    }

    pub fn require_ong(&self) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
        if self.is_ong() {
            Ok(self.id)
        } else {
            Err(ApiError::forbidden(
                "Apenas ONGs podem realizar esta ação",
                "ONG_REQUIRED",
            ))
        }
    }

    pub fn require_user(&self) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
        if self.kind == ActorKind::User {
            Ok(self.id)
        } else {
            Err(ApiError::forbidden(
                "Apenas usuários podem realizar esta ação",
                "USER_REQUIRED",
            ))
        }
    }

    pub fn require_role(&self, role: UserRole) -> Result<Uuid, (StatusCode, Json<ApiError>)> {
        let id = self.require_user()?;
        if self.user_role == Some(role) {
            Ok(id)
        } else {
            Err(ApiError::forbidden(
                format!("Ação permitida apenas para o perfil {}", role),
                "ROLE_REQUIRED",
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_normalization() {
        let ong = Actor::ong(Uuid::new_v4());
        assert_eq!(ong.role(), "ong");

        let user = Actor::user(Uuid::new_v4(), UserRole::Voluntary, None);
        assert_eq!(user.role(), "VOLUNTARY");
    }

    #[test]
    fn test_manages_ong() {
        let ong_id = Uuid::new_v4();
        let other = Uuid::new_v4();

        assert!(Actor::ong(ong_id).manages_ong(ong_id));
        assert!(!Actor::ong(ong_id).manages_ong(other));

        let collaborator = Actor::user(Uuid::new_v4(), UserRole::Collaborator, Some(ong_id));
        assert!(collaborator.manages_ong(ong_id));
        assert!(!collaborator.manages_ong(other));

        let volunteer = Actor::user(Uuid::new_v4(), UserRole::Voluntary, Some(ong_id));
        assert!(!volunteer.manages_ong(ong_id));
    }

    #[test]
    fn test_managed_ong() {
        let ong_id = Uuid::new_v4();
        assert_eq!(Actor::ong(ong_id).managed_ong(), Some(ong_id));
        assert_eq!(
            Actor::user(Uuid::new_v4(), UserRole::Collaborator, Some(ong_id)).managed_ong(),
            Some(ong_id)
        );
        assert_eq!(
            Actor::user(Uuid::new_v4(), UserRole::Collaborator, None).managed_ong(),
            None
        );
        assert_eq!(
            Actor::user(Uuid::new_v4(), UserRole::Admin, Some(ong_id)).managed_ong(),
            None
        );
    }

    #[test]
    fn test_require_helpers() {
        let ong = Actor::ong(Uuid::new_v4());
        assert!(ong.require_ong().is_ok());
        assert_eq!(ong.require_user().unwrap_err().0, StatusCode::FORBIDDEN);

        let volunteer = Actor::user(Uuid::new_v4(), UserRole::Voluntary, None);
        assert!(volunteer.require_role(UserRole::Voluntary).is_ok());
        assert_eq!(
            volunteer.require_role(UserRole::Collaborator).unwrap_err().0,
            StatusCode::FORBIDDEN
        );
        assert_eq!(volunteer.require_ong().unwrap_err().0, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_as_author() {
        let id = Uuid::new_v4();
        assert_eq!(Actor::ong(id).as_author(), Author::Ong(id));
        assert_eq!(
            Actor::user(id, UserRole::Admin, None).as_author(),
            Author::User(id)
        );
    }
}
