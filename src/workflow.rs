//! Status transitions for NGO invitations and volunteer requests.
//!
//! Handlers read the current row, ask this module what to do and then write
//! the outcome. Keeping the decisions here makes the rules testable without
//! a database.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InviteStatus {
    InvitePendingOngToUser,
    Accepted,
    RejectedByUser,
}

impl InviteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InviteStatus::InvitePendingOngToUser => "INVITE_PENDING_ONG_TO_USER",
            InviteStatus::Accepted => "ACCEPTED",
            InviteStatus::RejectedByUser => "REJECTED_BY_USER",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "INVITE_PENDING_ONG_TO_USER" => Some(InviteStatus::InvitePendingOngToUser),
            "ACCEPTED" => Some(InviteStatus::Accepted),
            "REJECTED_BY_USER" => Some(InviteStatus::RejectedByUser),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    RequestPendingUserToOng,
    Accepted,
    RejectedByOng,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::RequestPendingUserToOng => "REQUEST_PENDING_USER_TO_ONG",
            RequestStatus::Accepted => "ACCEPTED",
            RequestStatus::RejectedByOng => "REJECTED_BY_ONG",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "REQUEST_PENDING_USER_TO_ONG" => Some(RequestStatus::RequestPendingUserToOng),
            "ACCEPTED" => Some(RequestStatus::Accepted),
            "REJECTED_BY_ONG" => Some(RequestStatus::RejectedByOng),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject,
}

impl Decision {
    pub fn from_accept(accept: bool) -> Self {
        if accept {
            Decision::Accept
        } else {
            Decision::Reject
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowError {
    NotCollaborator,
    AlreadyInOng,
    AlreadyInvited,
    AlreadyResponded,
    AlreadyRequested,
    AlreadyVolunteer,
    NotPending,
}

impl WorkflowError {
    pub fn message(&self) -> &'static str {
        match self {
            WorkflowError::NotCollaborator => "Apenas usuários colaboradores podem ser convidados",
            WorkflowError::AlreadyInOng => "O usuário já está associado a uma ONG",
            WorkflowError::AlreadyInvited => "Já existe um convite para este usuário",
            WorkflowError::AlreadyResponded => "Esta solicitação já foi respondida",
            WorkflowError::AlreadyRequested => "Você já solicitou participação neste projeto",
            WorkflowError::AlreadyVolunteer => "Você já é voluntário neste projeto",
            WorkflowError::NotPending => "Apenas solicitações pendentes podem ser canceladas",
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::NotCollaborator => "NOT_COLLABORATOR",
            WorkflowError::AlreadyInOng => "ALREADY_IN_ONG",
            WorkflowError::AlreadyInvited => "ALREADY_INVITED",
            WorkflowError::AlreadyResponded => "ALREADY_RESPONDED",
            WorkflowError::AlreadyRequested => "ALREADY_REQUESTED",
            WorkflowError::AlreadyVolunteer => "ALREADY_VOLUNTEER",
            WorkflowError::NotPending => "NOT_PENDING",
        }
    }

    /// Eligibility problems are the caller's input; everything else is a
    /// conflict with the stored state.
    pub fn is_bad_request(&self) -> bool {
        matches!(self, WorkflowError::NotCollaborator)
    }
}

impl std::fmt::Display for WorkflowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for WorkflowError {}

/// Checks whether an NGO may invite the given user.
pub fn check_invite(
    target_role: UserRole,
    target_ong_id: Option<Uuid>,
    existing: Option<InviteStatus>,
) -> Result<(), WorkflowError> {
    if target_role != UserRole::Collaborator {
        return Err(WorkflowError::NotCollaborator);
    }
    if target_ong_id.is_some() {
        return Err(WorkflowError::AlreadyInOng);
    }
    if existing.is_some() {
        return Err(WorkflowError::AlreadyInvited);
    }
    Ok(())
}

pub fn respond_to_invite(
    current: InviteStatus,
    decision: Decision,
) -> Result<InviteStatus, WorkflowError> {
    if current != InviteStatus::InvitePendingOngToUser {
        return Err(WorkflowError::AlreadyResponded);
    }
    Ok(match decision {
        Decision::Accept => InviteStatus::Accepted,
        Decision::Reject => InviteStatus::RejectedByUser,
    })
}

pub fn check_invite_withdrawal(current: InviteStatus) -> Result<(), WorkflowError> {
    match current {
        InviteStatus::InvitePendingOngToUser => Ok(()),
        _ => Err(WorkflowError::NotPending),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPlan {
    Create,
    Resubmit,
}

/// Decides what a new volunteer request does given any earlier request by
/// the same user for the same project.
pub fn plan_volunteer_request(existing: Option<RequestStatus>) -> Result<RequestPlan, WorkflowError> {
    match existing {
        None => Ok(RequestPlan::Create),
        Some(RequestStatus::RejectedByOng) => Ok(RequestPlan::Resubmit),
        Some(RequestStatus::RequestPendingUserToOng) => Err(WorkflowError::AlreadyRequested),
        Some(RequestStatus::Accepted) => Err(WorkflowError::AlreadyVolunteer),
    }
}

pub fn respond_to_request(
    current: RequestStatus,
    decision: Decision,
) -> Result<RequestStatus, WorkflowError> {
    if current != RequestStatus::RequestPendingUserToOng {
        return Err(WorkflowError::AlreadyResponded);
    }
    Ok(match decision {
        Decision::Accept => RequestStatus::Accepted,
        Decision::Reject => RequestStatus::RejectedByOng,
    })
}

pub fn check_request_cancellation(current: RequestStatus) -> Result<(), WorkflowError> {
    match current {
        RequestStatus::RequestPendingUserToOng => Ok(()),
        _ => Err(WorkflowError::NotPending),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_strings_round_trip() {
        for status in [
            InviteStatus::InvitePendingOngToUser,
            InviteStatus::Accepted,
            InviteStatus::RejectedByUser,
        ] {
            assert_eq!(InviteStatus::parse(status.as_str()), Some(status));
        }
        for status in [
            RequestStatus::RequestPendingUserToOng,
            RequestStatus::Accepted,
            RequestStatus::RejectedByOng,
        ] {
            assert_eq!(RequestStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(InviteStatus::parse("REJECTED_BY_ONG"), None);
        assert_eq!(RequestStatus::parse("REJECTED_BY_USER"), None);
    }

    #[test]
    fn test_status_serde_matches_column_values() {
        let json = serde_json::to_string(&InviteStatus::InvitePendingOngToUser).unwrap();
        assert_eq!(json, "\"INVITE_PENDING_ONG_TO_USER\"");
        let parsed: RequestStatus = serde_json::from_str("\"REJECTED_BY_ONG\"").unwrap();
        assert_eq!(parsed, RequestStatus::RejectedByOng);
    }

    #[test]
    fn test_invite_requires_collaborator() {
        assert_eq!(
            check_invite(UserRole::Voluntary, None, None),
            Err(WorkflowError::NotCollaborator)
        );
        assert_eq!(
            check_invite(UserRole::Admin, None, None),
            Err(WorkflowError::NotCollaborator)
        );
        assert!(check_invite(UserRole::Collaborator, None, None).is_ok());
    }

    #[test]
    fn test_invite_rejects_user_already_in_ong() {
        assert_eq!(
            check_invite(UserRole::Collaborator, Some(Uuid::new_v4()), None),
            Err(WorkflowError::AlreadyInOng)
        );
    }

    #[test]
    fn test_invite_rejects_any_existing_relation() {
        for existing in [
            InviteStatus::InvitePendingOngToUser,
            InviteStatus::Accepted,
            InviteStatus::RejectedByUser,
        ] {
            assert_eq!(
                check_invite(UserRole::Collaborator, None, Some(existing)),
                Err(WorkflowError::AlreadyInvited)
            );
        }
    }

    #[test]
    fn test_invite_transitions_only_from_pending() {
        let pending = InviteStatus::InvitePendingOngToUser;
        assert_eq!(
            respond_to_invite(pending, Decision::Accept),
            Ok(InviteStatus::Accepted)
        );
        assert_eq!(
            respond_to_invite(pending, Decision::Reject),
            Ok(InviteStatus::RejectedByUser)
        );
        for done in [InviteStatus::Accepted, InviteStatus::RejectedByUser] {
            assert_eq!(
                respond_to_invite(done, Decision::Accept),
                Err(WorkflowError::AlreadyResponded)
            );
            assert_eq!(
                respond_to_invite(done, Decision::Reject),
                Err(WorkflowError::AlreadyResponded)
            );
        }
    }

    #[test]
    fn test_invite_withdrawal() {
        assert!(check_invite_withdrawal(InviteStatus::InvitePendingOngToUser).is_ok());
        assert_eq!(
            check_invite_withdrawal(InviteStatus::Accepted),
            Err(WorkflowError::NotPending)
        );
    }

    #[test]
    fn test_volunteer_request_plan() {
        assert_eq!(plan_volunteer_request(None), Ok(RequestPlan::Create));
        assert_eq!(
            plan_volunteer_request(Some(RequestStatus::RejectedByOng)),
            Ok(RequestPlan::Resubmit)
        );
        assert_eq!(
            plan_volunteer_request(Some(RequestStatus::RequestPendingUserToOng)),
            Err(WorkflowError::AlreadyRequested)
        );
        assert_eq!(
            plan_volunteer_request(Some(RequestStatus::Accepted)),
            Err(WorkflowError::AlreadyVolunteer)
        );
    }

    #[test]
    fn test_request_transitions_only_from_pending() {
        let pending = RequestStatus::RequestPendingUserToOng;
        assert_eq!(
            respond_to_request(pending, Decision::Accept),
            Ok(RequestStatus::Accepted)
        );
        assert_eq!(
            respond_to_request(pending, Decision::Reject),
            Ok(RequestStatus::RejectedByOng)
        );
        assert_eq!(
            respond_to_request(RequestStatus::Accepted, Decision::Reject),
            Err(WorkflowError::AlreadyResponded)
        );
        assert_eq!(
            respond_to_request(RequestStatus::RejectedByOng, Decision::Accept),
            Err(WorkflowError::AlreadyResponded)
        );
    }

    #[test]
    fn test_request_cancellation() {
        assert!(check_request_cancellation(RequestStatus::RequestPendingUserToOng).is_ok());
        assert_eq!(
            check_request_cancellation(RequestStatus::RejectedByOng),
            Err(WorkflowError::NotPending)
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(WorkflowError::NotCollaborator.is_bad_request());
        assert!(!WorkflowError::AlreadyResponded.is_bad_request());
        assert_eq!(WorkflowError::AlreadyInvited.code(), "ALREADY_INVITED");
    }

    #[test]
    fn test_decision_from_accept() {
        assert_eq!(Decision::from_accept(true), Decision::Accept);
        assert_eq!(Decision::from_accept(false), Decision::Reject);
    }
}
