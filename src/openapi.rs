//! OpenAPI document and Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::handlers::{
    activities, auth, contributions, health, invites, ongs, posts, projects, search, users,
    volunteer_requests,
};
use crate::pagination::PageMeta;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Colabora API",
        version = "1.0.0",
        description = "Backend of the Colabora platform, connecting NGOs, volunteers and collaborators.\n\n\
        ## Accounts\n\
        Users (ADMIN, COLLABORATOR, VOLUNTARY) and NGOs log in through the same endpoint. \
        The returned token identifies either kind of account.\n\n\
        ## Authentication\n\
        Send the token as `Authorization: Bearer <token>`. Endpoints marked with a lock require it.\n\n\
        ## Errors\n\
        Failures return `{\"error\": <message>, \"code\": <CODE>}` with messages in Portuguese.",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Authentication", description = "Login, current account and password reset"),
        (name = "Users", description = "Volunteer, collaborator and admin accounts"),
        (name = "Ongs", description = "NGO accounts and their collaborators"),
        (name = "Projects", description = "Projects run by NGOs"),
        (name = "Volunteer requests", description = "Requests to volunteer in a project"),
        (name = "Invites", description = "NGO invitations to collaborators"),
        (name = "Posts", description = "Social feed, likes and comments"),
        (name = "Activities", description = "Feed of likes and comments"),
        (name = "Contributions", description = "Volunteering records and NGO feedback"),
        (name = "Search", description = "Name search and filter options"),
        (name = "Lookups", description = "CNPJ and CEP registry lookups")
    ),
    paths(
        health::health_check_simple,
        health::health_check,
        health::ready_check,
        health::live_check,

        auth::login,
        auth::me,
        auth::forgot_password,
        auth::reset_password,

        users::create_user,
        users::list_users,
        users::get_user,
        users::update_user,
        users::delete_user,
        users::list_user_contributions,

        ongs::create_ong,
        ongs::list_ongs,
        ongs::get_ong,
        ongs::update_ong,
        ongs::delete_ong,
        ongs::list_ong_projects,
        ongs::list_collaborators,
        ongs::remove_collaborator,

        projects::create_project,
        projects::list_projects,
        projects::get_project,
        projects::update_project,
        projects::delete_project,
        projects::list_volunteers,

        volunteer_requests::request_volunteer,
        volunteer_requests::list_volunteer_requests,
        volunteer_requests::respond_to_volunteer_request,
        volunteer_requests::cancel_volunteer_request,

        invites::create_invite,
        invites::list_invites,
        invites::respond_to_invite,
        invites::withdraw_invite,

        posts::create_post,
        posts::list_posts,
        posts::get_post,
        posts::delete_post,
        posts::like_post,
        posts::unlike_post,
        posts::create_comment,
        posts::list_comments,
        posts::delete_comment,

        activities::list_activities,
        activities::list_my_activities,

        contributions::create_contribution,
        contributions::list_contributions,
        contributions::get_contribution,
        contributions::give_feedback,
        contributions::delete_contribution,

        search::search,
        search::filters,

        crate::handlers::lookups::lookup_cnpj,
        crate::handlers::lookups::lookup_cep,
    ),
    components(
        schemas(
            ApiError,
            PageMeta,

            crate::models::User,
            crate::models::UserRole,
            crate::models::Ong,
            crate::models::Project,
            crate::models::Activity,
            crate::models::Contribution,
            crate::models::Invite,
            crate::models::VolunteerRequest,
            crate::auth::ActorKind,
            crate::workflow::InviteStatus,
            crate::workflow::RequestStatus,

            health::HealthResponse,
            health::ReadinessResponse,
            health::ReadinessChecks,
            health::ComponentStatus,

            auth::LoginRequest,
            auth::LoginResponse,
            auth::ActorSummary,
            auth::MeResponse,
            auth::ForgotPasswordRequest,
            auth::ForgotPasswordResponse,
            auth::ResetPasswordRequest,
            auth::MessageResponse,

            users::CreateUserRequest,
            users::UpdateUserRequest,
            users::UserListResponse,
            users::ContributionListResponse,

            ongs::CreateOngRequest,
            ongs::UpdateOngRequest,
            ongs::OngListResponse,
            ongs::OngProjectsResponse,
            ongs::CollaboratorListResponse,

            projects::CreateProjectRequest,
            projects::UpdateProjectRequest,
            projects::ProjectListResponse,
            projects::VolunteerListResponse,

            volunteer_requests::VolunteerRequestListResponse,

            invites::CreateInviteRequest,
            invites::RespondRequest,
            invites::InviteListResponse,

            posts::CreatePostRequest,
            posts::CreateCommentRequest,
            posts::AuthorSummary,
            posts::PostResponse,
            posts::PostListResponse,
            posts::CommentResponse,
            posts::CommentListResponse,
            posts::LikeResponse,

            activities::ActivityListResponse,

            contributions::CreateContributionRequest,
            contributions::FeedbackRequest,
            contributions::ContributionPage,

            search::SearchType,
            search::SearchResults,
            search::FilterOptions,

            crate::integrations::CompanyInfo,
            crate::integrations::AddressInfo,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Token returned by /api/v1/login.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }

        openapi.security = Some(vec![]);
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_info() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "Colabora API");
        assert_eq!(spec.info.version, "1.0.0");
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let spec = ApiDoc::openapi();
        let components = spec.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
        assert!(components.schemas.contains_key("ApiError"));
    }

    #[test]
    fn test_openapi_documents_workflow_paths() {
        let spec = ApiDoc::openapi();
        for path in [
            "/api/v1/login",
            "/api/v1/invites/{id}",
            "/api/v1/projects/{id}/volunteer-requests",
            "/api/v1/posts/{id}/likes",
            "/api/v1/search-results",
            "/health/ready",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_openapi_has_tags() {
        let tags = ApiDoc::openapi().tags.unwrap_or_default();
        for name in ["Authentication", "Invites", "Volunteer requests", "Health"] {
            assert!(tags.iter().any(|t| t.name == name), "missing tag {}", name);
        }
    }
}
