use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    Collaborator,
    Voluntary,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::Collaborator => "COLLABORATOR",
            UserRole::Voluntary => "VOLUNTARY",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_uppercase().as_str() {
            "ADMIN" => Some(UserRole::Admin),
            "COLLABORATOR" => Some(UserRole::Collaborator),
            "VOLUNTARY" => Some(UserRole::Voluntary),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Author of a post, comment or like. Stored as two nullable foreign keys
/// of which exactly one is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Author {
    User(Uuid),
    Ong(Uuid),
}

impl Author {
    pub fn from_columns(user_id: Option<Uuid>, ong_id: Option<Uuid>) -> Option<Self> {
        match (user_id, ong_id) {
            (Some(id), None) => Some(Author::User(id)),
            (None, Some(id)) => Some(Author::Ong(id)),
            _ => None,
        }
    }

    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            Author::User(id) => Some(*id),
            Author::Ong(_) => None,
        }
    }

    pub fn ong_id(&self) -> Option<Uuid> {
        match self {
            Author::Ong(id) => Some(*id),
            Author::User(_) => None,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            Author::User(id) | Author::Ong(id) => *id,
        }
    }
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: Uuid,
    #[schema(example = "Maria Souza")]
    pub name: String,
    #[schema(example = "maria@example.com")]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[schema(example = "VOLUNTARY")]
    pub role: String,
    pub ong_id: Option<Uuid>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// Rows written by this service always carry a known role; anything else
    /// is treated as the least privileged one.
    pub fn user_role(&self) -> UserRole {
        UserRole::parse(&self.role).unwrap_or(UserRole::Voluntary)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::users)]
pub struct UserChangeset {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub image: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::ongs)]
pub struct Ong {
    pub id: Uuid,
    #[schema(example = "Instituto Mãos Dadas")]
    pub name: String,
    #[schema(example = "contato@maosdadas.org")]
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[schema(example = "11222333000181")]
    pub cnpj: String,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub about: Option<String>,
    #[schema(example = "Educação")]
    pub cause: Option<String>,
    pub cep: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub website: Option<String>,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::ongs)]
pub struct NewOng {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub cnpj: String,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub about: Option<String>,
    pub cause: Option<String>,
    pub cep: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub website: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::ongs)]
pub struct OngChangeset {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub phone: Option<String>,
    pub description: Option<String>,
    pub about: Option<String>,
    pub cause: Option<String>,
    pub cep: Option<String>,
    pub street: Option<String>,
    pub number: Option<String>,
    pub district: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub website: Option<String>,
    pub image: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::projects)]
pub struct Project {
    pub id: Uuid,
    pub ong_id: Uuid,
    #[schema(example = "Reforço escolar")]
    pub name: String,
    #[schema(example = "Aulas de reforço para crianças do bairro")]
    pub description: String,
    pub about: Option<String>,
    pub cause: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub image: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::projects)]
pub struct NewProject {
    pub ong_id: Uuid,
    pub name: String,
    pub description: String,
    pub about: Option<String>,
    pub cause: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub image: Option<String>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::projects)]
pub struct ProjectChangeset {
    pub name: Option<String>,
    pub description: Option<String>,
    pub about: Option<String>,
    pub cause: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub image: Option<String>,
    pub updated_at: Option<NaiveDateTime>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::posts)]
pub struct Post {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
    pub content: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Post {
    pub fn author(&self) -> Option<Author> {
        Author::from_columns(self.user_id, self.ong_id)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::posts)]
pub struct NewPost {
    pub user_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
    pub content: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Clone)]
#[diesel(table_name = crate::schema::comments)]
pub struct Comment {
    pub id: Uuid,
    pub post_id: Uuid,
    pub user_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
    pub content: String,
    pub created_at: NaiveDateTime,
}

impl Comment {
    pub fn author(&self) -> Option<Author> {
        Author::from_columns(self.user_id, self.ong_id)
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::comments)]
pub struct NewComment {
    pub post_id: Uuid,
    pub user_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
    pub content: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::likes)]
pub struct NewLike {
    pub post_id: Uuid,
    pub user_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::activities)]
pub struct Activity {
    pub id: Uuid,
    #[schema(example = "LIKE")]
    pub kind: String,
    #[schema(example = "Maria Souza curtiu a publicação de Instituto Mãos Dadas")]
    pub description: String,
    pub user_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub target_ong_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::activities)]
pub struct NewActivity {
    pub kind: String,
    pub description: String,
    pub user_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
    pub post_id: Option<Uuid>,
    pub target_user_id: Option<Uuid>,
    pub target_ong_id: Option<Uuid>,
}

#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::contributions)]
pub struct Contribution {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ong_id: Option<Uuid>,
    pub ong_name: Option<String>,
    #[schema(example = "Mutirão de limpeza")]
    pub title: String,
    pub description: Option<String>,
    pub hours: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    #[schema(example = 5)]
    pub rating: Option<i16>,
    pub feedback: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::contributions)]
pub struct NewContribution {
    pub user_id: Uuid,
    pub ong_id: Option<Uuid>,
    pub ong_name: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub hours: Option<i32>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Invitation from an NGO to a collaborator.
#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::associate_user_ong)]
pub struct Invite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ong_id: Uuid,
    #[schema(example = "INVITE_PENDING_ONG_TO_USER")]
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::associate_user_ong)]
pub struct NewInvite {
    pub user_id: Uuid,
    pub ong_id: Uuid,
    pub status: String,
}

/// Request from a volunteer to join a project.
#[derive(Debug, Queryable, Selectable, Identifiable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::user_associate_project)]
pub struct VolunteerRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub project_id: Uuid,
    #[schema(example = "REQUEST_PENDING_USER_TO_ONG")]
    pub status: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::user_associate_project)]
pub struct NewVolunteerRequest {
    pub user_id: Uuid,
    pub project_id: Uuid,
    pub status: String,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::password_reset_tokens)]
pub struct NewPasswordResetToken {
    pub user_id: Option<Uuid>,
    pub ong_id: Option<Uuid>,
    pub token_hash: String,
    pub expires_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_parse() {
        assert_eq!(UserRole::parse("ADMIN"), Some(UserRole::Admin));
        assert_eq!(UserRole::parse("collaborator"), Some(UserRole::Collaborator));
        assert_eq!(UserRole::parse(" Voluntary "), Some(UserRole::Voluntary));
        assert_eq!(UserRole::parse("ong"), None);
    }

    #[test]
    fn test_user_role_serializes_upper_case() {
        let json = serde_json::to_string(&UserRole::Collaborator).unwrap();
        assert_eq!(json, "\"COLLABORATOR\"");
    }

    #[test]
    fn test_author_from_columns() {
        let id = Uuid::new_v4();
        assert_eq!(Author::from_columns(Some(id), None), Some(Author::User(id)));
        assert_eq!(Author::from_columns(None, Some(id)), Some(Author::Ong(id)));
        assert_eq!(Author::from_columns(None, None), None);
        assert_eq!(Author::from_columns(Some(id), Some(id)), None);
    }

    #[test]
    fn test_author_columns() {
        let id = Uuid::new_v4();
        let author = Author::Ong(id);
        assert_eq!(author.ong_id(), Some(id));
        assert_eq!(author.user_id(), None);
        assert_eq!(author.id(), id);
    }

    #[test]
    fn test_author_serialization() {
        let id = Uuid::new_v4();
        let value = serde_json::to_value(Author::User(id)).unwrap();
        assert_eq!(value["kind"], "user");
        assert_eq!(value["id"], id.to_string());
    }

    #[test]
    fn test_user_never_serializes_password() {
        let now = chrono::Utc::now().naive_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            role: "VOLUNTARY".to_string(),
            ong_id: None,
            phone: None,
            bio: None,
            city: None,
            state: None,
            image: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&user).unwrap();
        assert!(value.get("password_hash").is_none());
        assert_eq!(user.user_role(), UserRole::Voluntary);
    }
}
