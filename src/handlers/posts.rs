//! Social feed: posts, likes and comments.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDateTime;
use diesel::{dsl::count_star, pg::Pg, prelude::*};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::{
    activity::{self, ActivityKind},
    auth::{Actor, ActorKind},
    error::{get_db_conn, ApiError, ApiResult},
    helpers::{author_name, author_names, is_unique_violation},
    models::{Author, Comment, NewComment, NewLike, NewPost, Post},
    pagination::{PageMeta, PageParams},
    schema::{comments, likes, posts},
    validation::{is_valid_image, non_blank},
    AppState,
};

const MAX_IMAGES: usize = 10;
const MAX_TAGS: usize = 20;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    #[schema(example = "Mutirão de limpeza neste sábado!")]
    pub content: Option<String>,
    /// Base64 data URLs or http(s) links.
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    #[schema(example = json!(["meioambiente", "voluntariado"]))]
    pub tags: Vec<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    #[schema(example = "Contem comigo!")]
    pub content: String,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedFilter {
    /// Only posts carrying this tag.
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthorSummary {
    pub kind: ActorKind,
    pub id: Uuid,
    #[schema(example = "Instituto Mãos Dadas")]
    pub name: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostResponse {
    pub id: Uuid,
    pub author: AuthorSummary,
    pub content: String,
    pub images: Vec<String>,
    pub tags: Vec<String>,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_me: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PostListResponse {
    pub data: Vec<PostResponse>,
    pub pagination: PageMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentResponse {
    pub id: Uuid,
    pub post_id: Uuid,
    pub author: AuthorSummary,
    pub content: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommentListResponse {
    pub data: Vec<CommentResponse>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LikeResponse {
    pub post_id: Uuid,
    pub like_count: i64,
}

fn summarize(author: Author, names: &HashMap<Author, String>) -> AuthorSummary {
    AuthorSummary {
        kind: match author {
            Author::User(_) => ActorKind::User,
            Author::Ong(_) => ActorKind::Ong,
        },
        id: author.id(),
        name: names.get(&author).cloned().unwrap_or_default(),
    }
}

fn corrupt_author(id: Uuid) -> (StatusCode, Json<ApiError>) {
    tracing::error!(row_id = %id, "Row without a single author");
    ApiError::internal("INVALID_AUTHOR")
}

/// Lower-cases, strips a leading `#` and drops blanks and duplicates.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.into_iter()
        .map(|t| t.trim().trim_start_matches('#').trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.clone()))
        .collect()
}

fn load_post(conn: &mut PgConnection, id: Uuid) -> ApiResult<Post> {
    posts::table
        .find(id)
        .select(Post::as_select())
        .first(conn)
        .optional()
        .map_err(ApiError::from_db("load_post"))?
        .ok_or_else(|| ApiError::not_found("Publicação não encontrada", "POST_NOT_FOUND"))
}

fn like_filter(actor: &Actor) -> Box<dyn BoxableExpression<likes::table, Pg, SqlType = diesel::sql_types::Bool>> {
    match actor.as_author() {
        Author::User(id) => Box::new(likes::user_id.eq(id).assume_not_null()),
        Author::Ong(id) => Box::new(likes::ong_id.eq(id).assume_not_null()),
    }
}

fn count_likes(conn: &mut PgConnection, post_id: Uuid) -> QueryResult<i64> {
    likes::table
        .filter(likes::post_id.eq(post_id))
        .count()
        .get_result(conn)
}

/// Attaches author names, counters and the caller's like to a page of posts.
fn hydrate_posts(
    conn: &mut PgConnection,
    actor: &Actor,
    rows: Vec<Post>,
) -> ApiResult<Vec<PostResponse>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<Uuid> = rows.iter().map(|p| p.id).collect();
    let authors: Vec<Author> = rows.iter().filter_map(Post::author).collect();

    let names = author_names(conn, &authors).map_err(ApiError::from_db("post_author_names"))?;

    let like_counts: HashMap<Uuid, i64> = likes::table
        .filter(likes::post_id.eq_any(&ids))
        .group_by(likes::post_id)
        .select((likes::post_id, count_star()))
        .load::<(Uuid, i64)>(conn)
        .map_err(ApiError::from_db("post_like_counts"))?
        .into_iter()
        .collect();

    let comment_counts: HashMap<Uuid, i64> = comments::table
        .filter(comments::post_id.eq_any(&ids))
        .group_by(comments::post_id)
        .select((comments::post_id, count_star()))
        .load::<(Uuid, i64)>(conn)
        .map_err(ApiError::from_db("post_comment_counts"))?
        .into_iter()
        .collect();

    let liked: HashSet<Uuid> = likes::table
        .filter(likes::post_id.eq_any(&ids))
        .filter(like_filter(actor))
        .select(likes::post_id)
        .load::<Uuid>(conn)
        .map_err(ApiError::from_db("post_liked_by_me"))?
        .into_iter()
        .collect();

    rows.into_iter()
        .map(|post| {
            let author = post.author().ok_or_else(|| corrupt_author(post.id))?;
            Ok(PostResponse {
                id: post.id,
                author: summarize(author, &names),
                like_count: like_counts.get(&post.id).copied().unwrap_or(0),
                comment_count: comment_counts.get(&post.id).copied().unwrap_or(0),
                liked_by_me: liked.contains(&post.id),
                content: post.content,
                images: post.images,
                tags: post.tags,
                created_at: post.created_at,
            })
        })
        .collect()
}

fn comment_responses(
    conn: &mut PgConnection,
    rows: Vec<Comment>,
) -> ApiResult<Vec<CommentResponse>> {
    let authors: Vec<Author> = rows.iter().filter_map(Comment::author).collect();
    let names =
        author_names(conn, &authors).map_err(ApiError::from_db("comment_author_names"))?;

    rows.into_iter()
        .map(|comment| {
            let author = comment.author().ok_or_else(|| corrupt_author(comment.id))?;
            Ok(CommentResponse {
                id: comment.id,
                post_id: comment.post_id,
                author: summarize(author, &names),
                content: comment.content,
                created_at: comment.created_at,
            })
        })
        .collect()
}

#[utoipa::path(
    post,
    path = "/api/v1/posts",
    tag = "Posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post published", body = PostResponse),
        (status = 400, description = "Empty post or invalid image", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Json(payload): Json<CreatePostRequest>,
) -> ApiResult<(StatusCode, Json<PostResponse>)> {
    let content = non_blank(payload.content).unwrap_or_default();
    let images: Vec<String> = payload
        .images
        .into_iter()
        .map(|i| i.trim().to_string())
        .filter(|i| !i.is_empty())
        .collect();

    if content.is_empty() && images.is_empty() {
        return Err(ApiError::bad_request(
            "A publicação precisa de um texto ou de uma imagem",
            "EMPTY_POST",
        ));
    }
    if images.len() > MAX_IMAGES {
        return Err(ApiError::bad_request(
            format!("Uma publicação pode ter no máximo {} imagens", MAX_IMAGES),
            "TOO_MANY_IMAGES",
        ));
    }
    if images.iter().any(|i| !is_valid_image(i)) {
        return Err(ApiError::bad_request(
            "Imagem deve ser uma data URL base64 ou um link http(s)",
            "INVALID_IMAGE",
        ));
    }
    let tags = normalize_tags(payload.tags);
    if tags.len() > MAX_TAGS {
        return Err(ApiError::bad_request(
            format!("Uma publicação pode ter no máximo {} tags", MAX_TAGS),
            "TOO_MANY_TAGS",
        ));
    }

    let author = actor.as_author();
    let mut conn = get_db_conn(&state.db_pool)?;

    let post: Post = diesel::insert_into(posts::table)
        .values(&NewPost {
            user_id: author.user_id(),
            ong_id: author.ong_id(),
            content,
            images,
            tags,
        })
        .returning(Post::as_returning())
        .get_result(&mut conn)
        .map_err(ApiError::from_db("create_post"))?;

    info!(post_id = %post.id, author_id = %actor.id, "Post published");

    let mut hydrated = hydrate_posts(&mut conn, &actor, vec![post])?;
    let response = hydrated.pop().ok_or_else(|| ApiError::internal("POST_HYDRATION"))?;

    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts",
    tag = "Posts",
    params(PageParams, FeedFilter),
    responses(
        (status = 200, description = "Feed, newest first", body = PostListResponse),
        (status = 401, description = "Unauthorized", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_posts(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Query(page): Query<PageParams>,
    Query(filter): Query<FeedFilter>,
) -> ApiResult<Json<PostListResponse>> {
    let tag = non_blank(filter.tag).map(|t| normalize_tags(vec![t])).unwrap_or_default();

    let filtered = || -> posts::BoxedQuery<'static, Pg> {
        let mut query = posts::table.into_boxed();
        if !tag.is_empty() {
            query = query.filter(posts::tags.contains(tag.clone()));
        }
        query
    };

    let mut conn = get_db_conn(&state.db_pool)?;

    let total: i64 = filtered()
        .count()
        .get_result(&mut conn)
        .map_err(ApiError::from_db("count_posts"))?;

    let rows = filtered()
        .select(Post::as_select())
        .order((posts::created_at.desc(), posts::id.desc()))
        .limit(page.limit())
        .offset(page.offset())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_posts"))?;

    let data = hydrate_posts(&mut conn, &actor, rows)?;

    Ok(Json(PostListResponse {
        data,
        pagination: page.meta(total),
    }))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}",
    tag = "Posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Post", body = PostResponse),
        (status = 404, description = "Post not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PostResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let post = load_post(&mut conn, id)?;

    let mut hydrated = hydrate_posts(&mut conn, &actor, vec![post])?;
    hydrated
        .pop()
        .map(Json)
        .ok_or_else(|| ApiError::internal("POST_HYDRATION"))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}",
    tag = "Posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 403, description = "Not the author", body = ApiError),
        (status = 404, description = "Post not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let post = load_post(&mut conn, id)?;

    if post.author() != Some(actor.as_author()) {
        warn!(post_id = %id, actor_id = %actor.id, "Rejected deletion of another author's post");
        return Err(ApiError::forbidden(
            "Apenas o autor pode excluir esta publicação",
            "FORBIDDEN",
        ));
    }

    diesel::delete(posts::table.find(id))
        .execute(&mut conn)
        .map_err(ApiError::from_db("delete_post"))?;

    info!(post_id = %id, "Post deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/likes",
    tag = "Posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 201, description = "Post liked", body = LikeResponse),
        (status = 404, description = "Post not found", body = ApiError),
        (status = 409, description = "Already liked", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn like_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<LikeResponse>)> {
    let already_liked = || ApiError::conflict("Você já curtiu esta publicação", "ALREADY_LIKED");

    let mut conn = get_db_conn(&state.db_pool)?;
    let post = load_post(&mut conn, id)?;
    let post_author = post.author().ok_or_else(|| corrupt_author(post.id))?;
    let liker = actor.as_author();

    let existing: Option<Uuid> = likes::table
        .filter(likes::post_id.eq(id))
        .filter(like_filter(&actor))
        .select(likes::id)
        .first(&mut conn)
        .optional()
        .map_err(ApiError::from_db("find_like"))?;
    if existing.is_some() {
        return Err(already_liked());
    }

    let like_count = conn
        .transaction(|conn| {
            diesel::insert_into(likes::table)
                .values(&NewLike {
                    post_id: id,
                    user_id: liker.user_id(),
                    ong_id: liker.ong_id(),
                })
                .execute(conn)?;

            let liker_name = author_name(conn, liker)?;
            let post_author_name = author_name(conn, post_author)?;
            activity::record(
                conn,
                &activity::build(
                    ActivityKind::Like,
                    liker,
                    &liker_name,
                    id,
                    post_author,
                    &post_author_name,
                ),
            )?;

            count_likes(conn, id)
        })
        .map_err(|e| {
            // a concurrent like from the same actor loses on the unique index
            if is_unique_violation(&e) {
                already_liked()
            } else {
                ApiError::from_db("like_post")(e)
            }
        })?;

    info!(post_id = %id, actor_id = %actor.id, "Post liked");

    Ok((
        StatusCode::CREATED,
        Json(LikeResponse {
            post_id: id,
            like_count,
        }),
    ))
}

#[utoipa::path(
    delete,
    path = "/api/v1/posts/{id}/likes",
    tag = "Posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Like removed", body = LikeResponse),
        (status = 404, description = "Post or like not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn unlike_post(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<LikeResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_post(&mut conn, id)?;

    let removed = diesel::delete(
        likes::table
            .filter(likes::post_id.eq(id))
            .filter(like_filter(&actor)),
    )
    .execute(&mut conn)
    .map_err(ApiError::from_db("unlike_post"))?;

    if removed == 0 {
        return Err(ApiError::not_found(
            "Você ainda não curtiu esta publicação",
            "LIKE_NOT_FOUND",
        ));
    }

    let like_count = count_likes(&mut conn, id).map_err(ApiError::from_db("count_likes"))?;

    Ok(Json(LikeResponse {
        post_id: id,
        like_count,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/posts/{id}/comments",
    tag = "Posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment created", body = CommentResponse),
        (status = 400, description = "Empty comment", body = ApiError),
        (status = 404, description = "Post not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCommentRequest>,
) -> ApiResult<(StatusCode, Json<CommentResponse>)> {
    let mut conn = get_db_conn(&state.db_pool)?;
    let post = load_post(&mut conn, id)?;

    let content = non_blank(Some(payload.content)).ok_or_else(|| {
        ApiError::bad_request("O comentário não pode ser vazio", "EMPTY_COMMENT")
    })?;

    let post_author = post.author().ok_or_else(|| corrupt_author(post.id))?;
    let commenter = actor.as_author();

    let (comment, commenter_name) = conn
        .transaction(|conn| {
            let comment: Comment = diesel::insert_into(comments::table)
                .values(&NewComment {
                    post_id: id,
                    user_id: commenter.user_id(),
                    ong_id: commenter.ong_id(),
                    content,
                })
                .returning(Comment::as_returning())
                .get_result(conn)?;

            let commenter_name = author_name(conn, commenter)?;
            let post_author_name = author_name(conn, post_author)?;
            activity::record(
                conn,
                &activity::build(
                    ActivityKind::Comment,
                    commenter,
                    &commenter_name,
                    id,
                    post_author,
                    &post_author_name,
                ),
            )?;

            Ok::<_, diesel::result::Error>((comment, commenter_name))
        })
        .map_err(ApiError::from_db("create_comment"))?;

    info!(comment_id = %comment.id, post_id = %id, actor_id = %actor.id, "Comment created");

    let names = HashMap::from([(commenter, commenter_name)]);
    Ok((
        StatusCode::CREATED,
        Json(CommentResponse {
            id: comment.id,
            post_id: comment.post_id,
            author: summarize(commenter, &names),
            content: comment.content,
            created_at: comment.created_at,
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/api/v1/posts/{id}/comments",
    tag = "Posts",
    params(("id" = Uuid, Path, description = "Post ID")),
    responses(
        (status = 200, description = "Comments, oldest first", body = CommentListResponse),
        (status = 404, description = "Post not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CommentListResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    load_post(&mut conn, id)?;

    let rows = comments::table
        .filter(comments::post_id.eq(id))
        .select(Comment::as_select())
        .order(comments::created_at.asc())
        .load(&mut conn)
        .map_err(ApiError::from_db("list_comments"))?;

    let data = comment_responses(&mut conn, rows)?;
    Ok(Json(CommentListResponse { data }))
}

#[utoipa::path(
    delete,
    path = "/api/v1/comments/{id}",
    tag = "Posts",
    params(("id" = Uuid, Path, description = "Comment ID")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Not the comment or post author", body = ApiError),
        (status = 404, description = "Comment not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let comment: Comment = comments::table
        .find(id)
        .select(Comment::as_select())
        .first(&mut conn)
        .optional()
        .map_err(ApiError::from_db("load_comment"))?
        .ok_or_else(|| ApiError::not_found("Comentário não encontrado", "COMMENT_NOT_FOUND"))?;

    let me = Some(actor.as_author());
    let post = load_post(&mut conn, comment.post_id)?;
    if comment.author() != me && post.author() != me {
        return Err(ApiError::forbidden(
            "Você não pode excluir este comentário",
            "FORBIDDEN",
        ));
    }

    diesel::delete(comments::table.find(id))
        .execute(&mut conn)
        .map_err(ApiError::from_db("delete_comment"))?;

    info!(comment_id = %id, actor_id = %actor.id, "Comment deleted");

    Ok(StatusCode::NO_CONTENT)
}
