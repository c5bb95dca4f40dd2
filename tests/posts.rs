//! Feed, likes, comments and the activity log they produce.

mod common;

use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

async fn publish(app: &common::TestApp, token: &str, body: Value) -> Uuid {
    let response = app.post("/posts", token, body).await;
    assert_status!(response, 201);
    let body: Value = response.json().await.unwrap();
    body["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
#[serial]
async fn post_needs_content_or_image() {
    let app = spawn_app!();
    let user = app.register_user("VOLUNTARY").await;

    let response = app.post("/posts", &user.token, json!({"content": "  "})).await;
    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "EMPTY_POST");

    let response = app
        .post(
            "/posts",
            &user.token,
            json!({"images": ["data:image/png;base64,iVBORw0KGgo="]}),
        )
        .await;
    assert_status!(response, 201);

    let response = app
        .post("/posts", &user.token, json!({"images": ["ftp://imagem"]}))
        .await;
    assert_status!(response, 400);

    let response = app
        .post(
            "/posts",
            &user.token,
            json!({"images": ["data:image/png;base64,@@@"]}),
        )
        .await;
    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_IMAGE");
}

#[tokio::test]
#[serial]
async fn ong_posts_carry_author_summary_and_tags() {
    let app = spawn_app!();
    let ong = app.register_ong().await;

    let response = app
        .post(
            "/posts",
            &ong.token,
            json!({"content": "Mutirão sábado", "tags": ["#MeioAmbiente", "meioambiente"]}),
        )
        .await;
    assert_status!(response, 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["author"]["kind"], "ong");
    assert_eq!(body["author"]["name"], ong.name);
    assert_eq!(body["tags"], json!(["meioambiente"]));
    assert_eq!(body["like_count"], 0);
    assert_eq!(body["liked_by_me"], false);
}

#[tokio::test]
#[serial]
async fn like_once_then_conflict_and_activity_is_logged() {
    let app = spawn_app!();
    let author = app.register_ong().await;
    let fan = app.register_user("VOLUNTARY").await;
    let post_id = publish(&app, &author.token, json!({"content": "Obrigado a todos!"})).await;
    let likes = format!("/posts/{}/likes", post_id);

    let response = app.post(&likes, &fan.token, json!({})).await;
    assert_status!(response, 201);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["like_count"], 1);

    let response = app.post(&likes, &fan.token, json!({})).await;
    assert_status!(response, 409);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "ALREADY_LIKED");

    assert_eq!(app.count_activities_for_post(post_id), 1);

    let response = app.get(&format!("/posts/{}", post_id), &fan.token).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["liked_by_me"], true);

    let response = app.get("/activities/me", &author.token).await;
    let body: Value = response.json().await.unwrap();
    let description = body["data"][0]["description"].as_str().unwrap();
    assert_eq!(
        description,
        format!("{} curtiu a publicação de {}", fan.name, author.name)
    );
}

#[tokio::test]
#[serial]
async fn unlike_removes_only_existing_likes() {
    let app = spawn_app!();
    let user = app.register_user("VOLUNTARY").await;
    let post_id = publish(&app, &user.token, json!({"content": "Olá"})).await;
    let likes = format!("/posts/{}/likes", post_id);

    assert_status!(app.delete(&likes, &user.token).await, 404);
    assert_status!(app.post(&likes, &user.token, json!({})).await, 201);

    let response = app.delete(&likes, &user.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["like_count"], 0);
}

#[tokio::test]
#[serial]
async fn liking_a_missing_post_returns_404() {
    let app = spawn_app!();
    let user = app.register_user("VOLUNTARY").await;

    let response = app
        .post(&format!("/posts/{}/likes", Uuid::new_v4()), &user.token, json!({}))
        .await;
    assert_status!(response, 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "POST_NOT_FOUND");
}

#[tokio::test]
#[serial]
async fn comments_are_validated_listed_and_deletable_by_post_author() {
    let app = spawn_app!();
    let author = app.register_user("VOLUNTARY").await;
    let commenter = app.register_ong().await;
    let post_id = publish(&app, &author.token, json!({"content": "Primeiro dia!"})).await;
    let comments = format!("/posts/{}/comments", post_id);

    let response = app.post(&comments, &commenter.token, json!({"content": ""})).await;
    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "EMPTY_COMMENT");

    let response = app
        .post(&comments, &commenter.token, json!({"content": "Parabéns!"}))
        .await;
    assert_status!(response, 201);
    let comment: Value = response.json().await.unwrap();
    assert_eq!(comment["author"]["name"], commenter.name);
    assert_eq!(app.count_activities_for_post(post_id), 1);

    let response = app.get(&comments, &author.token).await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let post: Value = app
        .get(&format!("/posts/{}", post_id), &author.token)
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(post["comment_count"], 1);

    let outsider = app.register_user("VOLUNTARY").await;
    let path = format!("/comments/{}", comment["id"].as_str().unwrap());
    assert_status!(app.delete(&path, &outsider.token).await, 403);
    assert_status!(app.delete(&path, &author.token).await, 204);
}

#[tokio::test]
#[serial]
async fn only_the_author_deletes_a_post() {
    let app = spawn_app!();
    let author = app.register_user("VOLUNTARY").await;
    let other = app.register_user("VOLUNTARY").await;
    let post_id = publish(&app, &author.token, json!({"content": "Meu post"})).await;
    let path = format!("/posts/{}", post_id);

    assert_status!(app.delete(&path, &other.token).await, 403);
    assert_status!(app.delete(&path, &author.token).await, 204);
    assert_status!(app.get(&path, &author.token).await, 404);
}

#[tokio::test]
#[serial]
async fn feed_filters_by_tag_newest_first() {
    let app = spawn_app!();
    let user = app.register_user("VOLUNTARY").await;
    let tag = format!("tag{}", &Uuid::new_v4().simple().to_string()[..8]);

    let older = publish(&app, &user.token, json!({"content": "um", "tags": [tag]})).await;
    let newer = publish(&app, &user.token, json!({"content": "dois", "tags": [tag]})).await;
    publish(&app, &user.token, json!({"content": "sem tag"})).await;

    let response = app.get(&format!("/posts?tag={}", tag), &user.token).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    let ids: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![newer.to_string(), older.to_string()]);
    assert_eq!(body["pagination"]["total"], 2);
}
