//! Project management by NGOs and their collaborators.

mod common;

use serde_json::{json, Value};
use serial_test::serial;
use uuid::Uuid;

#[tokio::test]
#[serial]
async fn ong_creates_and_lists_projects() {
    let app = spawn_app!();
    let ong = app.register_ong().await;

    let project_id = app.create_project(&ong, "Horta comunitária").await;

    let response = app.get_public(&format!("/projects/{}", project_id)).await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["ong_id"], ong.id.to_string());

    let response = app
        .get_public(&format!("/projects?ong_id={}", ong.id))
        .await;
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let response = app
        .get_public(&format!("/ongs/{}/projects", ong.id))
        .await;
    assert_status!(response, 200);
}

#[tokio::test]
#[serial]
async fn project_requires_name_and_description() {
    let app = spawn_app!();
    let ong = app.register_ong().await;

    let response = app
        .post("/projects", &ong.token, json!({"name": "", "description": "x"}))
        .await;
    assert_status!(response, 400);
}

#[tokio::test]
#[serial]
async fn volunteers_cannot_create_projects() {
    let app = spawn_app!();
    let volunteer = app.register_user("VOLUNTARY").await;

    let response = app
        .post(
            "/projects",
            &volunteer.token,
            json!({"name": "Projeto", "description": "Descrição"}),
        )
        .await;
    assert_status!(response, 403);
}

#[tokio::test]
#[serial]
async fn only_the_owning_ong_updates_or_deletes() {
    let app = spawn_app!();
    let owner = app.register_ong().await;
    let other = app.register_ong().await;
    let project_id = app.create_project(&owner, "Reforço escolar").await;
    let path = format!("/projects/{}", project_id);

    let response = app.put(&path, &other.token, json!({"name": "Tomado"})).await;
    assert_status!(response, 403);

    let response = app
        .put(&path, &owner.token, json!({"name": "Reforço escolar 2025"}))
        .await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Reforço escolar 2025");

    assert_status!(app.delete(&path, &other.token).await, 403);
    assert_status!(app.delete(&path, &owner.token).await, 204);
    assert_status!(app.get_public(&path).await, 404);
}

#[tokio::test]
#[serial]
async fn rejects_end_date_before_start_date() {
    let app = spawn_app!();
    let ong = app.register_ong().await;

    let response = app
        .post(
            "/projects",
            &ong.token,
            json!({
                "name": "Projeto",
                "description": "Descrição",
                "start_date": "2025-03-10",
                "end_date": "2025-03-01"
            }),
        )
        .await;
    assert_status!(response, 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "INVALID_DATES");
}

#[tokio::test]
#[serial]
async fn missing_project_returns_404() {
    let app = spawn_app!();

    let response = app
        .get_public(&format!("/projects/{}", Uuid::new_v4()))
        .await;
    assert_status!(response, 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["code"], "PROJECT_NOT_FOUND");
}

#[tokio::test]
#[serial]
async fn collaborator_manages_projects_of_their_ong() {
    let app = spawn_app!();
    let ong = app.register_ong().await;
    let collaborator = app.join_ong(&ong).await;

    let response = app
        .post(
            "/projects",
            &collaborator.token,
            json!({"name": "Reforço escolar", "description": "Aulas aos sábados"}),
        )
        .await;
    assert_status!(response, 201);
    let project: Value = response.json().await.unwrap();
    assert_eq!(project["ong_id"], ong.id.to_string());
    let path = format!("/projects/{}", project["id"].as_str().unwrap());

    let response = app
        .put(&path, &collaborator.token, json!({"name": "Reforço escolar II"}))
        .await;
    assert_status!(response, 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["name"], "Reforço escolar II");
}

#[tokio::test]
#[serial]
async fn collaborator_of_another_ong_is_forbidden() {
    let app = spawn_app!();
    let ong = app.register_ong().await;
    let other = app.register_ong().await;
    let outsider = app.join_ong(&other).await;
    let project_id = app.create_project(&ong, "Cozinha comunitária").await;
    let path = format!("/projects/{}", project_id);

    let response = app
        .put(&path, &outsider.token, json!({"name": "Invadido"}))
        .await;
    assert_status!(response, 403);
    assert_status!(app.delete(&path, &outsider.token).await, 403);
}

#[tokio::test]
#[serial]
async fn collaborator_without_ong_cannot_create_projects() {
    let app = spawn_app!();
    let collaborator = app.register_user("COLLABORATOR").await;

    let response = app
        .post(
            "/projects",
            &collaborator.token,
            json!({"name": "Projeto", "description": "Descrição"}),
        )
        .await;
    assert_status!(response, 403);
}
