//! End-to-end invitation and membership flow over the HTTP surface,
//! backed by the in-memory repositories.

use api::{build_app_state, build_router, ServiceDependencies};
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use services::mocks::{InMemoryStore, StubDirectory};
use std::sync::Arc;
use uuid::Uuid;

fn test_server(directory: Arc<StubDirectory>) -> TestServer {
    let store = InMemoryStore::shared();
    let state = build_app_state(
        ServiceDependencies {
            organisations: store.clone(),
            positions: store.clone(),
            members: store.clone(),
            invitations: store,
            directory,
        },
        &config::ApiConfig::default(),
    );
    TestServer::new(build_router(state)).unwrap()
}

#[tokio::test]
async fn invitation_lifecycle_over_http() {
    let directory = Arc::new(StubDirectory::default());
    let server = test_server(directory.clone());
    let creator = Uuid::new_v4();

    // Requests without an identity are rejected outright
    let response = server.post("/v1/organisations").json(&json!({})).await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let response = server
        .post("/v1/organisations")
        .add_header("x-user-id", creator.to_string())
        .json(&json!({
            "name": "Acme",
            "email": "ops@acme.test",
            "description": "Acme Corp"
        }))
        .await;
    response.assert_status_ok();
    let organisation: Value = response.json();
    let org_id = organisation["id"].as_str().unwrap().to_string();
    assert_eq!(organisation["member_count"], 1);
    assert_eq!(organisation["creator_id"], json!(creator.to_string()));

    // Invite a directory-known user
    let invitee_email = "a@example.com";
    directory.add_user(invitee_email);

    let response = server
        .post(&format!("/v1/organisations/{org_id}/invitations"))
        .add_header("x-user-id", creator.to_string())
        .json(&json!({ "email": invitee_email }))
        .await;
    response.assert_status_ok();
    let invitation: Value = response.json();
    assert_eq!(invitation["status"], "pending");
    let token = invitation["token"].as_str().unwrap().to_string();
    assert_eq!(token.len(), 12);

    // A second pending invitation for the same email is rejected
    let response = server
        .post(&format!("/v1/organisations/{org_id}/invitations"))
        .add_header("x-user-id", creator.to_string())
        .json(&json!({ "email": invitee_email }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // The pending invitation shows up in the listing
    let response = server
        .get(&format!(
            "/v1/organisations/{org_id}/invitations?status=pending"
        ))
        .await;
    response.assert_status_ok();
    let listed: Value = response.json();
    assert_eq!(listed.as_array().unwrap().len(), 1);

    // Accept with the right email: the member lands on the default position
    let response = server
        .post(&format!("/v1/invitations/{token}/accept"))
        .json(&json!({ "email": invitee_email }))
        .await;
    response.assert_status_ok();
    let accepted: Value = response.json();
    assert_eq!(accepted["position"]["is_default"], json!(true));
    assert_eq!(accepted["member"]["position"]["name"], "Member");
    let invitee_id = accepted["member"]["user_id"].as_str().unwrap().to_string();

    // The consumed token cannot be replayed
    let response = server
        .post(&format!("/v1/invitations/{token}/accept"))
        .json(&json!({ "email": invitee_email }))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    // Both the creator and the newcomer are listed as members
    let response = server
        .get(&format!("/v1/organisations/{org_id}/members"))
        .await;
    response.assert_status_ok();
    let members: Value = response.json();
    assert_eq!(members.as_array().unwrap().len(), 2);

    // The newcomer holds the permissionless default position and cannot
    // remove anyone
    let response = server
        .delete(&format!(
            "/v1/organisations/{org_id}/members/{creator}"
        ))
        .add_header("x-user-id", invitee_id.clone())
        .await;
    response.assert_status(StatusCode::FORBIDDEN);

    // The creator can remove the newcomer
    let response = server
        .delete(&format!(
            "/v1/organisations/{org_id}/members/{invitee_id}"
        ))
        .add_header("x-user-id", creator.to_string())
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    // An unknown status filter is a client error
    let response = server
        .get(&format!(
            "/v1/organisations/{org_id}/invitations?status=bogus"
        ))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn position_management_over_http() {
    let directory = Arc::new(StubDirectory::default());
    let server = test_server(directory.clone());
    let creator = Uuid::new_v4();

    let response = server
        .post("/v1/organisations")
        .add_header("x-user-id", creator.to_string())
        .json(&json!({ "name": "Globex", "email": "ops@globex.test" }))
        .await;
    response.assert_status_ok();
    let org_id = response.json::<Value>()["id"].as_str().unwrap().to_string();

    // Create a ranked position with a permission set
    let response = server
        .post(&format!("/v1/organisations/{org_id}/positions"))
        .add_header("x-user-id", creator.to_string())
        .json(&json!({
            "name": "Officer",
            "rank": 5,
            "permissions": ["MEMBER_INVITE", "MEMBER_REMOVE"]
        }))
        .await;
    response.assert_status_ok();
    let officer: Value = response.json();
    let officer_id = officer["id"].as_str().unwrap().to_string();
    assert_eq!(officer["permissions"].as_array().unwrap().len(), 2);

    // Update: rename, re-rank, swap a permission
    let response = server
        .patch(&format!("/v1/positions/{officer_id}"))
        .add_header("x-user-id", creator.to_string())
        .json(&json!({
            "name": "Captain",
            "rank": 6,
            "is_default": false,
            "permissions": ["MEMBER_INVITE", "ROLE_UPDATE"]
        }))
        .await;
    response.assert_status_ok();
    let captain: Value = response.json();
    assert_eq!(captain["name"], "Captain");
    let mut permissions: Vec<String> = captain["permissions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p.as_str().unwrap().to_string())
        .collect();
    permissions.sort();
    assert_eq!(permissions, vec!["MEMBER_INVITE", "ROLE_UPDATE"]);

    // The default position cannot lose its flag through an update
    let response = server
        .get(&format!("/v1/organisations/{org_id}/positions"))
        .await;
    let positions: Value = response.json();
    let default_id = positions
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["is_default"] == json!(true))
        .unwrap()["id"]
        .as_str()
        .unwrap()
        .to_string();
    let response = server
        .patch(&format!("/v1/positions/{default_id}"))
        .add_header("x-user-id", creator.to_string())
        .json(&json!({
            "name": "Member",
            "rank": 1,
            "is_default": false,
            "permissions": []
        }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Move a member in via invitation, then into the new position
    let email = "recruit@globex.test";
    directory.add_user(email);
    let response = server
        .post(&format!("/v1/organisations/{org_id}/invitations"))
        .add_header("x-user-id", creator.to_string())
        .json(&json!({ "email": email }))
        .await;
    let token = response.json::<Value>()["token"].as_str().unwrap().to_string();
    let response = server
        .post(&format!("/v1/invitations/{token}/accept"))
        .json(&json!({ "email": email }))
        .await;
    let recruit_id = response.json::<Value>()["member"]["user_id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = server
        .post(&format!("/v1/positions/{officer_id}/members/{recruit_id}"))
        .add_header("x-user-id", creator.to_string())
        .json(&json!({ "from_position_id": default_id }))
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["position"]["name"], "Captain");

    // Delete the position; its member migrates onto the default position
    let response = server
        .delete(&format!(
            "/v1/positions/{officer_id}?replacement={default_id}"
        ))
        .add_header("x-user-id", creator.to_string())
        .await;
    response.assert_status(StatusCode::NO_CONTENT);

    let response = server
        .get(&format!("/v1/positions/{default_id}/members"))
        .await;
    response.assert_status_ok();
    let members: Value = response.json();
    assert!(members
        .as_array()
        .unwrap()
        .iter()
        .any(|m| m["user_id"] == json!(recruit_id)));
}
