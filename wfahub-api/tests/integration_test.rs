/// Integration tests for the WFA Hub API
///
/// These tests need PostgreSQL at `DATABASE_URL` and are ignored by default
/// (`cargo test -- --ignored`). They cover:
/// - Registration, login and the session round trip
/// - Credit-metered executions with refunds on failed actions
/// - Admin self-protection and role gating
/// - The single system-default SMTP configuration
/// - The campaign draft → scheduled → draft lifecycle

mod common;

use axum::http::StatusCode;
use common::{empty_request, json_request, TestContext, TEST_PASSWORD};
use serde_json::{json, Value};
use uuid::Uuid;
use wfahub_shared::models::{
    credit_transaction::CreditTransaction,
    smtp_config::SmtpConfig,
    template::Template,
    user::User,
};

async fn create_template(ctx: &TestContext, body: Value) -> Uuid {
    let (status, template) = ctx
        .send(json_request("POST", "/api/admin/templates", Some(&ctx.admin_token), body))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", template);
    template["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
#[ignore]
async fn test_register_login_me() {
    let ctx = TestContext::new().await.unwrap();
    let email = format!("new-{}@example.com", Uuid::new_v4());

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "email": email, "password": TEST_PASSWORD, "name": "New" }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["user"]["email"], email.to_lowercase());
    assert_eq!(body["user"]["credits"], ctx.config.limits.signup_credits);
    assert!(body["user"].get("password_hash").is_none());

    // Same address again
    let (status, _) = ctx
        .send(json_request(
            "POST",
            "/api/auth/register",
            None,
            json!({ "email": email.to_uppercase(), "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": email, "password": "wrong-password-1" }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, login) = ctx
        .send(json_request(
            "POST",
            "/api/auth/login",
            None,
            json!({ "email": email, "password": TEST_PASSWORD }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = login["token"].as_str().unwrap().to_string();

    let (status, me) = ctx.send(empty_request("GET", "/api/auth/me", Some(&token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], email.to_lowercase());

    let id: Uuid = me["id"].as_str().unwrap().parse().unwrap();
    let ledger = CreditTransaction::list_for_user(&ctx.db, id, 10, 0).await.unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].balance_after, ctx.config.limits.signup_credits);

    User::delete(&ctx.db, id).await.unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_execution_charges_and_records() {
    let ctx = TestContext::new().await.unwrap();
    let template_id = create_template(
        &ctx,
        json!({
            "name": "Log a lead",
            "credit_cost": 3,
            "input_schema": [{ "name": "company", "type": "text", "required": true }],
            "action": { "type": "record_only" }
        }),
    )
    .await;

    // Missing required field: nothing charged
    let uri = format!("/api/templates/{}/execute", template_id);
    let (status, body) = ctx
        .send(json_request("POST", &uri, Some(&ctx.user_token), json!({ "inputs": {} })))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "company");

    let (status, body) = ctx
        .send(json_request(
            "POST",
            &uri,
            Some(&ctx.user_token),
            json!({ "inputs": { "company": "Acme" } }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["credits"], 7);
    assert_eq!(body["execution"]["status"], "success");

    let (_, body) = ctx
        .send(json_request(
            "POST",
            &uri,
            Some(&ctx.user_token),
            json!({ "inputs": { "company": "Acme" } }),
        ))
        .await;
    assert_eq!(body["credits"], 4);

    let (_, body) = ctx
        .send(json_request(
            "POST",
            &uri,
            Some(&ctx.user_token),
            json!({ "inputs": { "company": "Acme" } }),
        ))
        .await;
    assert_eq!(body["credits"], 1);

    // 1 credit left, costs 3
    let (status, body) = ctx
        .send(json_request(
            "POST",
            &uri,
            Some(&ctx.user_token),
            json!({ "inputs": { "company": "Acme" } }),
        ))
        .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(body["error"], "insufficient_credits");

    let user = User::find_by_id(&ctx.db, ctx.user.id).await.unwrap().unwrap();
    assert_eq!(user.credits, 1);

    let (status, history) = ctx
        .send(empty_request("GET", "/api/executions", Some(&ctx.user_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history["total"], 3);

    Template::delete(&ctx.db, template_id).await.unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_failed_action_is_refunded() {
    let ctx = TestContext::new().await.unwrap();

    // Nothing listens on port 1, so every send fails
    let (status, _) = ctx
        .send(json_request(
            "POST",
            "/api/smtp-configs",
            Some(&ctx.user_token),
            json!({
                "name": "Dead",
                "host": "127.0.0.1",
                "port": 1,
                "username": "nobody",
                "password": "secret",
                "from_email": "nobody@example.com",
                "use_tls": false
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let template_id = create_template(
        &ctx,
        json!({
            "name": "Email a quote",
            "credit_cost": 2,
            "input_schema": [{ "name": "to", "type": "email", "required": true }],
            "action": {
                "type": "send_email",
                "to_field": "to",
                "subject": "Quote",
                "html_body": "<p>Hi</p>"
            }
        }),
    )
    .await;

    let (status, body) = ctx
        .send(json_request(
            "POST",
            &format!("/api/templates/{}/execute", template_id),
            Some(&ctx.user_token),
            json!({ "inputs": { "to": "ana@example.com" } }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["execution"]["status"], "failed");
    assert_eq!(body["execution"]["credits_refunded"], 2);
    assert_eq!(body["credits"], 10);

    let ledger = CreditTransaction::list_for_user(&ctx.db, ctx.user.id, 10, 0)
        .await
        .unwrap();
    let amounts: Vec<i32> = ledger.iter().map(|t| t.amount).collect();
    assert!(amounts.contains(&-2));
    assert!(amounts.contains(&2));

    Template::delete(&ctx.db, template_id).await.unwrap();
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_admin_gating_and_self_protection() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx
        .send(empty_request("GET", "/api/admin/users", Some(&ctx.user_token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let own = format!("/api/admin/users/{}", ctx.admin.id);
    let (status, body) = ctx
        .send(empty_request("DELETE", &own, Some(&ctx.admin_token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, _) = ctx
        .send(json_request(
            "PUT",
            &format!("{}/role", own),
            Some(&ctx.admin_token),
            json!({ "role": "user" }),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let admin = User::find_by_id(&ctx.db, ctx.admin.id).await.unwrap().unwrap();
    assert!(admin.is_admin());

    // Credits on someone else: add clamps at zero
    let (status, body) = ctx
        .send(json_request(
            "PUT",
            &format!("/api/admin/users/{}/credits", ctx.user.id),
            Some(&ctx.admin_token),
            json!({ "mode": "add", "amount": -50 }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["credits"], 0);

    // Demoting the admin takes effect on the next request
    User::update_role(&ctx.db, ctx.admin.id, wfahub_shared::models::user::UserRole::User)
        .await
        .unwrap();
    let (status, _) = ctx
        .send(empty_request("GET", "/api/admin/users", Some(&ctx.admin_token)))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_single_system_default_smtp() {
    let ctx = TestContext::new().await.unwrap();

    let mut ids = Vec::new();
    for name in ["Primary", "Backup"] {
        let (status, body) = ctx
            .send(json_request(
                "POST",
                "/api/admin/smtp-configs",
                Some(&ctx.admin_token),
                json!({
                    "name": name,
                    "host": "smtp.example.com",
                    "port": 587,
                    "username": "mailer",
                    "password": "secret",
                    "from_email": "noreply@example.com"
                }),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        ids.push(body["id"].as_str().unwrap().parse::<Uuid>().unwrap());
    }

    for id in &ids {
        let (status, body) = ctx
            .send(empty_request(
                "POST",
                &format!("/api/admin/smtp-configs/{}/default", id),
                Some(&ctx.admin_token),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["is_system_default"], true);
    }

    let defaults: Vec<SmtpConfig> = SmtpConfig::list(&ctx.db, None)
        .await
        .unwrap()
        .into_iter()
        .filter(|c| c.is_system_default)
        .collect();
    assert_eq!(defaults.len(), 1);
    assert_eq!(defaults[0].id, ids[1]);

    // A user's own configuration can't become the system default
    let (_, own) = ctx
        .send(json_request(
            "POST",
            "/api/smtp-configs",
            Some(&ctx.user_token),
            json!({
                "name": "Mine",
                "host": "smtp.example.com",
                "port": 587,
                "username": "me",
                "password": "secret",
                "from_email": "me@example.com"
            }),
        ))
        .await;
    let (status, _) = ctx
        .send(empty_request(
            "POST",
            &format!("/api/admin/smtp-configs/{}/default", own["id"].as_str().unwrap()),
            Some(&ctx.admin_token),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for id in ids {
        SmtpConfig::delete(&ctx.db, id, None).await.unwrap();
    }
    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_campaign_lifecycle() {
    let ctx = TestContext::new().await.unwrap();

    let csv = "Email,Client\nana@example.com,Ana\nbroken,Bad\nbo@example.com,Bo\nANA@example.com,Dup\n";
    let (status, created) = ctx
        .send(json_request(
            "POST",
            "/api/campaigns",
            Some(&ctx.user_token),
            json!({
                "name": "Spring",
                "subject": "Hi {name}",
                "html_template": "<p>Hello {name}</p>",
                "csv": csv,
                "field_mappings": [
                    { "field_name": "email", "column_name": "Email" },
                    { "field_name": "name", "column_name": "Client" }
                ]
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", created);
    assert_eq!(created["campaign"]["status"], "draft");
    assert_eq!(created["campaign"]["total_recipients"], 2);
    assert_eq!(created["skipped_count"], 2);

    let id = created["campaign"]["id"].as_str().unwrap().to_string();
    let base = format!("/api/campaigns/{}", id);

    let (status, recipients) = ctx
        .send(empty_request("GET", &format!("{}/recipients", base), Some(&ctx.user_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recipients["items"].as_array().unwrap().len(), 2);
    assert_eq!(recipients["total"], 2);

    let (status, recipients) = ctx
        .send(empty_request(
            "GET",
            &format!("{}/recipients?status=pending&per_page=1", base),
            Some(&ctx.user_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(recipients["items"].as_array().unwrap().len(), 1);
    assert_eq!(recipients["total"], 2);
    assert_eq!(recipients["per_page"], 1);

    let (status, campaigns) = ctx
        .send(empty_request("GET", "/api/campaigns?page=1", Some(&ctx.user_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(campaigns["total"], 1);
    assert_eq!(campaigns["items"][0]["id"], id.as_str());

    // a page far past the end is empty, not an error
    let (status, campaigns) = ctx
        .send(empty_request(
            "GET",
            "/api/campaigns?page=9223372036854775807",
            Some(&ctx.user_token),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(campaigns["items"].as_array().unwrap().is_empty());
    assert_eq!(campaigns["total"], 1);

    // Someone else's campaign is invisible
    let (status, _) = ctx.send(empty_request("GET", &base, Some(&ctx.admin_token))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Cancel needs a scheduled campaign
    let (status, _) = ctx
        .send(empty_request("POST", &format!("{}/cancel", base), Some(&ctx.user_token)))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, scheduled) = ctx
        .send(json_request(
            "POST",
            &format!("{}/schedule", base),
            Some(&ctx.user_token),
            json!({ "scheduled_at": "2099-01-01T09:00:00Z" }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(scheduled["status"], "scheduled");

    let (status, _) = ctx
        .send(json_request("POST", &format!("{}/schedule", base), Some(&ctx.user_token), json!({})))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, cancelled) = ctx
        .send(empty_request("POST", &format!("{}/cancel", base), Some(&ctx.user_token)))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cancelled["status"], "draft");

    let (status, _) = ctx.send(empty_request("DELETE", &base, Some(&ctx.user_token))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_campaign_without_valid_recipients_is_rejected() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .send(json_request(
            "POST",
            "/api/campaigns",
            Some(&ctx.user_token),
            json!({
                "name": "Empty",
                "subject": "Hi",
                "html_template": "<p>Hi</p>",
                "csv": "Email\nnope\n",
                "field_mappings": [{ "field_name": "email", "column_name": "Email" }]
            }),
        ))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["details"][0]["field"], "csv");

    ctx.cleanup().await.unwrap();
}
