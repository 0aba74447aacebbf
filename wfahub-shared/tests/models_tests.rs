/// Integration tests for SMTP defaults and campaign bookkeeping
///
/// These tests require a running PostgreSQL database.
/// Run with: cargo test --test models_tests -- --ignored --test-threads=1

mod common;

use std::collections::BTreeMap;
use wfahub_shared::mapping::FieldMapping;
use wfahub_shared::models::bulk_campaign::{BulkCampaign, CampaignStatus, NewCampaign};
use wfahub_shared::models::campaign_recipient::{CampaignRecipient, NewRecipient, RecipientStatus};
use wfahub_shared::models::smtp_config::SmtpConfig;

async fn default_count(pool: &sqlx::PgPool) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM smtp_configs WHERE is_system_default")
        .fetch_one(pool)
        .await
        .expect("Count failed")
}

#[tokio::test]
#[ignore]
async fn test_exactly_one_system_default() {
    let pool = common::setup().await;
    let first = common::create_system_smtp(&pool, "first").await;
    let second = common::create_system_smtp(&pool, "second").await;

    SmtpConfig::set_system_default(&pool, first.id).await.unwrap().expect("first not set");
    assert_eq!(default_count(&pool).await, 1);

    let now = SmtpConfig::set_system_default(&pool, second.id)
        .await
        .unwrap()
        .expect("second not set");
    assert!(now.is_system_default);
    assert_eq!(default_count(&pool).await, 1);

    let current = SmtpConfig::find_system_default(&pool).await.unwrap().unwrap();
    assert_eq!(current.id, second.id);
}

#[tokio::test]
#[ignore]
async fn test_user_config_cannot_become_system_default() {
    let pool = common::setup().await;
    let system = common::create_system_smtp(&pool, "system").await;
    SmtpConfig::set_system_default(&pool, system.id).await.unwrap();

    let user = common::create_user(&pool, 0).await;
    let own = SmtpConfig::create(
        &pool,
        Some(user.id),
        wfahub_shared::models::smtp_config::SmtpConfigInput {
            name: "mine".to_string(),
            host: "smtp.mine.test".to_string(),
            port: 587,
            username: "me".to_string(),
            password: Some("pw".to_string()),
            from_email: "me@mine.test".to_string(),
            from_name: None,
            use_tls: true,
        },
    )
    .await
    .unwrap();

    assert!(SmtpConfig::set_system_default(&pool, own.id).await.unwrap().is_none());
    assert_eq!(default_count(&pool).await, 1);

    // user's own config wins over the system default
    let resolved = SmtpConfig::resolve_for_user(&pool, user.id, None).await.unwrap().unwrap();
    assert_eq!(resolved.id, own.id);
}

async fn draft_campaign(pool: &sqlx::PgPool, recipients: usize) -> BulkCampaign {
    let user = common::create_user(pool, 0).await;
    let rows: Vec<NewRecipient> = (0..recipients)
        .map(|i| NewRecipient {
            email: format!("r{}@example.com", i),
            variables: BTreeMap::from([("name".to_string(), format!("R{}", i))]),
        })
        .collect();

    let mut tx = pool.begin().await.unwrap();
    let campaign = BulkCampaign::insert_draft(
        &mut *tx,
        NewCampaign {
            user_id: user.id,
            name: "Spring quotes".to_string(),
            subject: "Hello {name}".to_string(),
            html_template: "<p>Hi {name}</p>".to_string(),
            field_mappings: vec![FieldMapping::new("email", "Email"), FieldMapping::new("name", "Name")],
            attach_pdf: false,
            pdf_filename: None,
            smtp_config_id: None,
            total_recipients: recipients as i32,
        },
    )
    .await
    .unwrap();
    CampaignRecipient::insert_batch(&mut *tx, campaign.id, &rows).await.unwrap();
    tx.commit().await.unwrap();

    campaign
}

#[tokio::test]
#[ignore]
async fn test_campaign_lifecycle_and_counters() {
    let pool = common::setup().await;
    let campaign = draft_campaign(&pool, 3).await;
    assert_eq!(campaign.status, CampaignStatus::Draft);

    let scheduled = BulkCampaign::schedule(&pool, campaign.user_id, campaign.id, None)
        .await
        .unwrap()
        .expect("schedule failed");
    assert_eq!(scheduled.status, CampaignStatus::Scheduled);

    // a second schedule is rejected: not a draft any more
    assert!(BulkCampaign::schedule(&pool, campaign.user_id, campaign.id, None)
        .await
        .unwrap()
        .is_none());

    let claimed = BulkCampaign::claim_due(&pool, 100).await.unwrap();
    assert!(claimed.iter().any(|c| c.id == campaign.id));
    assert!(claimed.iter().all(|c| c.status == CampaignStatus::Sending));

    // sending campaigns can't be deleted
    assert!(!BulkCampaign::delete(&pool, campaign.user_id, campaign.id).await.unwrap());

    let pending = CampaignRecipient::next_pending(&pool, campaign.id, 10).await.unwrap();
    assert_eq!(pending.len(), 3);

    let mut conn = pool.acquire().await.unwrap();
    CampaignRecipient::mark_sent(&mut conn, pending[0].id, 1).await.unwrap();
    assert!(BulkCampaign::record_outcome(&mut conn, campaign.id, true).await.unwrap());
    CampaignRecipient::mark_sent(&mut conn, pending[1].id, 1).await.unwrap();
    assert!(BulkCampaign::record_outcome(&mut conn, campaign.id, true).await.unwrap());
    CampaignRecipient::mark_failed(&mut conn, pending[2].id, 3, "550 mailbox unavailable")
        .await
        .unwrap();
    assert!(BulkCampaign::record_outcome(&mut conn, campaign.id, false).await.unwrap());

    // counters are exhausted
    assert!(!BulkCampaign::record_outcome(&mut conn, campaign.id, true).await.unwrap());
    drop(conn);

    let done = BulkCampaign::finish(&pool, campaign.id, None).await.unwrap().unwrap();
    assert_eq!(done.status, CampaignStatus::Completed);
    assert_eq!(done.sent_count, 2);
    assert_eq!(done.failed_count, 1);
    assert!(done.sent_count + done.failed_count <= done.total_recipients);

    let failed = CampaignRecipient::list(&pool, campaign.id, Some(RecipientStatus::Failed), 10, 0)
        .await
        .unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].attempts, 3);
}

#[tokio::test]
#[ignore]
async fn test_abort_fails_pending_recipients() {
    let pool = common::setup().await;
    let campaign = draft_campaign(&pool, 4).await;
    BulkCampaign::schedule(&pool, campaign.user_id, campaign.id, None).await.unwrap();
    BulkCampaign::claim_due(&pool, 100).await.unwrap();

    let aborted = BulkCampaign::abort(&pool, campaign.id, "No SMTP configuration")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(aborted.status, CampaignStatus::Failed);
    assert_eq!(aborted.failed_count, 4);
    assert_eq!(aborted.last_error.as_deref(), Some("No SMTP configuration"));
    assert!(CampaignRecipient::next_pending(&pool, campaign.id, 10).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore]
async fn test_abort_outside_sending_changes_nothing() {
    let pool = common::setup().await;
    let campaign = draft_campaign(&pool, 2).await;
    BulkCampaign::schedule(&pool, campaign.user_id, campaign.id, None).await.unwrap();

    // scheduled, not claimed
    assert!(BulkCampaign::abort(&pool, campaign.id, "No SMTP configuration")
        .await
        .unwrap()
        .is_none());

    let pending = CampaignRecipient::list(&pool, campaign.id, Some(RecipientStatus::Pending), 10, 0)
        .await
        .unwrap();
    assert_eq!(pending.len(), 2);
    assert!(pending.iter().all(|r| r.last_error.is_none()));

    let unchanged = BulkCampaign::find_by_id(&pool, campaign.id).await.unwrap().unwrap();
    assert_eq!(unchanged.status, CampaignStatus::Scheduled);
    assert_eq!(unchanged.failed_count, 0);

    assert!(BulkCampaign::cancel(&pool, campaign.user_id, campaign.id).await.unwrap().is_some());
    assert!(BulkCampaign::delete(&pool, campaign.user_id, campaign.id).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_list_counts_match_filters() {
    let pool = common::setup().await;
    let campaign = draft_campaign(&pool, 3).await;

    assert_eq!(CampaignRecipient::count(&pool, campaign.id, None).await.unwrap(), 3);
    assert_eq!(
        CampaignRecipient::count(&pool, campaign.id, Some(RecipientStatus::Sent)).await.unwrap(),
        0
    );

    let mut conn = pool.acquire().await.unwrap();
    let first = CampaignRecipient::list(&pool, campaign.id, None, 1, 0).await.unwrap();
    CampaignRecipient::mark_failed(&mut conn, first[0].id, 1, "550").await.unwrap();
    drop(conn);

    assert_eq!(
        CampaignRecipient::count(&pool, campaign.id, Some(RecipientStatus::Pending)).await.unwrap(),
        2
    );
    assert_eq!(BulkCampaign::count_for_user(&pool, campaign.user_id).await.unwrap(), 1);
}

#[tokio::test]
#[ignore]
async fn test_cancel_only_from_scheduled() {
    let pool = common::setup().await;
    let campaign = draft_campaign(&pool, 1).await;

    assert!(BulkCampaign::cancel(&pool, campaign.user_id, campaign.id).await.unwrap().is_none());

    BulkCampaign::schedule(&pool, campaign.user_id, campaign.id, None).await.unwrap();
    let back = BulkCampaign::cancel(&pool, campaign.user_id, campaign.id).await.unwrap().unwrap();
    assert_eq!(back.status, CampaignStatus::Draft);
    assert!(back.scheduled_at.is_none());

    assert!(BulkCampaign::delete(&pool, campaign.user_id, campaign.id).await.unwrap());
}
