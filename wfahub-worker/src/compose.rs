/// Per-recipient message assembly
///
/// Subject placeholders are filled with raw values, the HTML body with
/// escaped ones. Unknown placeholders are left as written.

use wfahub_shared::mailer::OutgoingEmail;
use wfahub_shared::models::bulk_campaign::BulkCampaign;
use wfahub_shared::models::campaign_recipient::CampaignRecipient;
use wfahub_shared::templating;

pub fn merge(campaign: &BulkCampaign, recipient: &CampaignRecipient) -> OutgoingEmail {
    let variables = &recipient.variables.0;

    OutgoingEmail::html(
        recipient.email.as_str(),
        templating::render(&campaign.subject, variables),
        templating::render_html(&campaign.html_template, variables),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;
    use std::collections::BTreeMap;
    use uuid::Uuid;
    use wfahub_shared::models::bulk_campaign::CampaignStatus;
    use wfahub_shared::models::campaign_recipient::RecipientStatus;

    fn campaign() -> BulkCampaign {
        BulkCampaign {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "Quotes".to_string(),
            subject: "Quote for {name}".to_string(),
            html_template: "<p>Hello {name}, total {amount} {currency}</p>".to_string(),
            field_mappings: Json(Vec::new()),
            attach_pdf: false,
            pdf_filename: None,
            smtp_config_id: None,
            status: CampaignStatus::Sending,
            total_recipients: 1,
            sent_count: 0,
            failed_count: 0,
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn recipient(vars: &[(&str, &str)]) -> CampaignRecipient {
        CampaignRecipient {
            id: Uuid::new_v4(),
            campaign_id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            variables: Json(
                vars.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            status: RecipientStatus::Pending,
            attempts: 0,
            last_error: None,
            sent_at: None,
        }
    }

    #[test]
    fn test_merge_fills_subject_and_body() {
        let email = merge(&campaign(), &recipient(&[("name", "Ana & Co"), ("amount", "120")]));

        assert_eq!(email.to, "ana@example.com");
        assert_eq!(email.subject, "Quote for Ana & Co");
        assert_eq!(email.html, "<p>Hello Ana &amp; Co, total 120 {currency}</p>");
        assert!(email.attachment.is_none());
    }
}
