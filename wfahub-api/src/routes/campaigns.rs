/// Bulk email campaigns
///
/// A campaign is built from an uploaded CSV, a list of field → column
/// mappings and an HTML template with `{field}` placeholders. Creating one
/// parses the file, resolves the mapping, projects every row into recipient
/// variables and stores the draft with its recipients in one transaction.
/// Scheduling hands it to the worker, which does the actual sending.
///
/// # Lifecycle
///
/// ```text
/// draft ──schedule──▶ scheduled ──worker claims──▶ sending ──▶ completed | failed
///   ▲                     │
///   └──────cancel─────────┘
/// ```
///
/// # Endpoints
///
/// - `POST   /api/campaigns/preview` - Merge one row, nothing stored
/// - `POST   /api/campaigns/preview/pdf` - The merged row as the PDF attachment
/// - `GET    /api/campaigns` - Own campaigns with counters
/// - `POST   /api/campaigns` - Create a draft
/// - `GET    /api/campaigns/:id` - One campaign
/// - `DELETE /api/campaigns/:id` - Delete (not while sending)
/// - `POST   /api/campaigns/:id/schedule` - Queue for sending
/// - `POST   /api/campaigns/:id/cancel` - Back to draft (only from scheduled)
/// - `GET    /api/campaigns/:id/recipients` - Recipients with delivery status

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::Page,
};
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;
use wfahub_shared::{
    auth::middleware::AuthContext,
    dataset::{parse_csv, TabularData},
    mapping::{FieldMapping, MappingSet, ResolvedMapping, EMAIL_FIELD},
    models::{
        app_settings::AppSettings,
        bulk_campaign::{BulkCampaign, CampaignStatus, NewCampaign},
        campaign_recipient::{CampaignRecipient, NewRecipient, RecipientStatus},
        smtp_config::SmtpConfig,
        Pagination,
    },
    pdf::{attachment_filename, PdfError},
    schema::is_valid_email,
    templating,
};

/// Skipped rows listed in a create response
const MAX_REPORTED_SKIPS: usize = 50;

#[derive(Debug, Deserialize)]
pub struct PreviewRequest {
    pub csv: String,

    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,

    #[serde(default)]
    pub subject: String,

    #[serde(default)]
    pub html_template: String,

    /// Zero-based data row to merge
    #[serde(default)]
    pub row: usize,
}

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub headers: Vec<String>,
    pub row_count: usize,

    /// Submitted mappings plus one per unmapped placeholder, auto-filled
    /// from matching headers where possible
    pub field_mappings: Vec<FieldMapping>,

    /// Why the mapping can't be used yet; the merge fields are empty then
    pub mapping_error: Option<String>,

    pub variables: BTreeMap<String, String>,
    pub subject: String,
    pub html: String,

    /// Placeholders the merged row leaves unfilled
    pub unresolved: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    pub name: String,
    pub subject: String,
    pub html_template: String,
    pub csv: String,
    pub field_mappings: Vec<FieldMapping>,

    #[serde(default)]
    pub attach_pdf: bool,

    #[serde(default)]
    pub pdf_filename: Option<String>,

    #[serde(default)]
    pub smtp_config_id: Option<Uuid>,
}

/// Data row left out of a campaign
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkippedRow {
    /// Line number in the file (the header is line 1)
    pub line: usize,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct CreateCampaignResponse {
    pub campaign: BulkCampaign,
    pub skipped_count: usize,

    /// The first skipped rows
    pub skipped: Vec<SkippedRow>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ScheduleRequest {
    /// Send at this time; now when omitted
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RecipientFilter {
    pub status: Option<RecipientStatus>,
}

fn not_found() -> ApiError {
    ApiError::NotFound("Campaign not found".to_string())
}

/// Splits rows into recipients and skipped rows
///
/// A row is skipped when its email is missing or malformed, or repeats an
/// address already taken (case-insensitive).
fn build_recipients(
    data: &TabularData,
    resolved: &ResolvedMapping,
) -> (Vec<NewRecipient>, Vec<SkippedRow>) {
    let mut recipients = Vec::new();
    let mut skipped = Vec::new();
    let mut seen = HashSet::new();

    for (index, row) in data.rows.iter().enumerate() {
        let line = index + 2;
        let variables = resolved.project(row);
        let email = variables.get(EMAIL_FIELD).cloned().unwrap_or_default();

        let reason = if email.is_empty() {
            Some("Missing email".to_string())
        } else if !is_valid_email(&email) {
            Some(format!("Invalid email '{}'", email))
        } else if !seen.insert(email.to_lowercase()) {
            Some(format!("Duplicate email '{}'", email))
        } else {
            None
        };

        match reason {
            Some(reason) => skipped.push(SkippedRow { line, reason }),
            None => recipients.push(NewRecipient { email, variables }),
        }
    }

    (recipients, skipped)
}

/// Preview one merged row
///
/// # Endpoint
///
/// ```text
/// POST /api/campaigns/preview
/// Content-Type: application/json
///
/// {
///   "csv": "Email,Client\nana@example.com,Ana\n",
///   "field_mappings": [{ "field_name": "email", "column_name": "Email" }],
///   "subject": "Quote for {name}",
///   "html_template": "<p>Hello {name}</p>",
///   "row": 0
/// }
/// ```
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Unreadable CSV, duplicate mapping or row out of range
pub async fn preview_campaign(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Json<PreviewResponse>> {
    let preview = merge_preview(&state, &req)?;
    Ok(Json(preview))
}

/// Preview one merged row as the PDF attachment
///
/// Same body as [`preview_campaign`]; renders with the method chosen in the
/// admin settings.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Any preview error, a mapping that can't resolve yet, or a
///   template the local renderer refuses (local file references, oversized)
/// - `503 Service Unavailable`: The PDF backend failed
pub async fn preview_campaign_pdf(
    State(state): State<AppState>,
    Json(req): Json<PreviewRequest>,
) -> ApiResult<Response> {
    let preview = merge_preview(&state, &req)?;
    if let Some(err) = preview.mapping_error {
        return Err(ApiError::invalid_field("field_mappings", err));
    }

    let method = AppSettings::pdf_method(&state.db).await?;
    let pdf = state
        .pdf
        .render(method, &preview.html)
        .await
        .map_err(|e| match e {
            PdfError::Rejected(reason) => ApiError::invalid_field("html_template", reason),
            _ => ApiError::ServiceUnavailable("PDF rendering failed".to_string()),
        })?;

    let disposition = format!("inline; filename=\"{}\"", attachment_filename(None));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        pdf,
    )
        .into_response())
}

fn merge_preview(state: &AppState, req: &PreviewRequest) -> ApiResult<PreviewResponse> {
    let data = parse_csv(&req.csv, state.config.limits.max_upload_rows)?;
    if data.is_empty() {
        return Err(ApiError::invalid_field("csv", "The file has no data rows"));
    }
    let row = data.rows.get(req.row).ok_or_else(|| {
        ApiError::invalid_field("row", format!("The file has {} data rows", data.len()))
    })?;

    let mut mappings = MappingSet::from_mappings(req.field_mappings.clone())?;
    let mut placeholders = templating::placeholders(&req.subject);
    placeholders.extend(templating::placeholders(&req.html_template));
    for placeholder in placeholders {
        if !mappings.all().iter().any(|m| m.field_name == placeholder) {
            mappings.add(&placeholder, "")?;
        }
    }
    mappings.auto_map(&data.headers);

    let mut preview = PreviewResponse {
        headers: data.headers.clone(),
        row_count: data.len(),
        field_mappings: mappings.all().to_vec(),
        mapping_error: None,
        variables: BTreeMap::new(),
        subject: String::new(),
        html: String::new(),
        unresolved: Vec::new(),
    };

    match mappings.resolve(&data.headers) {
        Ok(resolved) => {
            let variables = resolved.project(row);
            preview.subject = templating::render(&req.subject, &variables);
            preview.html = templating::render_html(&req.html_template, &variables);

            let mut unresolved = templating::unresolved(&req.subject, &variables);
            for name in templating::unresolved(&req.html_template, &variables) {
                if !unresolved.contains(&name) {
                    unresolved.push(name);
                }
            }
            preview.unresolved = unresolved;
            preview.variables = variables;
        }
        Err(e) => preview.mapping_error = Some(e.to_string()),
    }

    Ok(preview)
}

/// Create a draft campaign
///
/// # Endpoint
///
/// ```text
/// POST /api/campaigns
/// Content-Type: application/json
///
/// {
///   "name": "Spring quotes",
///   "subject": "Your quote, {name}",
///   "html_template": "<p>Hello {name}, total {amount}</p>",
///   "csv": "Email,Client,Total\n...",
///   "field_mappings": [
///     { "field_name": "email", "column_name": "Email" },
///     { "field_name": "name", "column_name": "Client" },
///     { "field_name": "amount", "column_name": "Total" }
///   ],
///   "attach_pdf": true,
///   "pdf_filename": "quote.pdf"
/// }
/// ```
///
/// # Response
///
/// `201 Created` with the draft and the rows that were left out.
///
/// # Errors
///
/// - `422 Unprocessable Entity`: Missing fields, unreadable CSV, bad mapping,
///   no usable recipients, or an SMTP configuration the user can't use
pub async fn create_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateCampaignRequest>,
) -> ApiResult<(StatusCode, Json<CreateCampaignResponse>)> {
    let mut problems = Vec::new();
    for (field, value, max) in [
        ("name", &req.name, 200),
        ("subject", &req.subject, 500),
        ("html_template", &req.html_template, 1_000_000),
    ] {
        if value.trim().is_empty() {
            problems.push((field.to_string(), format!("{} is required", field)));
        } else if value.chars().count() > max {
            problems.push((field.to_string(), format!("Must be at most {} characters", max)));
        }
    }
    if let Some(err) = ApiError::from_problems(problems) {
        return Err(err);
    }

    if let Some(id) = req.smtp_config_id {
        if SmtpConfig::resolve_for_user(&state.db, auth.user_id, Some(id))
            .await?
            .is_none()
        {
            return Err(ApiError::invalid_field(
                "smtp_config_id",
                "Unknown SMTP configuration",
            ));
        }
    }

    let data = parse_csv(&req.csv, state.config.limits.max_upload_rows)?;
    let mappings = MappingSet::from_mappings(req.field_mappings)?;
    let resolved = mappings.resolve(&data.headers)?;

    let (recipients, skipped) = build_recipients(&data, &resolved);
    if recipients.is_empty() {
        return Err(ApiError::invalid_field(
            "csv",
            "No row has a valid email address",
        ));
    }

    let total_recipients = i32::try_from(recipients.len())
        .map_err(|_| ApiError::invalid_field("csv", "Too many recipients"))?;

    let mut tx = state.db.begin().await?;

    let campaign = BulkCampaign::insert_draft(
        &mut *tx,
        NewCampaign {
            user_id: auth.user_id,
            name: req.name.trim().to_string(),
            subject: req.subject,
            html_template: req.html_template,
            field_mappings: mappings.into_mappings(),
            attach_pdf: req.attach_pdf,
            pdf_filename: req
                .pdf_filename
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty()),
            smtp_config_id: req.smtp_config_id,
            total_recipients,
        },
    )
    .await?;

    CampaignRecipient::insert_batch(&mut *tx, campaign.id, &recipients).await?;
    tx.commit().await?;

    tracing::info!(
        user_id = %auth.user_id,
        campaign_id = %campaign.id,
        recipients = total_recipients,
        skipped = skipped.len(),
        "Campaign draft created"
    );

    let skipped_count = skipped.len();
    Ok((
        StatusCode::CREATED,
        Json(CreateCampaignResponse {
            campaign,
            skipped_count,
            skipped: skipped.into_iter().take(MAX_REPORTED_SKIPS).collect(),
        }),
    ))
}

/// List the caller's campaigns, newest first
///
/// # Endpoint
///
/// `GET /api/campaigns?page=1&per_page=20` returns `{ "items": [...], "total", "page", "per_page" }`
pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<Page<BulkCampaign>>> {
    let campaigns = BulkCampaign::list_for_user(
        &state.db,
        auth.user_id,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = BulkCampaign::count_for_user(&state.db, auth.user_id).await?;

    Ok(Json(Page::new(campaigns, total, &pagination)))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BulkCampaign>> {
    let campaign = BulkCampaign::find(&state.db, auth.user_id, id)
        .await?
        .ok_or_else(not_found)?;
    Ok(Json(campaign))
}

/// Delete a campaign and its recipients
///
/// # Errors
///
/// - `404 Not Found`: Unknown campaign
/// - `409 Conflict`: The campaign is being sent
pub async fn delete_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    if BulkCampaign::delete(&state.db, auth.user_id, id).await? {
        return Ok(StatusCode::NO_CONTENT);
    }

    match BulkCampaign::find(&state.db, auth.user_id, id).await? {
        Some(c) if c.status == CampaignStatus::Sending => Err(ApiError::Conflict(
            "A campaign can't be deleted while it is sending".to_string(),
        )),
        _ => Err(not_found()),
    }
}

/// Queue a draft for sending
///
/// # Endpoint
///
/// ```text
/// POST /api/campaigns/:id/schedule
/// Content-Type: application/json
///
/// { "scheduled_at": "2026-03-01T09:00:00Z" }
/// ```
///
/// # Errors
///
/// - `409 Conflict`: The campaign is not a draft
pub async fn schedule_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    body: Option<Json<ScheduleRequest>>,
) -> ApiResult<Json<BulkCampaign>> {
    let req = body.map(|Json(r)| r).unwrap_or_default();

    match BulkCampaign::schedule(&state.db, auth.user_id, id, req.scheduled_at).await? {
        Some(campaign) => {
            tracing::info!(campaign_id = %id, scheduled_at = ?campaign.scheduled_at, "Campaign scheduled");
            Ok(Json(campaign))
        }
        None => Err(transition_error(&state, auth.user_id, id, "Only draft campaigns can be scheduled").await),
    }
}

/// Take a scheduled campaign back to draft
///
/// # Errors
///
/// - `409 Conflict`: The campaign is not scheduled (sending has begun or it never was)
pub async fn cancel_campaign(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BulkCampaign>> {
    match BulkCampaign::cancel(&state.db, auth.user_id, id).await? {
        Some(campaign) => Ok(Json(campaign)),
        None => Err(transition_error(&state, auth.user_id, id, "Only scheduled campaigns can be cancelled").await),
    }
}

/// 404 for someone else's or unknown campaign, 409 otherwise
async fn transition_error(state: &AppState, user_id: Uuid, id: Uuid, message: &str) -> ApiError {
    match BulkCampaign::find(&state.db, user_id, id).await {
        Ok(Some(_)) => ApiError::Conflict(message.to_string()),
        Ok(None) => not_found(),
        Err(e) => e.into(),
    }
}

pub async fn list_recipients(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<Pagination>,
    Query(filter): Query<RecipientFilter>,
) -> ApiResult<Json<Page<CampaignRecipient>>> {
    BulkCampaign::find(&state.db, auth.user_id, id)
        .await?
        .ok_or_else(not_found)?;

    let recipients = CampaignRecipient::list(
        &state.db,
        id,
        filter.status,
        pagination.limit(),
        pagination.offset(),
    )
    .await?;
    let total = CampaignRecipient::count(&state.db, id, filter.status).await?;

    Ok(Json(Page::new(recipients, total, &pagination)))
}
