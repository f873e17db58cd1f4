use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{error, info, warn};

use portal_core::email::{is_valid_email, normalize_email};
use portal_types::api::{EmailPayload, EmailResult, InquiryRequest};

use crate::error::ApiError;
use crate::state::AppState;

/// Outbound mail routes exposed by the email service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    Admin,
    Partnership,
    Suitability,
}

impl EmailKind {
    fn path(self) -> &'static str {
        match self {
            EmailKind::Admin => "send-admin-email",
            EmailKind::Partnership => "send-partnership-email",
            EmailKind::Suitability => "send-suitability-email",
        }
    }
}

/// Thin client for the email service. Failures are reported, never raised.
pub struct Mailer {
    client: reqwest::Client,
    endpoint: Option<String>,
}

impl Mailer {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }

    pub async fn send(&self, kind: EmailKind, payload: &EmailPayload) -> EmailResult {
        let Some(base) = &self.endpoint else {
            warn!("Email endpoint not configured, dropping {}", kind.path());
            return failure("email delivery is not configured");
        };
        let url = format!("{}/{}", base, kind.path());

        let response = match self.client.post(&url).json(payload).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("POST {} failed: {}", url, e);
                return failure("email service unreachable");
            }
        };

        let status = response.status();
        match response.json::<EmailResult>().await {
            Ok(result) => {
                if !result.success {
                    warn!("{} refused: {:?}", kind.path(), result.error);
                }
                result
            }
            Err(e) if status.is_success() => {
                warn!("{} returned an unreadable body: {}", kind.path(), e);
                EmailResult { success: true, error: None }
            }
            Err(_) => {
                error!("{} returned {}", kind.path(), status);
                failure(&format!("email service returned {}", status))
            }
        }
    }
}

fn failure(msg: &str) -> EmailResult {
    EmailResult {
        success: false,
        error: Some(msg.to_string()),
    }
}

/// POST /inquiries/partnership
pub async fn partnership_inquiry(
    State(state): State<AppState>,
    Json(req): Json<InquiryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    forward_inquiry(&state, EmailKind::Partnership, "Partnership inquiry", req).await
}

/// POST /inquiries/suitability
pub async fn suitability_inquiry(
    State(state): State<AppState>,
    Json(req): Json<InquiryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    forward_inquiry(&state, EmailKind::Suitability, "Suitability assessment", req).await
}

async fn forward_inquiry(
    state: &AppState,
    kind: EmailKind,
    heading: &str,
    req: InquiryRequest,
) -> Result<(StatusCode, Json<EmailResult>), ApiError> {
    if req.name.trim().is_empty() || req.message.trim().is_empty() {
        return Err(ApiError::bad_request("name and message are required"));
    }
    if !is_valid_email(&req.email) {
        return Err(ApiError::bad_request("invalid email address"));
    }

    let Some(office) = state.config.office_email.clone() else {
        warn!("{} received but no office address is configured", heading);
        return Ok((StatusCode::SERVICE_UNAVAILABLE, Json(failure("inquiries are not being accepted"))));
    };

    let fields = [
        ("Name", Some(req.name.trim().to_string())),
        ("Email", Some(normalize_email(&req.email))),
        ("Phone", req.phone.clone()),
        ("Organisation", req.organisation.clone()),
        ("Course", req.course.map(|c| c.as_str().to_string())),
    ];

    let mut text = format!("{}\n\n", heading);
    let mut html = format!("<h2>{}</h2><ul>", escape_html(heading));
    for (label, value) in fields.iter() {
        if let Some(value) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            text.push_str(&format!("{}: {}\n", label, value));
            html.push_str(&format!("<li><strong>{}:</strong> {}</li>", label, escape_html(value)));
        }
    }
    text.push_str(&format!("\n{}\n", req.message.trim()));
    html.push_str(&format!("</ul><p>{}</p>", escape_html(req.message.trim())));

    let payload = EmailPayload {
        recipients: vec![office],
        subject: format!("{} from {}", heading, req.name.trim()),
        html_content: html,
        text_content: text,
        from_name: state.config.email_from_name.clone(),
    };

    let result = state.mailer.send(kind, &payload).await;
    if result.success {
        info!("{} forwarded", heading);
        Ok((StatusCode::OK, Json(result)))
    } else {
        Ok((StatusCode::BAD_GATEWAY, Json(result)))
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
