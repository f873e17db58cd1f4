use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{
    ActivityCategory, ApprovalStatus, CommentType, OnboardingStatus, RecordId, Role, Section,
    TargetCourse, User, UserSummary,
};

// -- JWT Claims --

/// Bearer token claims. Role and approval state are deliberately absent: they
/// are re-read from the database on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: User,
}

// -- Profile & identity --

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub school: Option<String>,
    pub academic_summary: Option<String>,
    pub target_course: Option<TargetCourse>,
    pub entry_year: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AdminUpdateUserRequest {
    pub role: Option<Role>,
    pub approval_status: Option<ApprovalStatus>,
    pub onboarding_status: Option<OnboardingStatus>,
    #[serde(flatten)]
    pub profile: UpdateProfileRequest,
}

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    pub role: Option<Role>,
    pub approval_status: Option<ApprovalStatus>,
}

#[derive(Debug, Deserialize)]
pub struct SubjectQuery {
    pub student_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SubjectResponse {
    /// The student whose records populate the dashboard, if any.
    pub subject: Option<UserSummary>,
    /// Students the viewer may switch between.
    pub available: Vec<UserSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateGrantRequest {
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminGrantResponse {
    pub email: String,
    pub granted_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// -- Relationships --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LinkRequest {
    /// Parent or mentor side of the link.
    pub user_id: Uuid,
    pub student_id: Uuid,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub recipient_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub body: String,
    pub subject: Option<String>,
    pub parent_message_id: Option<Uuid>,
    pub thread_id: Option<Uuid>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessagesQuery {
    pub student_id: Option<Uuid>,
    /// Admin only: read another user's mailbox.
    pub user_id: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UnreadResponse {
    pub count: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MarkReadResponse {
    pub updated: usize,
}

// -- Mentor comments --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateCommentRequest {
    pub section: Section,
    pub section_item_id: Option<Uuid>,
    pub comment_type: CommentType,
    pub body: String,
    /// Admin only: author the comment as this mentor.
    pub author_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateCommentRequest {
    pub body: Option<String>,
    pub comment_type: Option<CommentType>,
}

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub section: Section,
    pub item_id: Option<Uuid>,
}

// -- UCAT & portfolio --

#[derive(Debug, Clone, Deserialize)]
pub struct UcatMockInput {
    pub mock_name: String,
    pub test_date: Option<NaiveDate>,
    pub verbal_reasoning: u16,
    pub decision_making: u16,
    pub quantitative_reasoning: u16,
    pub sjt_band: Option<u8>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BulkUcatEntry {
    pub id: RecordId,
    #[serde(flatten)]
    pub mock: UcatMockInput,
}

#[derive(Debug, Deserialize)]
pub struct BulkUcatRequest {
    pub entries: Vec<BulkUcatEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub id: RecordId,
    pub persisted_id: Option<Uuid>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BulkUcatResponse {
    pub saved: Vec<BulkOutcome>,
    pub deleted: Vec<BulkOutcome>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioActivityInput {
    pub category: ActivityCategory,
    pub title: String,
    pub organisation: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub hours: Option<f64>,
    pub reflection: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardResponse {
    pub student_id: Uuid,
    pub mock_count: usize,
    pub highest_total: Option<u16>,
    pub recent_average: Option<f64>,
    pub average_window: usize,
    pub portfolio_count: usize,
    pub portfolio_completeness: f64,
    pub days_until_deadline: i64,
    pub unread_messages: u64,
}

// -- Email --

/// Body accepted by the outbound `send-*-email` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailPayload {
    pub recipients: Vec<String>,
    pub subject: String,
    pub html_content: String,
    pub text_content: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailResult {
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdminEmailRequest {
    #[serde(default)]
    pub recipient_ids: Vec<Uuid>,
    /// Send to every approved user holding this role.
    pub role: Option<Role>,
    pub subject: String,
    pub html_content: String,
    pub text_content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmailOutcome {
    pub email: String,
    pub success: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InquiryRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub organisation: Option<String>,
    pub course: Option<TargetCourse>,
    pub message: String,
}

// -- Resources --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateResourceRequest {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: String,
}
