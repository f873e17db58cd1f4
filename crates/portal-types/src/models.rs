use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned when a stored or submitted string does not name a known variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares a closed enum stored as lowercase text in the database and on the wire.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident, $kind:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant { kind: $kind, value: other.to_string() }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

text_enum!(
    /// Portal roles are mutually exclusive and not hierarchical.
    Role, "role" {
        Student => "student",
        Parent => "parent",
        Mentor => "mentor",
        Admin => "admin",
    }
);

text_enum!(
    ApprovalStatus, "approval status" {
        Pending => "pending",
        Approved => "approved",
        Rejected => "rejected",
    }
);

text_enum!(
    OnboardingStatus, "onboarding status" {
        Pending => "pending",
        Complete => "complete",
    }
);

text_enum!(
    TargetCourse, "target course" {
        Medicine => "medicine",
        Dentistry => "dentistry",
        Veterinary => "veterinary",
    }
);

text_enum!(
    /// Area of student data a mentor comment is scoped to.
    Section, "section" {
        Ucat => "ucat",
        Portfolio => "portfolio",
        WorkExperience => "work_experience",
        Volunteering => "volunteering",
        Supracurricular => "supracurricular",
        Documents => "documents",
        Other => "other",
    }
);

text_enum!(
    CommentType, "comment type" {
        Feedback => "feedback",
        Plan => "plan",
        Suggestion => "suggestion",
    }
);

text_enum!(
    ActivityCategory, "activity category" {
        WorkExperience => "work_experience",
        Volunteering => "volunteering",
        Supracurricular => "supracurricular",
    }
);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
    pub approval_status: ApprovalStatus,
    pub onboarding_status: OnboardingStatus,
    pub full_name: String,
    pub phone: Option<String>,
    pub school: Option<String>,
    pub academic_summary: Option<String>,
    pub target_course: Option<TargetCourse>,
    pub entry_year: Option<i32>,
    pub created_at: DateTime<Utc>,
}

/// Minimal view of a user used in pickers and link listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

impl From<&User> for UserSummary {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role: user.role,
        }
    }
}

/// One post in a conversation.
///
/// `recipient_id` is `None` when the message is addressed to the subject
/// student as a role rather than to a specific account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Option<Uuid>,
    pub student_id: Option<Uuid>,
    pub subject: Option<String>,
    pub body: String,
    pub parent_message_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// A message together with its replies, each reply carrying its own replies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThreadNode {
    #[serde(flatten)]
    pub message: Message,
    pub replies: Vec<ThreadNode>,
}

impl ThreadNode {
    /// Depth-first, pre-order walk over the node and all of its descendants.
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.replies.iter().rev());
            Some(&node.message)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentorComment {
    pub id: Uuid,
    pub author_id: Uuid,
    pub student_id: Uuid,
    pub section: Section,
    pub section_item_id: Option<Uuid>,
    pub comment_type: CommentType,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UcatMock {
    pub id: Uuid,
    pub student_id: Uuid,
    pub mock_name: String,
    pub test_date: Option<NaiveDate>,
    pub verbal_reasoning: u16,
    pub decision_making: u16,
    pub quantitative_reasoning: u16,
    pub total: u16,
    pub sjt_band: Option<u8>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioActivity {
    pub id: Uuid,
    pub student_id: Uuid,
    pub category: ActivityCategory,
    pub title: String,
    pub organisation: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub hours: Option<f64>,
    pub reflection: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub student_id: Uuid,
    pub uploader_id: Uuid,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    pub sha256: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub url: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Identifier of a record edited in a bulk form: either a client-side
/// placeholder that has never been stored, or the id of a stored row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum RecordId {
    Temporary(String),
    Persisted(Uuid),
}

impl RecordId {
    pub fn persisted(&self) -> Option<Uuid> {
        match self {
            RecordId::Persisted(id) => Some(*id),
            RecordId::Temporary(_) => None,
        }
    }
}
