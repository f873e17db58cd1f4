use std::path::PathBuf;

use anyhow::Context;

use portal_core::email::normalize_email;
use portal_core::scores::MonthDay;

/// Portal settings read once at startup.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub storage_dir: PathBuf,
    /// Signing up or in with this address always yields an admin account.
    pub primary_admin_email: Option<String>,
    /// Base URL of the email service; `None` disables outbound mail.
    pub email_endpoint: Option<String>,
    pub email_from_name: String,
    /// Where partnership and suitability inquiries are forwarded.
    pub office_email: Option<String>,
    pub portfolio_target: usize,
    pub average_window: usize,
    pub deadline: MonthDay,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from("./portal-storage"),
            primary_admin_email: None,
            email_endpoint: None,
            email_from_name: "Admissions Portal".into(),
            office_email: None,
            portfolio_target: 20,
            average_window: 3,
            deadline: MonthDay::EARLY_UCAS_DEADLINE,
        }
    }
}

impl PortalConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let deadline = match non_empty("PORTAL_DEADLINE") {
            Some(raw) => raw
                .parse::<MonthDay>()
                .map_err(|e| anyhow::anyhow!("PORTAL_DEADLINE: {}", e))?,
            None => defaults.deadline,
        };

        Ok(Self {
            storage_dir: non_empty("PORTAL_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage_dir),
            primary_admin_email: non_empty("PORTAL_PRIMARY_ADMIN_EMAIL").map(|e| normalize_email(&e)),
            email_endpoint: non_empty("PORTAL_EMAIL_ENDPOINT").map(|e| e.trim_end_matches('/').to_string()),
            email_from_name: non_empty("PORTAL_EMAIL_FROM_NAME").unwrap_or(defaults.email_from_name),
            office_email: non_empty("PORTAL_OFFICE_EMAIL").map(|e| normalize_email(&e)),
            portfolio_target: parsed("PORTAL_PORTFOLIO_TARGET")?.unwrap_or(defaults.portfolio_target),
            average_window: parsed("PORTAL_AVERAGE_WINDOW")?
                .filter(|w| *w > 0)
                .unwrap_or(defaults.average_window),
            deadline,
        })
    }
}

fn non_empty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed(key: &str) -> anyhow::Result<Option<usize>> {
    non_empty(key)
        .map(|v| v.trim().parse().with_context(|| format!("{} must be a whole number", key)))
        .transpose()
}
