use portal_types::models::User;

/// Substitutes `{name}`, `{email}`, `{course}` and `{entryYear}` in `template` with the
/// recipient's details. Missing details become empty strings.
pub fn personalize(template: &str, recipient: &User) -> String {
    let course = recipient
        .target_course
        .map(|c| capitalize(c.as_str()))
        .unwrap_or_default();
    let entry_year = recipient.entry_year.map(|y| y.to_string()).unwrap_or_default();

    template
        .replace("{name}", &recipient.full_name)
        .replace("{email}", &recipient.email)
        .replace("{course}", &course)
        .replace("{entryYear}", &entry_year)
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Loose shape check: one `@`, something before it, a dotted domain after.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    }
}

pub fn is_valid_url(url: &str) -> bool {
    let url = url.trim();
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.chars().any(char::is_whitespace))
}

/// Lowercased, trimmed form used for storage and lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
