//! Server-side checks for the sign-up, verification and questionnaire forms.

use crate::models::ProfileAnswers;
use crate::utils::{otp::OTP_LENGTH, AppError};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 20;
pub const PASSWORD_MIN_LEN: usize = 6;
pub const PASSWORD_STRONG_LEN: usize = 8;

const EMAIL_LOCAL_SPECIALS: &str = "!#$%&'*+/=?^_`{|}~-";

/// First failing username rule, if any.
pub fn check_username(username: &str) -> Option<String> {
    let len = username.chars().count();
    if len < USERNAME_MIN_LEN {
        return Some("Username must be at least 3 characters long".to_string());
    }
    if len > USERNAME_MAX_LEN {
        return Some("Username must be at most 20 characters long".to_string());
    }

    let mut chars = username.chars();
    let starts_with_letter = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
    let rest_valid = chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !starts_with_letter || !rest_valid {
        return Some(
            "Username must start with a letter and contain only letters, numbers, '-' or '_'"
                .to_string(),
        );
    }
    None
}

/// `local@label.label...`, labels alphanumeric with inner hyphens, at least one dot.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    let local_ok = !local.is_empty()
        && local.split('.').all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || EMAIL_LOCAL_SPECIALS.contains(c))
        });

    let labels: Vec<&str> = domain.split('.').collect();
    let domain_ok = labels.len() >= 2
        && labels.iter().all(|label| {
            !label.is_empty()
                && !label.starts_with('-')
                && !label.ends_with('-')
                && label
                    .chars()
                    .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        });

    local_ok && domain_ok
}

pub fn check_email(email: &str) -> Option<String> {
    if is_valid_email(email) {
        None
    } else {
        Some("Invalid email address".to_string())
    }
}

pub fn check_password(password: &str) -> Option<String> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Some("Password must be at least 6 characters long".to_string());
    }

    let strong = password.chars().count() >= PASSWORD_STRONG_LEN
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase());
    if !strong {
        return Some(
            "Password must be at least 8 characters and include an uppercase letter, a lowercase letter and a number"
                .to_string(),
        );
    }
    None
}

pub fn validate_sign_up(username: &str, email: &str, password: &str) -> Result<(), AppError> {
    collect([check_username(username), check_email(email), check_password(password)])
}

pub fn validate_username_query(username: Option<&str>) -> Result<(), AppError> {
    match username {
        Some(username) => collect([check_username(username)]),
        None => Err(AppError::validation("Username is required")),
    }
}

pub fn validate_verification(username: &str, code: &str) -> Result<(), AppError> {
    let username_error = username
        .is_empty()
        .then(|| "Username is required".to_string());
    let code_error = (code.chars().count() != OTP_LENGTH)
        .then(|| "Verification code must be 6 characters long".to_string());
    collect([username_error, code_error])
}

/// An optional portfolio link must be an absolute http(s) URL.
pub fn check_project_url(url: &str) -> Option<String> {
    match reqwest::Url::parse(url.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => None,
        _ => Some("Project URL must be a valid http(s) URL".to_string()),
    }
}

pub fn validate_profile(answers: &ProfileAnswers) -> Result<(), AppError> {
    let required = [
        ("hobbies", &answers.hobbies),
        ("skills", &answers.skills),
        ("education", &answers.education),
        ("workStyle", &answers.work_style),
        ("interests", &answers.interests),
    ];

    let mut errors: Vec<Option<String>> = required
        .iter()
        .map(|(name, value)| {
            value
                .trim()
                .is_empty()
                .then(|| format!("{} is required", name))
        })
        .collect();

    if let Some(url) = answers.project_url.as_deref().filter(|u| !u.trim().is_empty()) {
        errors.push(check_project_url(url));
    }

    collect(errors)
}

fn collect(checks: impl IntoIterator<Item = Option<String>>) -> Result<(), AppError> {
    let errors: Vec<String> = checks.into_iter().flatten().collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::Validation(errors))
    }
}
