use chrono::{Datelike, NaiveDate};

use crate::api::{ProfileUpdateRequest, RegisterRequest};
use crate::auth::password::password_problems;
use crate::error::ValidationErrors;

const MAX_EMAIL_LENGTH: usize = 254;
const MAX_NAME_LENGTH: usize = 50;
const MAX_COUNTRY_LENGTH: usize = 56;
pub const MAX_SELF_EXCLUSION_DAYS: u32 = 3650;

/// Registration input after shape checks, still holding the raw password.
#[derive(Debug, Clone)]
pub struct ValidRegistration {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: Option<NaiveDate>,
    pub phone: Option<String>,
    pub country: Option<String>,
}

/// Rules that depend on deployment settings.
#[derive(Debug, Clone, Copy)]
pub struct RegistrationRules {
    pub case_insensitive_identities: bool,
    pub minimum_age_years: u32,
}

pub fn normalize_identity(value: &str, case_insensitive: bool) -> String {
    let trimmed = value.trim();
    if case_insensitive {
        trimmed.to_lowercase()
    } else {
        trimmed.to_string()
    }
}

pub fn is_valid_username(username: &str) -> bool {
    let len = username.chars().count();
    (3..=20).contains(&len) && username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `local@domain.tld` with no whitespace and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() > MAX_EMAIL_LENGTH || email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}

pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (7..=15).contains(&digits)
        && phone
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
}

/// Whole years between `dob` and `today`.
pub fn age_on(dob: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - dob.year();
    if (today.month(), today.day()) < (dob.month(), dob.day()) {
        age -= 1;
    }
    age
}

fn check_name(errors: &mut ValidationErrors, field: &str, value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field is required");
    } else if value.chars().count() > MAX_NAME_LENGTH {
        errors.add(field, format!("Must be at most {} characters", MAX_NAME_LENGTH));
    }
    value.to_string()
}

fn check_optional(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&str>,
    valid: impl Fn(&str) -> bool,
    message: &str,
) -> Option<String> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    if !valid(value) {
        errors.add(field, message);
    }
    Some(value.to_string())
}

fn is_valid_country(country: &str) -> bool {
    country.chars().count() <= MAX_COUNTRY_LENGTH
        && country.chars().all(|c| c.is_alphabetic() || c == ' ' || c == '-')
}

/// Check every registration field and collect all problems at once.
pub fn validate_registration(
    req: &RegisterRequest,
    rules: RegistrationRules,
    today: NaiveDate,
) -> Result<ValidRegistration, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let username = normalize_identity(&req.username, rules.case_insensitive_identities);
    if !is_valid_username(&username) {
        errors.add(
            "username",
            "Username must be 3-20 characters of letters, digits or underscores",
        );
    }

    let email = normalize_identity(&req.email, rules.case_insensitive_identities);
    if !is_valid_email(&email) {
        errors.add("email", "Please enter a valid email address");
    }

    for problem in password_problems(&req.password) {
        errors.add("password", problem);
    }

    let first_name = check_name(&mut errors, "firstName", &req.first_name);
    let last_name = check_name(&mut errors, "lastName", &req.last_name);

    let mut date_of_birth = None;
    if let Some(raw) = req.date_of_birth.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(dob) if dob > today => errors.add("dateOfBirth", "Date of birth is in the future"),
            Ok(dob) if age_on(dob, today) < rules.minimum_age_years as i32 => errors.add(
                "dateOfBirth",
                format!("You must be at least {} years old to register", rules.minimum_age_years),
            ),
            Ok(dob) => date_of_birth = Some(dob),
            Err(_) => errors.add("dateOfBirth", "Date of birth must be formatted YYYY-MM-DD"),
        }
    }

    let phone = check_optional(
        &mut errors,
        "phone",
        req.phone.as_deref(),
        is_valid_phone,
        "Please enter a valid phone number",
    );
    let country = check_optional(
        &mut errors,
        "country",
        req.country.as_deref(),
        is_valid_country,
        "Please enter a valid country",
    );

    errors.into_result()?;
    Ok(ValidRegistration {
        username,
        email,
        first_name,
        last_name,
        date_of_birth,
        phone,
        country,
    })
}

/// Checked profile changes; `self_exclusion_days` is resolved to a deadline by
/// the auth service.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub country: Option<String>,
    pub self_exclusion_days: Option<u32>,
}

pub fn validate_profile_update(req: &ProfileUpdateRequest) -> Result<ValidProfileUpdate, ValidationErrors> {
    let mut errors = ValidationErrors::new();

    let first_name = req
        .first_name
        .as_deref()
        .map(|v| check_name(&mut errors, "firstName", v));
    let last_name = req
        .last_name
        .as_deref()
        .map(|v| check_name(&mut errors, "lastName", v));
    let phone = check_optional(
        &mut errors,
        "phone",
        req.phone.as_deref(),
        is_valid_phone,
        "Please enter a valid phone number",
    );
    let country = check_optional(
        &mut errors,
        "country",
        req.country.as_deref(),
        is_valid_country,
        "Please enter a valid country",
    );

    if let Some(days) = req.self_exclusion_days {
        if days == 0 || days > MAX_SELF_EXCLUSION_DAYS {
            errors.add(
                "selfExclusionDays",
                format!("Self-exclusion must be between 1 and {} days", MAX_SELF_EXCLUSION_DAYS),
            );
        }
    }

    errors.into_result()?;
    Ok(ValidProfileUpdate {
        first_name,
        last_name,
        phone,
        country,
        self_exclusion_days: req.self_exclusion_days,
    })
}
