//! Input contracts for the users resource.
//!
//! Request bodies arrive as raw JSON so that type mismatches surface as
//! field-level issues instead of an opaque deserialization failure.

use regex::Regex;
use rocket_okapi::okapi::schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::OnceLock;
use thiserror::Error;
use url::Url;

pub const FULL_NAME_MAX_CHARS: usize = 100;

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9_'+\-.]*[A-Za-z0-9_+\-]@([A-Za-z0-9][A-Za-z0-9\-]*\.)+[A-Za-z]{2,}$")
            .expect("Invalid email regex")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    !email.starts_with('.') && !email.contains("..") && email_regex().is_match(email)
}

pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// A single failed rule, addressed by the JSON field it applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ValidationIssue {
    pub path: String,
    pub message: String,
}

impl ValidationIssue {
    fn new(path: &str, message: impl Into<String>) -> Self {
        Self {
            path: path.to_string(),
            message: message.into(),
        }
    }

    fn with_expected(mut self, expected: &str) -> Self {
        if let Some(received) = self.message.strip_prefix("Expected string, ") {
            self.message = format!("Expected {expected}, {received}");
        }
        self
    }
}

#[derive(Debug, Clone, Error)]
#[error("validation failed: {}", summarize(.issues))]
pub struct ValidationErrors {
    pub issues: Vec<ValidationIssue>,
}

fn summarize(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("{}: {}", issue.path, issue.message))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validated payload for creating a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// Validated payload for updating a user. Identifier, email and timestamps
/// are not updatable and are ignored when present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl NewUser {
    pub fn parse(body: &Value) -> Result<Self, ValidationErrors> {
        let mut issues = Vec::new();
        let object = expect_object(body, &mut issues);

        let email = match object.and_then(|o| o.get("email")) {
            None | Some(Value::Null) => {
                issues.push(ValidationIssue::new("email", "Required"));
                None
            }
            Some(Value::String(email)) => {
                let email = email.trim().to_string();
                if is_valid_email(&email) {
                    Some(email)
                } else {
                    issues.push(ValidationIssue::new("email", "Invalid email address"));
                    None
                }
            }
            Some(other) => {
                issues.push(type_issue("email", other));
                None
            }
        };

        let full_name = object.and_then(|o| full_name_field(o, &mut issues));
        let avatar_url = object.and_then(|o| avatar_url_field(o, &mut issues));

        match email {
            Some(email) if issues.is_empty() => Ok(Self {
                email,
                full_name,
                avatar_url,
            }),
            _ => Err(ValidationErrors { issues }),
        }
    }
}

impl UpdateUser {
    pub fn parse(body: &Value) -> Result<Self, ValidationErrors> {
        let mut issues = Vec::new();
        let object = expect_object(body, &mut issues);

        let full_name = object.and_then(|o| full_name_field(o, &mut issues));
        let avatar_url = object.and_then(|o| avatar_url_field(o, &mut issues));

        if issues.is_empty() {
            Ok(Self {
                full_name,
                avatar_url,
            })
        } else {
            Err(ValidationErrors { issues })
        }
    }

    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.avatar_url.is_none()
    }
}

fn expect_object<'a>(
    body: &'a Value,
    issues: &mut Vec<ValidationIssue>,
) -> Option<&'a Map<String, Value>> {
    match body {
        Value::Object(map) => Some(map),
        other => {
            issues.push(type_issue("", other).with_expected("object"));
            None
        }
    }
}

fn optional_string(
    object: &Map<String, Value>,
    field: &str,
    issues: &mut Vec<ValidationIssue>,
) -> Option<String> {
    match object.get(field) {
        None | Some(Value::Null) => None,
        Some(Value::String(value)) => Some(value.clone()),
        Some(other) => {
            issues.push(type_issue(field, other));
            None
        }
    }
}

fn full_name_field(object: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) -> Option<String> {
    let name = optional_string(object, "fullName", issues)?;
    let length = name.chars().count();
    if length == 0 {
        issues.push(ValidationIssue::new("fullName", "Full name is required"));
        None
    } else if length > FULL_NAME_MAX_CHARS {
        issues.push(ValidationIssue::new("fullName", "Full name too long"));
        None
    } else {
        Some(name)
    }
}

fn avatar_url_field(object: &Map<String, Value>, issues: &mut Vec<ValidationIssue>) -> Option<String> {
    let url = optional_string(object, "avatarUrl", issues)?;
    if is_valid_url(&url) {
        Some(url)
    } else {
        issues.push(ValidationIssue::new("avatarUrl", "Invalid URL"));
        None
    }
}

fn type_issue(path: &str, value: &Value) -> ValidationIssue {
    ValidationIssue::new(
        path,
        format!("Expected string, received {}", json_type_name(value)),
    )
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
