//! Request body validation
//!
//! `ValidatedJson<T>` deserializes a JSON body and runs `validator` rules on
//! it. Nested struct and list errors are flattened into dotted camelCase
//! paths (`address.postalCode`, `departments.0.name`) so the client can map
//! them straight onto form fields. Bodies that are well-formed JSON but do
//! not fit the target type (missing fields, wrong types) are reported the
//! same way; only unreadable bodies get a 400.

use std::collections::BTreeMap;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    Json,
};
use serde::de::DeserializeOwned;
use serde_path_to_error::Segment;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

use crate::error::AppError;

/// Field path -> messages
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// JSON extractor that rejects invalid bodies with 422
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<serde_json::Value>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| AppError::BadRequest(rejection.body_text()))?;

        let value: T = serde_path_to_error::deserialize(raw).map_err(shape_error)?;

        value
            .validate()
            .map_err(|errors| AppError::Validation(flatten_errors(&errors)))?;

        Ok(ValidatedJson(value))
    }
}

/// Field name from serde's "missing field `name`" message
fn missing_field(message: &str) -> Option<&str> {
    message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.split('`').next())
}

/// Map a deserialization failure onto the field it happened at
fn shape_error(error: serde_path_to_error::Error<serde_json::Error>) -> AppError {
    let mut segments: Vec<String> = error
        .path()
        .iter()
        .filter_map(|segment| match segment {
            Segment::Seq { index } => Some(index.to_string()),
            Segment::Map { key } => Some(to_camel_case(key)),
            Segment::Enum { variant } => Some(variant.clone()),
            _ => None,
        })
        .collect();

    let inner = error.into_inner().to_string();
    let message = match missing_field(&inner) {
        Some(field) => {
            segments.push(to_camel_case(field));
            "is required".to_string()
        }
        None => inner,
    };

    // Wrong top-level shape (array, string...) has no field to point at
    if segments.is_empty() {
        return AppError::BadRequest(message);
    }

    let mut fields = FieldErrors::new();
    fields.insert(segments.join("."), vec![message]);
    AppError::Validation(fields)
}

/// Flatten a (possibly nested) validation report into dotted paths
pub fn flatten_errors(errors: &ValidationErrors) -> FieldErrors {
    let mut out = FieldErrors::new();
    flatten_into("", errors, &mut out);
    out
}

fn flatten_into(prefix: &str, errors: &ValidationErrors, out: &mut FieldErrors) {
    for (field, kind) in errors.errors() {
        let path = join_path(prefix, &to_camel_case(&field.to_string()));
        match kind {
            ValidationErrorsKind::Field(list) => {
                let messages = out.entry(path.clone()).or_default();
                messages.extend(list.iter().map(message_for));
            }
            ValidationErrorsKind::Struct(inner) => flatten_into(&path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (index, inner) in items {
                    flatten_into(&format!("{}.{}", path, index), inner, out);
                }
            }
        }
    }
}

fn join_path(prefix: &str, field: &str) -> String {
    if prefix.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", prefix, field)
    }
}

/// `postal_code` -> `postalCode`
fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = !out.is_empty();
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn message_for(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }

    let param = |key: &str| error.params.get(key).map(|v| v.to_string());

    match error.code.as_ref() {
        "length" => match (param("min"), param("max")) {
            (Some(min), Some(max)) => format!("length must be between {} and {}", min, max),
            (Some(min), None) => format!("length must be at least {}", min),
            (None, Some(max)) => format!("length must be at most {}", max),
            (None, None) => "has an invalid length".to_string(),
        },
        "range" => "is out of range".to_string(),
        "email" => "must be a valid email address".to_string(),
        "url" => "must be a valid URL".to_string(),
        "required" => "is required".to_string(),
        code => format!("failed {} check", code),
    }
}
