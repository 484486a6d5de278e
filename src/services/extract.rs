//! JSON body extractor that runs `validator` rules before the handler sees
//! the payload.

use axum::Json;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationErrors};

use super::ServiceError;

#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e| ServiceError::Validation(format!("Invalid JSON: {}", e.body_text())))?;

        value
            .validate()
            .map_err(|errors| ServiceError::Validation(first_message(&errors)))?;

        Ok(Self(value))
    }
}

/// First rule message, by field name so the answer is stable
pub fn first_message(errors: &ValidationErrors) -> String {
    let fields = errors.field_errors();
    let mut names: Vec<_> = fields.keys().collect();
    names.sort();

    names
        .into_iter()
        .filter_map(|name| fields.get(name))
        .flat_map(|errs| errs.iter())
        .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| "Invalid request".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Probe {
        #[validate(required(message = "name is required"))]
        name: Option<String>,
        #[validate(range(min = 1, message = "qty must be positive"))]
        qty: Option<i64>,
    }

    #[test]
    fn test_first_message_is_deterministic() {
        let probe = Probe {
            name: None,
            qty: Some(0),
        };
        let errors = probe.validate().unwrap_err();
        assert_eq!(first_message(&errors), "name is required");
    }
}
