use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use tracing::error;

use crate::engine::error::{EngineError, RuleViolation};

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::NotFound { .. } => StatusCode::NOT_FOUND,
            EngineError::Rule(RuleViolation::InsufficientPoints { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            EngineError::Rule(_) | EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let body = match self {
            EngineError::Persistence(detail) => {
                error!(error = %detail, "Request failed on storage");
                json!({"error": self.code(), "message": "Internal Server Error"})
            }
            EngineError::Conflict(_) => {
                json!({"error": self.code(), "message": self.to_string(), "retryable": true})
            }
            _ => json!({"error": self.code(), "message": self.to_string()}),
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_violations_map_to_client_errors() {
        let poor = EngineError::from(RuleViolation::InsufficientPoints {
            required: 10,
            available: 2,
        });
        assert_eq!(poor.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            EngineError::from(RuleViolation::OutOfStock).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            EngineError::validation("x").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EngineError::NotFound { entity: "reward", id: 1 }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EngineError::Persistence("down".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
