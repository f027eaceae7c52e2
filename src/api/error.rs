use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::error::ChainError;

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for ChainError {
    fn status_code(&self) -> StatusCode {
        match self {
            ChainError::InvalidAmount(_)
            | ChainError::InvalidInput(_)
            | ChainError::InvalidSignature(_)
            | ChainError::StructuralMismatch { .. } => StatusCode::BAD_REQUEST,
            ChainError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ChainError::DuplicateTransaction(_)
            | ChainError::StaleProof
            | ChainError::MiningCancelled(_) => StatusCode::CONFLICT,
            ChainError::NoCandidate(_) | ChainError::UnknownValidator(_) => StatusCode::NOT_FOUND,
            ChainError::PeerUnreachable { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}
