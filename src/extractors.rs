// src/extractors.rs

use axum::{
    Json,
    extract::{FromRequest, Request},
};

use crate::error::AppError;

/// JSON body extractor whose rejections use the `AppError` body shape
/// instead of axum's plain-text ones.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => {
                let message = format!("Invalid request body: {}", rejection.body_text());
                tracing::warn!("{}", message);
                Err(AppError::BadRequest(message))
            }
        }
    }
}
