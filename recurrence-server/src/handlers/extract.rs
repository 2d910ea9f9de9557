//! Extractors whose rejections render as `AppError`

use axum::extract::{FromRequest, FromRequestParts};

use crate::AppError;

/// `Json` body; malformed or mistyped payloads become a 400 `ValidationError`
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// `Path` parameters; unparsable ids become a 400 `ValidationError`
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct AppPath<T>(pub T);
