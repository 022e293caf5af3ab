//! Response builders shared by both lambdas. Every response carries the
//! permissive CORS headers the web client depends on.

use crate::error::ApiError;
use crate::types::ErrorResponse;
use lambda_http::{http::StatusCode, Body, Error, Response};
use serde::Serialize;

pub fn cors_preflight() -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Methods", "GET,POST,OPTIONS")
        .header(
            "Access-Control-Allow-Headers",
            "Content-Type,Authorization,X-Client-Info,Apikey",
        )
        .body(Body::Empty)
        .map_err(Box::new)?)
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(serde_json::to_string(body)?.into())
        .map_err(Box::new)?)
}

pub fn text_response(status: StatusCode, body: &str) -> Result<Response<Body>, Error> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .header("Access-Control-Allow-Origin", "*")
        .body(body.to_string().into())
        .map_err(Box::new)?)
}

pub fn error_json(err: &ApiError) -> Result<Response<Body>, Error> {
    let body = ErrorResponse {
        error: err.code().to_string(),
        message: err.to_string(),
    };
    json_response(err.status(), &body)
}

/// Plain-text variant used on the emailed-link endpoint, where the
/// "client" is a person's browser rather than the web app.
pub fn error_text(err: &ApiError) -> Result<Response<Body>, Error> {
    text_response(err.status(), &err.to_string())
}

pub fn method_not_allowed() -> Result<Response<Body>, Error> {
    text_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
}
