//! JSON envelopes for error responses.
//!
//! Handlers attach their own message to the response; these wrappers keep
//! that message and re-shape the body. The fallback text covers responses
//! that never went through a handler, like unmatched routes.

use actix_web::dev::ServiceResponse;
use actix_web::middleware::ErrorHandlerResponse;
use actix_web::{HttpResponse, Result};

pub fn render_400<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_json(res, "Bad request")
}

pub fn render_401<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_json(res, "Login required")
}

pub fn render_403<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_json(res, "Forbidden")
}

pub fn render_404<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    render_json(res, "Not found")
}

/// 500 bodies never echo the underlying error; the detail stays in the
/// server log.
pub fn render_500<B>(res: ServiceResponse<B>) -> Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    let (req, _) = res.into_parts();

    let json = HttpResponse::build(status).json(serde_json::json!({
        "status": status.as_u16(),
        "error": "Internal server error",
    }));

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, json).map_into_right_body(),
    ))
}

fn render_json<B>(res: ServiceResponse<B>, fallback: &str) -> Result<ErrorHandlerResponse<B>> {
    let status = res.status();
    let message = res
        .response()
        .error()
        .map(|err| err.to_string())
        .unwrap_or_else(|| fallback.to_owned());

    let (req, _) = res.into_parts();
    let json = HttpResponse::build(status).json(serde_json::json!({
        "status": status.as_u16(),
        "error": message,
    }));

    Ok(ErrorHandlerResponse::Response(
        ServiceResponse::new(req, json).map_into_right_body(),
    ))
}
