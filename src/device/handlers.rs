use actix_web::http::header::{self, HeaderValue};
use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{debug, info};

use crate::device::classifier::{classify, DeviceClassification};
use crate::device::hints::{user_agent, viewport_hints};
use crate::device::responder::{mime_type, ResponsePlan};
use crate::error::AppError;
use crate::AppState;

const VARY: &str = "User-Agent, Sec-CH-Viewport-Width, Viewport-Width, Sec-CH-UA-Mobile";
const ACCEPT_CH: &str = "Sec-CH-Viewport-Width, Sec-CH-Viewport-Height, Sec-CH-UA-Mobile";

/// Server-side classification of the incoming request.
pub fn classify_request(req: &HttpRequest) -> DeviceClassification {
    classify(user_agent(req), &viewport_hints(req))
}

fn device_response(plan: &ResponsePlan, content_type: &'static str) -> actix_web::HttpResponseBuilder {
    let mut builder = HttpResponse::Ok();
    builder
        .content_type(content_type)
        .insert_header((header::CACHE_CONTROL, plan.cache_control.as_str()))
        .insert_header((header::VARY, HeaderValue::from_static(VARY)))
        .insert_header(("Accept-CH", HeaderValue::from_static(ACCEPT_CH)))
        .insert_header(("X-Device-Type", plan.markup.as_str()));
    builder
}

async fn render(page: &str, req: &HttpRequest, state: &AppState) -> HttpResponse {
    let classification = classify_request(req);
    let plan = state.responder.respond(Some(&classification));
    info!(
        "Serving {} page as {} ({:?})",
        page,
        plan.markup.as_str(),
        classification.os
    );

    let html = state.responder.render_page(page, &plan).await;
    device_response(&plan, "text/html; charset=utf-8").body(html)
}

pub async fn index(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    render("index", &req, &state).await
}

pub async fn login_page(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    render("login", &req, &state).await
}

pub async fn asset(
    req: HttpRequest,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let classification = classify_request(&req);
    let plan = state.responder.respond(Some(&classification));

    let Some(resolved) = state.responder.resolve_asset(&plan, &path).await else {
        debug!("Asset not found: {}", path.as_str());
        return Ok(HttpResponse::NotFound().finish());
    };

    let bytes = tokio::fs::read(&resolved.path).await?;
    debug!(
        "Serving asset {} ({} bytes, fallback: {})",
        resolved.path.display(),
        bytes.len(),
        resolved.from_fallback
    );

    Ok(device_response(&plan, mime_type(&resolved.path)).body(bytes))
}
