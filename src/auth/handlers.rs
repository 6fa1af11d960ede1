use actix_web::{web, HttpRequest, HttpResponse};
use tracing::{error, info, warn};

use crate::api::{
    AuthResponse, ChangePasswordRequest, LoginRequest, MessageResponse, ProfileResponse,
    ProfileUpdateRequest, RegisterRequest,
};
use crate::auth::extractor::{bearer_token, AuthenticatedUser};
use crate::error::{AppError, AuthError};
use crate::AppState;

async fn throttle(req: &HttpRequest, state: &AppState) -> Result<(), AppError> {
    let key = state.rate_limiter.client_key(req);
    if state.rate_limiter.check_rate_limit(&key).await {
        Ok(())
    } else {
        warn!("Rate limit exceeded for {}", key);
        Err(AuthError::RateLimited.into())
    }
}

pub async fn login(
    http: HttpRequest,
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    throttle(&http, &state).await?;
    info!("Received login request for email: {}", req.email);
    match state.auth_service.login(&req.email, &req.password).await {
        Ok(issued) => {
            info!("Login successful for user {}", issued.user.id);
            Ok(HttpResponse::Ok().json(AuthResponse::new(issued.token, issued.user)))
        }
        Err(e) => {
            warn!("Login failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn register(
    http: HttpRequest,
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    throttle(&http, &state).await?;
    info!("Received registration request for email: {}", req.email);

    match state.auth_service.register(&req).await {
        Ok(issued) => {
            info!("Registration successful for user {}", issued.user.id);
            Ok(HttpResponse::Created().json(AuthResponse::new(issued.token, issued.user)))
        }
        Err(e) => {
            warn!("Registration failed for email: {}: {}", req.email, e);
            Err(e)
        }
    }
}

pub async fn logout(
    req: HttpRequest,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = bearer_token(&req).ok_or(AuthError::MissingToken)?;

    state.auth_service.logout(token).await?;

    Ok(HttpResponse::Ok().json(MessageResponse {
        success: true,
        message: "Successfully logged out".to_string(),
    }))
}

pub async fn get_profile(auth: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(ProfileResponse {
        success: true,
        user: auth.user,
    })
}

pub async fn update_profile(
    auth: AuthenticatedUser,
    req: web::Json<ProfileUpdateRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state
        .auth_service
        .update_profile(auth.user.id, &req)
        .await
        .map_err(|e| {
            error!("Profile update failed for user {}: {}", auth.user.id, e);
            e
        })?;

    info!("Profile updated for user {}", user.id);
    Ok(HttpResponse::Ok().json(ProfileResponse { success: true, user }))
}

pub async fn change_password(
    auth: AuthenticatedUser,
    req: web::Json<ChangePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let issued = state.auth_service.change_password(auth.user.id, &req).await?;
    Ok(HttpResponse::Ok().json(AuthResponse::new(issued.token, issued.user)))
}
