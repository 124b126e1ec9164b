//! # Auth Request Handlers
//!
//! HTTP handlers for the `/v1/auth` surface. Each handler:
//!
//! 1. **Extracts** request data (JSON body, bearer header, cookie)
//! 2. **Validates** shape with the `validator` crate
//! 3. **Calls** the service layer
//! 4. **Transforms** the result into the wire response
//!
//! ## Continuation-Token Cookie
//!
//! The continuation token never appears in a response body. It rides an
//! `HttpOnly; Secure; SameSite=Strict; Path=/` cookie named
//! `refreshToken` with `Max-Age` equal to the refresh lifetime. Refresh
//! rewrites it; logout and failed refresh clear it (`Max-Age=0`).

use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    web, HttpRequest, HttpResponse,
};
use chrono::Utc;
use shared::{
    errors::{ApiError, ErrorResponse},
    validation,
};

use crate::AppState;

use super::dto::{
    ChangePasswordRequest, ForgotPasswordRequest, HealthResponse, LoggedInUserDto, LoginRequest,
    LoginResponse, MeResponse, MessageResponse, RefreshResponse, RegisterRequest, RegisterResponse,
    RegisteredUserDto, ResendVerificationRequest, ResetPasswordRequest, VerifyEmailRequest,
};

/// Cookie carrying the continuation token.
pub const REFRESH_COOKIE: &str = "refreshToken";

// =============================================================================
// COOKIE HELPERS
// =============================================================================

/// Builds the continuation-token cookie.
fn refresh_cookie(value: &str, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build(REFRESH_COOKIE, value.to_owned())
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(CookieDuration::seconds(max_age_seconds))
        .finish()
}

/// A `Max-Age=0` cookie that clears the client's continuation token.
fn clear_refresh_cookie() -> Cookie<'static> {
    refresh_cookie("", 0)
}

// =============================================================================
// BEARER EXTRACTION
// =============================================================================

/// Extracts the bearer token from the `Authorization` header.
pub(crate) fn extract_bearer_token(req: &HttpRequest) -> Result<String, ApiError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .ok_or(ApiError::MissingAuth)?
        .to_str()
        .map_err(|_| ApiError::InvalidToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::InvalidToken)?;

    if token.is_empty() {
        return Err(ApiError::InvalidToken);
    }

    Ok(token.to_string())
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

/// `GET /health` - reports service and store reachability.
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let database = match shared::database::health_check(&state.db_pool).await {
        Ok(()) => "up",
        Err(_) => "down",
    };
    let redis = match state.redis_client.ping().await {
        Ok(()) => "up",
        Err(_) => "down",
    };

    let healthy = database == "up" && redis == "up";
    let response = HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        service: state.service_name.clone(),
        database: database.to_string(),
        redis: redis.to_string(),
        timestamp: Utc::now().to_rfc3339(),
    };

    if healthy {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

// =============================================================================
// REGISTRATION
// =============================================================================

/// `POST /v1/auth/register`
///
/// 201 with the access token and a compact user view; sets the
/// continuation-token cookie. The principal is logged in immediately -
/// email verification is pending, not blocking.
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let response = state
        .auth_service
        .register(&body.email, &body.password, body.display_name.as_deref())
        .await?;

    let cookie = refresh_cookie(
        &response.tokens.refresh_token,
        response.tokens.refresh_expires_in,
    );

    Ok(HttpResponse::Created().cookie(cookie).json(RegisterResponse {
        message: "Registration successful".to_string(),
        access_token: response.tokens.access_token,
        user: RegisteredUserDto {
            id: response.user.id,
            email: response.user.email,
            display_name: response.user.display_name,
        },
    }))
}

// =============================================================================
// LOGIN
// =============================================================================

/// `POST /v1/auth/login`
///
/// 200 with a fresh pair. Unknown email and wrong password share one 401
/// body and comparable timing.
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    let response = state.auth_service.login(&body.email, &body.password).await?;

    let cookie = refresh_cookie(
        &response.tokens.refresh_token,
        response.tokens.refresh_expires_in,
    );

    Ok(HttpResponse::Ok().cookie(cookie).json(LoginResponse {
        message: "Login successful".to_string(),
        access_token: response.tokens.access_token,
        user: LoggedInUserDto {
            id: response.user.id,
            email: response.user.email,
            display_name: response.user.display_name,
            email_verified: response.user.email_verified,
        },
    }))
}

// =============================================================================
// TOKEN REFRESH
// =============================================================================

/// `POST /v1/auth/refresh`
///
/// Consumes the `refreshToken` cookie, rotates it, and returns a new
/// access token. Any failure answers 401 *and* clears the cookie so the
/// client drops its dead bearer.
pub async fn refresh(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let bearer = match req.cookie(REFRESH_COOKIE) {
        Some(cookie) => cookie.value().to_string(),
        None => {
            let error = ApiError::MissingAuth;
            return HttpResponse::build(error.status_code())
                .cookie(clear_refresh_cookie())
                .json(ErrorResponse::new(&error));
        }
    };

    match state.auth_service.refresh(&bearer).await {
        Ok(tokens) => {
            let cookie = refresh_cookie(&tokens.refresh_token, tokens.refresh_expires_in);
            HttpResponse::Ok()
                .cookie(cookie)
                .json(RefreshResponse { access_token: tokens.access_token })
        }
        Err(error) => HttpResponse::build(error.status_code())
            .cookie(clear_refresh_cookie())
            .json(ErrorResponse::new(&error)),
    }
}

// =============================================================================
// LOGOUT
// =============================================================================

/// `POST /v1/auth/logout`
///
/// Best-effort revocation of both credentials; always 200 with the
/// cookie cleared. Logout is about local intent, with server help where
/// possible.
pub async fn logout(req: HttpRequest, state: web::Data<AppState>) -> HttpResponse {
    let access_token = extract_bearer_token(&req).ok();
    let refresh_token = req.cookie(REFRESH_COOKIE).map(|c| c.value().to_string());

    state
        .auth_service
        .logout(access_token.as_deref(), refresh_token.as_deref())
        .await;

    HttpResponse::Ok()
        .cookie(clear_refresh_cookie())
        .json(MessageResponse::new("Logged out"))
}

// =============================================================================
// PROFILE
// =============================================================================

/// `GET /v1/auth/me`
///
/// Bearer required (blacklist-gated); returns the full non-sensitive
/// principal view.
pub async fn me(req: HttpRequest, state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let access_token = extract_bearer_token(&req)?;
    let claims = state.auth_service.authenticate(&access_token).await?;

    let user = state.auth_service.get_profile(claims.sub).await?;

    Ok(HttpResponse::Ok().json(MeResponse { user }))
}

// =============================================================================
// PASSWORD CHANGE
// =============================================================================

/// `POST /v1/auth/change-password`
pub async fn change_password(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<ChangePasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let access_token = extract_bearer_token(&req)?;
    let claims = state.auth_service.authenticate(&access_token).await?;

    let body = body.into_inner();
    validation::validate_request(&body)?;

    state
        .auth_service
        .change_password(claims.sub, &body.current_password, &body.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Password changed")))
}

// =============================================================================
// EMAIL VERIFICATION
// =============================================================================

/// `POST /v1/auth/verify-email` - single opaque 400 on any miss.
pub async fn verify_email(
    state: web::Data<AppState>,
    body: web::Json<VerifyEmailRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    state.auth_service.verify_email(&body.token).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new("Email verified")))
}

/// `POST /v1/auth/resend-verification` - success for absent accounts.
pub async fn resend_verification(
    state: web::Data<AppState>,
    body: web::Json<ResendVerificationRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    state.auth_service.resend_verification(&body.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "If the account exists and is unverified, a verification email has been sent",
    )))
}

// =============================================================================
// PASSWORD RESET
// =============================================================================

/// `POST /v1/auth/forgot-password` - opaque success for every account
/// state.
pub async fn forgot_password(
    state: web::Data<AppState>,
    body: web::Json<ForgotPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    state.auth_service.forgot_password(&body.email).await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "If an account exists with this email, a password reset link has been sent",
    )))
}

/// `POST /v1/auth/reset-password` - generic 400 for used/expired tokens.
pub async fn reset_password(
    state: web::Data<AppState>,
    body: web::Json<ResetPasswordRequest>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    validation::validate_request(&body)?;

    state
        .auth_service
        .reset_password(&body.token, &body.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(MessageResponse::new(
        "Password reset successfully. Please log in with your new password.",
    )))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_extract_bearer_token_valid() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer my_token_123"))
            .to_http_request();

        assert_eq!(extract_bearer_token(&req).unwrap(), "my_token_123");
    }

    #[test]
    fn test_extract_bearer_token_missing_header() {
        let req = TestRequest::default().to_http_request();
        assert!(matches!(extract_bearer_token(&req), Err(ApiError::MissingAuth)));
    }

    #[test]
    fn test_extract_bearer_token_wrong_scheme() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Basic dXNlcjpwYXNz"))
            .to_http_request();

        assert!(matches!(extract_bearer_token(&req), Err(ApiError::InvalidToken)));
    }

    #[test]
    fn test_extract_bearer_token_empty() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer "))
            .to_http_request();

        assert!(extract_bearer_token(&req).is_err());
    }

    #[test]
    fn test_refresh_cookie_attributes() {
        let cookie = refresh_cookie("bearer-value", 604800);

        assert_eq!(cookie.name(), "refreshToken");
        assert_eq!(cookie.value(), "bearer-value");
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Strict));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.max_age(), Some(CookieDuration::seconds(604800)));
    }

    #[test]
    fn test_clear_cookie_has_zero_max_age() {
        let cookie = clear_refresh_cookie();
        assert_eq!(cookie.value(), "");
        assert_eq!(cookie.max_age(), Some(CookieDuration::ZERO));
    }
}
