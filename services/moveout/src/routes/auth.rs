//! Identity and session handlers

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    mailer,
    middleware::AuthCustomer,
    models::{CustomerStatus, NewCustomer, Role, VerificationToken},
    validation,
};

/// Request for account registration
#[derive(Deserialize)]
pub struct RegisterRequest {
    pub mail: Option<String>,
    pub password: Option<String>,
}

/// Request for credential login
#[derive(Deserialize)]
pub struct LoginRequest {
    pub mail: Option<String>,
    pub password: Option<String>,
}

/// Query parameters for email verification
#[derive(Deserialize)]
pub struct VerifyParams {
    pub token: String,
    pub email: String,
}

/// Query parameters for the OAuth callback
#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
}

/// Request for a password change
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub new_password: Option<String>,
}

/// Register a new account
///
/// Creates the customer as unverified, issues a verification token, and
/// sends the verification mail best-effort in the background.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(mail), Some(password)) = (payload.mail, payload.password) else {
        return Err(ApiError::Validation(
            "Mail address and password are required.".to_string(),
        ));
    };

    validation::validate_email(&mail).map_err(ApiError::Validation)?;
    validation::validate_password(&password).map_err(ApiError::Validation)?;

    let existing = state
        .customer_repository
        .find_by_email(&mail)
        .await
        .map_err(|e| {
            error!("Failed to check for existing customer: {}", e);
            ApiError::InternalServerError
        })?;

    if existing.is_some() {
        return Err(ApiError::Conflict("Mail address already in use.".to_string()));
    }

    state
        .customer_repository
        .create(&NewCustomer {
            email: mail.clone(),
            password,
        })
        .await
        .map_err(|e| {
            error!("Failed to create customer: {}", e);
            ApiError::InternalServerError
        })?;

    let token = VerificationToken::issue(&mail);
    state.token_repository.insert(&token).await.map_err(|e| {
        error!("Failed to store verification token: {}", e);
        ApiError::InternalServerError
    })?;

    // Best-effort: a failed send is logged, never surfaced
    let mailer_handle = state.mailer.clone();
    let frontend_url = state.frontend_url.clone();
    tokio::spawn(async move {
        let (subject, body) = mailer::verification_message(&frontend_url, &token.email, &token.token);
        if let Err(e) = mailer_handle.send(&token.email, &subject, &body).await {
            error!("Error sending verification email: {}", e);
        }
    });

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "User registered successfully! A verification link has been sent to your submitted e-mail address"
        })),
    ))
}

/// Redeem a verification token
pub async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyParams>,
) -> ApiResult<impl IntoResponse> {
    let token = state
        .token_repository
        .find_valid(&params.token, &params.email)
        .await
        .map_err(|e| {
            error!("Failed to look up verification token: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::Validation("Invalid or expired token.".to_string()))?;

    state
        .customer_repository
        .mark_verified(&token.email)
        .await
        .map_err(|e| {
            error!("Failed to mark customer verified: {}", e);
            ApiError::InternalServerError
        })?;

    // Consume only the redeemed token; outstanding ones stay valid
    state
        .token_repository
        .consume(&token.token)
        .await
        .map_err(|e| {
            error!("Failed to consume verification token: {}", e);
            ApiError::InternalServerError
        })?;

    Ok(Json(json!({"message": "Email verified successfully!"})))
}

/// Log in with credentials
///
/// One uniform failure message for a missing account, an unusable status,
/// and a wrong password.
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(mail), Some(password)) = (payload.mail, payload.password) else {
        return Err(ApiError::Validation(
            "Email and password are required.".to_string(),
        ));
    };

    let bad_credentials = || ApiError::Auth("Invalid email or password.".to_string());

    let customer = state
        .customer_repository
        .find_by_email(&mail)
        .await
        .map_err(|e| {
            error!("Failed to look up customer: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(bad_credentials)?;

    if customer.status != CustomerStatus::Verified {
        return Err(bad_credentials());
    }

    let password_matches = state
        .customer_repository
        .verify_password(&customer, &password)
        .map_err(|e| {
            error!("Failed to verify password: {}", e);
            ApiError::InternalServerError
        })?;

    if !password_matches {
        return Err(bad_credentials());
    }

    let token = state
        .jwt_service
        .generate_session_token(customer.customer_id)
        .map_err(|e| {
            error!("Failed to generate session token: {}", e);
            ApiError::InternalServerError
        })?;

    info!("Customer {} logged in", customer.customer_id);

    Ok(Json(json!({
        "message": "Logged in successfully!",
        "token": token,
        "customerId": customer.customer_id,
        "role": customer.role,
        "expiresIn": state.jwt_service.session_expiry(),
    })))
}

/// Initiate the Google login flow
pub async fn google_login(State(state): State<AppState>) -> Redirect {
    Redirect::to(&state.oauth_client.generate_auth_url())
}

/// Handle the Google login callback
///
/// This leg is a browser redirect chain, not a programmatic call, so both
/// outcomes are redirects back to the frontend.
pub async fn google_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    match federated_login(&state, params.code).await {
        Ok((token, customer_id, role)) => Redirect::to(&format!(
            "{}/google-login-callback?token={}&customerId={}&role={}",
            state.frontend_url,
            token,
            customer_id,
            role.as_str()
        )),
        Err(e) => {
            error!("Google login failed: {}", e);
            Redirect::to(&format!("{}/login", state.frontend_url))
        }
    }
}

/// Exchange the authorization code, then find-or-create the customer
async fn federated_login(
    state: &AppState,
    code: Option<String>,
) -> anyhow::Result<(String, i64, Role)> {
    let code = code.ok_or_else(|| anyhow::anyhow!("Missing authorization code"))?;

    let access_token = state.oauth_client.exchange_code(code).await?;
    let profile = state.oauth_client.get_user_profile(&access_token).await?;

    let customer = match state
        .customer_repository
        .find_by_email(&profile.email)
        .await?
    {
        Some(customer) => customer,
        // First federated login: the provider vouches for the address
        None => {
            state
                .customer_repository
                .create_verified(&profile.email)
                .await?
        }
    };

    let token = state
        .jwt_service
        .generate_session_token(customer.customer_id)?;

    info!("Customer {} logged in via Google", customer.customer_id);
    Ok((token, customer.customer_id, customer.role))
}

/// Change the caller's password
pub async fn update_password(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Json(payload): Json<UpdatePasswordRequest>,
) -> ApiResult<impl IntoResponse> {
    let Some(new_password) = payload.new_password else {
        return Err(ApiError::Validation("New password is required.".to_string()));
    };

    validation::validate_password(&new_password).map_err(ApiError::Validation)?;

    let customer = state
        .customer_repository
        .find_by_id(auth.customer_id)
        .await
        .map_err(|e| {
            error!("Failed to load customer: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))?;

    state
        .customer_repository
        .update_password(customer.customer_id, &new_password)
        .await
        .map_err(|e| {
            error!("Failed to update password: {}", e);
            ApiError::InternalServerError
        })?;

    let mailer_handle = state.mailer.clone();
    tokio::spawn(async move {
        let (subject, body) = mailer::password_changed_message();
        if let Err(e) = mailer_handle.send(&customer.email, &subject, &body).await {
            error!("Error sending password-change email: {}", e);
        }
    });

    Ok(Json(json!({"message": "Password updated successfully!"})))
}
