//! Customer administration handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    mailer,
    middleware::{AuthCustomer, require_admin},
    models::{Customer, CustomerStatus, Role, VerificationToken, Visibility},
    storage,
};

/// Customer projection without the password hash
#[derive(Serialize)]
pub struct CustomerResponse {
    pub customer_id: i64,
    pub mail: String,
    pub status: CustomerStatus,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl From<Customer> for CustomerResponse {
    fn from(customer: Customer) -> Self {
        Self {
            customer_id: customer.customer_id,
            mail: customer.email,
            status: customer.status,
            role: customer.role,
            created_at: customer.created_at,
        }
    }
}

/// Request for a marketing broadcast
#[derive(Deserialize)]
pub struct MarketingRequest {
    pub subject: Option<String>,
    #[serde(alias = "body")]
    pub content: Option<String>,
}

/// Request for sharing a label by mail
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShareLabelRequest {
    pub recipient_email: Option<String>,
    pub label_id: Option<i64>,
}

/// Request confirming the account-deletion flow
#[derive(Deserialize)]
pub struct ConfirmDeleteRequest {
    pub token: Option<String>,
    pub email: Option<String>,
}

/// List all customers
pub async fn list_customers(
    State(state): State<AppState>,
    auth: AuthCustomer,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, auth.customer_id).await?;

    let customers = state.customer_repository.list_all().await.map_err(|e| {
        error!("Error fetching customers: {}", e);
        ApiError::InternalServerError
    })?;

    let customers: Vec<CustomerResponse> = customers.into_iter().map(Into::into).collect();
    Ok(Json(customers))
}

/// Fetch a single customer
pub async fn get_customer(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Path(customer_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, auth.customer_id).await?;

    let customer = state
        .customer_repository
        .find_by_id(customer_id)
        .await
        .map_err(|e| {
            error!("Error fetching customer: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))?;

    Ok(Json(CustomerResponse::from(customer)))
}

/// Re-read a customer and fail when the expected transition did not hold
///
/// A defensive check against concurrent writers, not a transaction.
async fn confirm_transition(
    state: &AppState,
    customer_id: i64,
    check: impl Fn(&Customer) -> bool,
    what: &str,
) -> Result<(), ApiError> {
    let customer = state
        .customer_repository
        .find_by_id(customer_id)
        .await
        .map_err(|e| {
            error!("Failed to re-read customer {}: {}", customer_id, e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::State(format!("Customer disappeared during {what}")))?;

    if !check(&customer) {
        return Err(ApiError::State(format!("{what} did not apply")));
    }

    Ok(())
}

/// Promote a customer to the admin role
pub async fn promote_to_admin(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Path(customer_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, auth.customer_id).await?;

    state
        .customer_repository
        .set_role(customer_id, Role::Admin)
        .await
        .map_err(|e| {
            error!("Failed to promote customer {}: {}", customer_id, e);
            ApiError::InternalServerError
        })?;

    confirm_transition(&state, customer_id, |c| c.role == Role::Admin, "Promotion").await?;

    info!("Promoted customer {} to admin", customer_id);
    Ok(Json(json!({"message": "Customer promoted to admin!"})))
}

/// Deactivate a customer account
pub async fn deactivate_customer(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Path(customer_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, auth.customer_id).await?;

    state
        .customer_repository
        .set_status(customer_id, CustomerStatus::Deactivated)
        .await
        .map_err(|e| {
            error!("Failed to deactivate customer {}: {}", customer_id, e);
            ApiError::InternalServerError
        })?;

    confirm_transition(
        &state,
        customer_id,
        |c| c.status == CustomerStatus::Deactivated,
        "Deactivation",
    )
    .await?;

    info!("Deactivated customer {}", customer_id);
    Ok(Json(json!({"message": "Customer deactivated!"})))
}

/// Reactivate a customer account
pub async fn activate_customer(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Path(customer_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, auth.customer_id).await?;

    state
        .customer_repository
        .set_status(customer_id, CustomerStatus::Verified)
        .await
        .map_err(|e| {
            error!("Failed to activate customer {}: {}", customer_id, e);
            ApiError::InternalServerError
        })?;

    confirm_transition(
        &state,
        customer_id,
        |c| c.status == CustomerStatus::Verified,
        "Activation",
    )
    .await?;

    info!("Activated customer {}", customer_id);
    Ok(Json(json!({"message": "Customer activated!"})))
}

/// Self-service deactivation of the caller's own account
pub async fn deactivate_account(
    State(state): State<AppState>,
    auth: AuthCustomer,
) -> ApiResult<impl IntoResponse> {
    state
        .customer_repository
        .set_status(auth.customer_id, CustomerStatus::Deactivated)
        .await
        .map_err(|e| {
            error!("Failed to deactivate account {}: {}", auth.customer_id, e);
            ApiError::InternalServerError
        })?;

    info!("Customer {} deactivated their account", auth.customer_id);
    Ok(Json(json!({"message": "Account deactivated."})))
}

/// Broadcast a marketing mail to every verified, non-admin customer
///
/// 204 when the recipient set is empty; per-recipient failures are
/// logged, not aggregated into the response.
pub async fn marketing_mail(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Json(payload): Json<MarketingRequest>,
) -> ApiResult<impl IntoResponse> {
    require_admin(&state, auth.customer_id).await?;

    let (Some(subject), Some(content)) = (payload.subject, payload.content) else {
        return Err(ApiError::Validation(
            "Subject and content are required.".to_string(),
        ));
    };

    let recipients = state
        .customer_repository
        .list_marketing_recipients()
        .await
        .map_err(|e| {
            error!("Failed to list marketing recipients: {}", e);
            ApiError::InternalServerError
        })?;

    if recipients.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let count = recipients.len();
    for recipient in recipients {
        if let Err(e) = state.mailer.send(&recipient.email, &subject, &content).await {
            error!("Failed to send marketing mail to {}: {}", recipient.email, e);
        }
    }

    info!("Marketing mail sent to {} customers", count);
    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "Marketing mail sent!"})),
    )
        .into_response())
}

/// Share a label by mail, disclosing the PIN for private labels
pub async fn share_label(
    State(state): State<AppState>,
    _auth: AuthCustomer,
    Json(payload): Json<ShareLabelRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(recipient_email), Some(label_id)) = (payload.recipient_email, payload.label_id)
    else {
        return Err(ApiError::Validation(
            "Recipient email and label id are required.".to_string(),
        ));
    };

    let label = state
        .label_repository
        .find_by_id(label_id)
        .await
        .map_err(|e| {
            error!("Failed to fetch label: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Label not found".to_string()))?;

    let pin = match label.visibility {
        Visibility::Private => label.pin.as_deref(),
        Visibility::Public => None,
    };

    let (subject, body) =
        mailer::share_label_message(&state.frontend_url, label.label_id, &label.label_name, pin);

    // The mail is the entire purpose of this call, so a failed send fails
    // the request
    state
        .mailer
        .send(&recipient_email, &subject, &body)
        .await
        .map_err(|e| {
            error!("Failed to send share-label mail: {}", e);
            ApiError::InternalServerError
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"message": "Label shared successfully!"})),
    ))
}

/// Phase one of account deletion: issue a confirmation token
pub async fn request_delete_account(
    State(state): State<AppState>,
    auth: AuthCustomer,
) -> ApiResult<impl IntoResponse> {
    let customer = state
        .customer_repository
        .find_by_id(auth.customer_id)
        .await
        .map_err(|e| {
            error!("Failed to load customer: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))?;

    let token = VerificationToken::issue(&customer.email);
    state.token_repository.insert(&token).await.map_err(|e| {
        error!("Failed to store deletion token: {}", e);
        ApiError::InternalServerError
    })?;

    let mailer_handle = state.mailer.clone();
    let frontend_url = state.frontend_url.clone();
    tokio::spawn(async move {
        let (subject, body) =
            mailer::deletion_request_message(&frontend_url, &token.email, &token.token);
        if let Err(e) = mailer_handle.send(&token.email, &subject, &body).await {
            error!("Error sending deletion-confirmation email: {}", e);
        }
    });

    Ok(Json(json!({
        "message": "A confirmation email has been sent to your email address."
    })))
}

/// Phase two of account deletion: purge media, labels, and the account
pub async fn delete_account(
    State(state): State<AppState>,
    _auth: AuthCustomer,
    Json(payload): Json<ConfirmDeleteRequest>,
) -> ApiResult<impl IntoResponse> {
    let (Some(token), Some(email)) = (payload.token, payload.email) else {
        return Err(ApiError::Validation(
            "Token and email are required.".to_string(),
        ));
    };

    let token = state
        .token_repository
        .find_valid(&token, &email)
        .await
        .map_err(|e| {
            error!("Failed to look up deletion token: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::Validation("Invalid or expired token.".to_string()))?;

    let customer = state
        .customer_repository
        .find_by_email(&token.email)
        .await
        .map_err(|e| {
            error!("Failed to load customer: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Customer not found".to_string()))?;

    // Storage first: a purge failure aborts with all rows intact
    state
        .storage
        .purge_prefix(&storage::customer_prefix(customer.customer_id))
        .await
        .map_err(|e| {
            error!("Failed to purge customer media: {}", e);
            ApiError::InternalServerError
        })?;

    let mut tx = state.label_repository.begin().await.map_err(|e| {
        error!("Failed to begin transaction: {}", e);
        ApiError::InternalServerError
    })?;

    state
        .label_repository
        .delete_for_customer(&mut tx, customer.customer_id)
        .await
        .map_err(|e| {
            error!("Failed to delete customer labels: {}", e);
            ApiError::InternalServerError
        })?;

    state
        .customer_repository
        .delete(&mut tx, customer.customer_id)
        .await
        .map_err(|e| {
            error!("Failed to delete customer: {}", e);
            ApiError::InternalServerError
        })?;

    state
        .token_repository
        .consume_in_tx(&mut tx, &token.token)
        .await
        .map_err(|e| {
            error!("Failed to consume deletion token: {}", e);
            ApiError::InternalServerError
        })?;

    tx.commit().await.map_err(|e| {
        error!("Failed to commit account deletion: {}", e);
        ApiError::InternalServerError
    })?;

    let mailer_handle = state.mailer.clone();
    let recipient = customer.email.clone();
    tokio::spawn(async move {
        let (subject, body) = mailer::deletion_done_message();
        if let Err(e) = mailer_handle.send(&recipient, &subject, &body).await {
            error!("Error sending deletion-confirmation email: {}", e);
        }
    });

    info!("Deleted account {}", customer.customer_id);
    Ok(Json(json!({"message": "Account deleted successfully!"})))
}
