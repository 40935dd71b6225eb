//! Label domain handlers

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    middleware::{AuthCustomer, require_admin},
    models::{Label, LabelStatus, LabelType, NewLabel, Visibility, label::generate_pin},
    storage,
};

/// Maximum number of images a label may carry
const MAX_IMAGES: usize = 5;

/// One uploaded media blob
struct MediaUpload {
    bytes: Vec<u8>,
    content_type: String,
    ext: &'static str,
}

/// Parsed multipart form for label create/update
#[derive(Default)]
struct LabelForm {
    label_name: Option<String>,
    label_type: Option<String>,
    description: Option<String>,
    visibility: Option<String>,
    images: Vec<MediaUpload>,
    audio: Option<MediaUpload>,
}

impl LabelForm {
    /// Drain an axum multipart body into the form
    ///
    /// The image and audio caps are enforced here, server-side.
    async fn from_multipart(mut multipart: Multipart) -> Result<Self, ApiError> {
        let mut form = LabelForm::default();

        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|_| ApiError::Validation("Malformed multipart body.".to_string()))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "labelName" => {
                    form.label_name = Some(field.text().await.map_err(|_| {
                        ApiError::Validation("Malformed multipart body.".to_string())
                    })?);
                }
                "type" => {
                    form.label_type = Some(field.text().await.map_err(|_| {
                        ApiError::Validation("Malformed multipart body.".to_string())
                    })?);
                }
                "textDescription" => {
                    form.description = Some(field.text().await.map_err(|_| {
                        ApiError::Validation("Malformed multipart body.".to_string())
                    })?);
                }
                "isPrivate" => {
                    form.visibility = Some(field.text().await.map_err(|_| {
                        ApiError::Validation("Malformed multipart body.".to_string())
                    })?);
                }
                "images" => {
                    if form.images.len() == MAX_IMAGES {
                        return Err(ApiError::Validation(format!(
                            "A label can have at most {MAX_IMAGES} images."
                        )));
                    }
                    form.images.push(Self::media_field(field, "image").await?);
                }
                "audio" => {
                    if form.audio.is_some() {
                        return Err(ApiError::Validation(
                            "A label can have at most one audio file.".to_string(),
                        ));
                    }
                    form.audio = Some(Self::media_field(field, "audio").await?);
                }
                _ => {
                    // Unknown parts are ignored
                }
            }
        }

        Ok(form)
    }

    async fn media_field(
        field: axum::extract::multipart::Field<'_>,
        kind: &str,
    ) -> Result<MediaUpload, ApiError> {
        let content_type = field
            .content_type()
            .map(|ct| ct.to_string())
            .unwrap_or_default();

        let ext = storage::extension_for(&content_type)
            .filter(|_| content_type.starts_with(kind))
            .ok_or_else(|| ApiError::Validation("Invalid file type.".to_string()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|_| ApiError::Validation("Malformed multipart body.".to_string()))?;

        Ok(MediaUpload {
            bytes: bytes.to_vec(),
            content_type,
            ext,
        })
    }
}

/// Viewer query for listings and the description page
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerParams {
    pub customer_id: Option<i64>,
}

/// Request body for the label action endpoint
#[derive(Deserialize)]
pub struct ActionRequest {
    pub action: Option<String>,
}

/// Full label payload with flattened media
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelResponse {
    pub label_id: i64,
    pub customer_id: i64,
    pub label_name: String,
    #[serde(rename = "type")]
    pub label_type: LabelType,
    pub text_description: String,
    pub visibility: Visibility,
    pub pin: Option<String>,
    pub status: LabelStatus,
    pub qr_path: String,
    pub image_urls: Vec<String>,
    pub audio_url: Option<crate::models::LabelAudio>,
}

/// Description-page payload
///
/// The PIN is always present; `pin_verified` only reports whether the
/// requester owns the label. Display gating happens in the frontend.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionResponse {
    pub message: String,
    #[serde(flatten)]
    pub label: LabelResponse,
    pub pin_verified: bool,
}

async fn label_response(state: &AppState, label: Label) -> Result<LabelResponse, ApiError> {
    let images = state
        .label_repository
        .images_for(label.label_id)
        .await
        .map_err(|e| {
            error!("Failed to load label images: {}", e);
            ApiError::InternalServerError
        })?;

    let audio = state
        .label_repository
        .audio_for(label.label_id)
        .await
        .map_err(|e| {
            error!("Failed to load label audio: {}", e);
            ApiError::InternalServerError
        })?;

    Ok(LabelResponse {
        label_id: label.label_id,
        customer_id: label.customer_id,
        label_name: label.label_name,
        label_type: label.label_type,
        text_description: label.description,
        visibility: label.visibility,
        pin: label.pin,
        status: label.status,
        qr_path: label.qr_path,
        image_urls: images.into_iter().map(|i| i.image_url).collect(),
        audio_url: audio,
    })
}

/// Require that the caller owns the label or holds the admin role
async fn require_owner_or_admin(
    state: &AppState,
    label: &Label,
    customer_id: i64,
) -> Result<(), ApiError> {
    if label.customer_id == customer_id {
        return Ok(());
    }
    require_admin(state, customer_id).await
}

/// Best-effort removal of objects uploaded before a failed write
async fn cleanup_uploads(state: &AppState, keys: &[String]) {
    for key in keys {
        if let Err(e) = state.storage.delete(key).await {
            error!("Failed to clean up uploaded object {}: {}", key, e);
        }
    }
}

/// Create a label with optional media
///
/// Database writes run in one transaction; an upload failure rolls them
/// back and deletes the objects uploaded so far.
pub async fn create_label(
    State(state): State<AppState>,
    auth: AuthCustomer,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let form = LabelForm::from_multipart(multipart).await?;

    let (Some(label_type), Some(visibility)) = (form.label_type, form.visibility) else {
        return Err(ApiError::Validation("Missing required fields".to_string()));
    };

    let label_type = LabelType::parse(&label_type)
        .ok_or_else(|| ApiError::Validation("Invalid label type.".to_string()))?;
    let visibility = Visibility::parse(&visibility)
        .ok_or_else(|| ApiError::Validation("Invalid privacy value.".to_string()))?;

    // The PIN exists from the first moment the label is private
    let pin = match visibility {
        Visibility::Private => Some(generate_pin()),
        Visibility::Public => None,
    };

    let new_label = NewLabel {
        customer_id: auth.customer_id,
        label_name: form.label_name.unwrap_or_default(),
        label_type,
        description: form.description.unwrap_or_default(),
        visibility,
    };

    let mut tx = state.label_repository.begin().await.map_err(|e| {
        error!("Failed to begin transaction: {}", e);
        ApiError::InternalServerError
    })?;

    let label = state
        .label_repository
        .insert(&mut tx, &new_label, pin.as_deref())
        .await
        .map_err(|e| {
            error!("Failed to create label: {}", e);
            ApiError::InternalServerError
        })?;

    let timestamp = Utc::now().timestamp_millis();
    let mut uploaded: Vec<String> = Vec::new();

    for (index, image) in form.images.iter().enumerate() {
        let key = storage::media_key(auth.customer_id, timestamp, index, image.ext);
        let url = match state
            .storage
            .upload(&key, image.bytes.clone(), &image.content_type)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                error!("Failed to upload image: {}", e);
                cleanup_uploads(&state, &uploaded).await;
                return Err(ApiError::InternalServerError);
            }
        };
        uploaded.push(key);

        if let Err(e) = state
            .label_repository
            .insert_image(&mut tx, label.label_id, &url)
            .await
        {
            error!("Failed to store image row: {}", e);
            cleanup_uploads(&state, &uploaded).await;
            return Err(ApiError::InternalServerError);
        }
    }

    if let Some(audio) = &form.audio {
        let key = storage::media_key(auth.customer_id, timestamp, form.images.len(), audio.ext);
        let url = match state
            .storage
            .upload(&key, audio.bytes.clone(), &audio.content_type)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                error!("Failed to upload audio: {}", e);
                cleanup_uploads(&state, &uploaded).await;
                return Err(ApiError::InternalServerError);
            }
        };
        uploaded.push(key);

        if let Err(e) = state
            .label_repository
            .replace_audio(&mut tx, label.label_id, &url)
            .await
        {
            error!("Failed to store audio row: {}", e);
            cleanup_uploads(&state, &uploaded).await;
            return Err(ApiError::InternalServerError);
        }
    }

    if let Err(e) = tx.commit().await {
        error!("Failed to commit label creation: {}", e);
        cleanup_uploads(&state, &uploaded).await;
        return Err(ApiError::InternalServerError);
    }

    info!("Created label {} for customer {}", label.label_id, auth.customer_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Label created successfully!",
            "labelId": label.label_id,
            "pin": label.pin,
            "qrPath": label.qr_path,
        })),
    ))
}

/// Fetch a label by id, including soft-deleted ones
pub async fn get_label(
    State(state): State<AppState>,
    _auth: AuthCustomer,
    Path(label_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let label = state
        .label_repository
        .find_by_id(label_id)
        .await
        .map_err(|e| {
            error!("Failed to fetch label: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Label not found".to_string()))?;

    Ok(Json(label_response(&state, label).await?))
}

/// Update a label's fields and media
pub async fn update_label(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Path(label_id): Path<i64>,
    multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let label = state
        .label_repository
        .find_by_id(label_id)
        .await
        .map_err(|e| {
            error!("Failed to fetch label: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Label not found".to_string()))?;

    require_owner_or_admin(&state, &label, auth.customer_id).await?;

    let form = LabelForm::from_multipart(multipart).await?;

    let label_type = match &form.label_type {
        Some(raw) => LabelType::parse(raw)
            .ok_or_else(|| ApiError::Validation("Invalid label type.".to_string()))?,
        None => label.label_type,
    };
    let visibility = match &form.visibility {
        Some(raw) => Visibility::parse(raw)
            .ok_or_else(|| ApiError::Validation("Invalid privacy value.".to_string()))?,
        None => label.visibility,
    };

    // Issue a PIN only on the first flip to private; never regenerate
    let pin = match (visibility, &label.pin) {
        (Visibility::Private, None) => Some(generate_pin()),
        _ => label.pin.clone(),
    };

    let existing_images = state
        .label_repository
        .images_for(label_id)
        .await
        .map_err(|e| {
            error!("Failed to load label images: {}", e);
            ApiError::InternalServerError
        })?;

    if existing_images.len() + form.images.len() > MAX_IMAGES {
        return Err(ApiError::Validation(format!(
            "A label can have at most {MAX_IMAGES} images."
        )));
    }

    let old_audio = state
        .label_repository
        .audio_for(label_id)
        .await
        .map_err(|e| {
            error!("Failed to load label audio: {}", e);
            ApiError::InternalServerError
        })?;

    let mut tx = state.label_repository.begin().await.map_err(|e| {
        error!("Failed to begin transaction: {}", e);
        ApiError::InternalServerError
    })?;

    state
        .label_repository
        .update_fields(
            &mut tx,
            label_id,
            form.label_name.as_deref().unwrap_or(&label.label_name),
            label_type,
            form.description.as_deref().unwrap_or(&label.description),
            visibility,
            pin.as_deref(),
        )
        .await
        .map_err(|e| {
            error!("Failed to update label: {}", e);
            ApiError::InternalServerError
        })?;

    let timestamp = Utc::now().timestamp_millis();
    let mut uploaded: Vec<String> = Vec::new();

    for (offset, image) in form.images.iter().enumerate() {
        let index = existing_images.len() + offset;
        let key = storage::media_key(label.customer_id, timestamp, index, image.ext);
        let url = match state
            .storage
            .upload(&key, image.bytes.clone(), &image.content_type)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                error!("Failed to upload image: {}", e);
                cleanup_uploads(&state, &uploaded).await;
                return Err(ApiError::InternalServerError);
            }
        };
        uploaded.push(key);

        if let Err(e) = state
            .label_repository
            .insert_image(&mut tx, label_id, &url)
            .await
        {
            error!("Failed to store image row: {}", e);
            cleanup_uploads(&state, &uploaded).await;
            return Err(ApiError::InternalServerError);
        }
    }

    if let Some(audio) = &form.audio {
        // Replacement is irreversible: the old object goes first
        if let Some(old) = &old_audio {
            if let Err(e) = state.storage.delete_url(&old.audio_url).await {
                error!("Failed to delete replaced audio: {}", e);
                cleanup_uploads(&state, &uploaded).await;
                return Err(ApiError::InternalServerError);
            }
        }

        let key = storage::media_key(
            label.customer_id,
            timestamp,
            existing_images.len() + form.images.len(),
            audio.ext,
        );
        let url = match state
            .storage
            .upload(&key, audio.bytes.clone(), &audio.content_type)
            .await
        {
            Ok(url) => url,
            Err(e) => {
                error!("Failed to upload audio: {}", e);
                cleanup_uploads(&state, &uploaded).await;
                return Err(ApiError::InternalServerError);
            }
        };
        uploaded.push(key);

        if let Err(e) = state
            .label_repository
            .replace_audio(&mut tx, label_id, &url)
            .await
        {
            error!("Failed to store audio row: {}", e);
            cleanup_uploads(&state, &uploaded).await;
            return Err(ApiError::InternalServerError);
        }
    }

    if let Err(e) = tx.commit().await {
        error!("Failed to commit label update: {}", e);
        cleanup_uploads(&state, &uploaded).await;
        return Err(ApiError::InternalServerError);
    }

    Ok(Json(json!({"message": "Label updated successfully!"})))
}

/// Soft-delete or restore a label
pub async fn label_action(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Path(label_id): Path<i64>,
    Json(payload): Json<ActionRequest>,
) -> ApiResult<impl IntoResponse> {
    let label = state
        .label_repository
        .find_by_id(label_id)
        .await
        .map_err(|e| {
            error!("Failed to fetch label: {}", e);
            ApiError::InternalServerError
        })?
        .ok_or_else(|| ApiError::NotFound("Label not found".to_string()))?;

    require_owner_or_admin(&state, &label, auth.customer_id).await?;

    match payload.action.as_deref() {
        Some("softDelete") => {
            // Media deletion is irreversible; restore brings back the
            // label only
            let images = state
                .label_repository
                .images_for(label_id)
                .await
                .map_err(|e| {
                    error!("Failed to load label images: {}", e);
                    ApiError::InternalServerError
                })?;
            let audio = state
                .label_repository
                .audio_for(label_id)
                .await
                .map_err(|e| {
                    error!("Failed to load label audio: {}", e);
                    ApiError::InternalServerError
                })?;

            for image in &images {
                state
                    .storage
                    .delete_url(&image.image_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to delete image object: {}", e);
                        ApiError::InternalServerError
                    })?;
            }
            if let Some(audio) = &audio {
                state
                    .storage
                    .delete_url(&audio.audio_url)
                    .await
                    .map_err(|e| {
                        error!("Failed to delete audio object: {}", e);
                        ApiError::InternalServerError
                    })?;
            }

            let mut tx = state.label_repository.begin().await.map_err(|e| {
                error!("Failed to begin transaction: {}", e);
                ApiError::InternalServerError
            })?;

            state
                .label_repository
                .delete_media_rows(&mut tx, label_id)
                .await
                .map_err(|e| {
                    error!("Failed to delete media rows: {}", e);
                    ApiError::InternalServerError
                })?;
            state
                .label_repository
                .set_status(&mut tx, label_id, LabelStatus::Deleted)
                .await
                .map_err(|e| {
                    error!("Failed to soft-delete label: {}", e);
                    ApiError::InternalServerError
                })?;

            tx.commit().await.map_err(|e| {
                error!("Failed to commit soft delete: {}", e);
                ApiError::InternalServerError
            })?;

            info!("Soft-deleted label {}", label_id);
            Ok(Json(json!({"message": "Label deleted successfully!"})))
        }
        Some("restore") => {
            let mut tx = state.label_repository.begin().await.map_err(|e| {
                error!("Failed to begin transaction: {}", e);
                ApiError::InternalServerError
            })?;

            state
                .label_repository
                .set_status(&mut tx, label_id, LabelStatus::Active)
                .await
                .map_err(|e| {
                    error!("Failed to restore label: {}", e);
                    ApiError::InternalServerError
                })?;

            tx.commit().await.map_err(|e| {
                error!("Failed to commit restore: {}", e);
                ApiError::InternalServerError
            })?;

            info!("Restored label {}", label_id);
            Ok(Json(json!({"message": "Label restored successfully!"})))
        }
        _ => Err(ApiError::Validation("Invalid action".to_string())),
    }
}

/// Description page behind the QR code
///
/// Soft-deleted labels 404 here: their media are gone, so the page is
/// treated as gone too.
pub async fn get_description(
    State(state): State<AppState>,
    Path(label_id): Path<i64>,
    Query(params): Query<ViewerParams>,
) -> ApiResult<impl IntoResponse> {
    let label = state
        .label_repository
        .find_by_id(label_id)
        .await
        .map_err(|e| {
            error!("Failed to fetch label: {}", e);
            ApiError::InternalServerError
        })?
        .filter(|label| label.status == LabelStatus::Active)
        .ok_or_else(|| ApiError::NotFound("Label not found".to_string()))?;

    let pin_verified = params.customer_id == Some(label.customer_id);
    let label = label_response(&state, label).await?;

    Ok(Json(DescriptionResponse {
        message: format!("Description for label {label_id}"),
        label,
        pin_verified,
    }))
}

/// All active labels of one customer, for that customer or an admin
pub async fn list_customer_labels(
    State(state): State<AppState>,
    auth: AuthCustomer,
    Path(customer_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    if auth.customer_id != customer_id {
        require_admin(&state, auth.customer_id).await?;
    }

    let labels = state
        .label_repository
        .list_active_by_customer(customer_id)
        .await
        .map_err(|e| {
            error!("Failed to list labels: {}", e);
            ApiError::InternalServerError
        })?;

    Ok(Json(labels))
}

/// Active public labels, plus the viewer's own labels when a viewer id is
/// supplied
pub async fn list_labels(
    State(state): State<AppState>,
    Query(params): Query<ViewerParams>,
) -> ApiResult<impl IntoResponse> {
    let labels = state
        .label_repository
        .list_public(params.customer_id)
        .await
        .map_err(|e| {
            error!("Failed to list public labels: {}", e);
            ApiError::InternalServerError
        })?;

    Ok(Json(labels))
}
