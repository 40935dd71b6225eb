//! Label repository for database operations
//!
//! Write paths that span multiple rows take an open transaction so a
//! mid-sequence failure rolls every row back together.

use anyhow::Result;
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use tracing::info;

use crate::models::{Label, LabelAudio, LabelImage, LabelStatus, LabelType, NewLabel, Visibility};

const LABEL_COLUMNS: &str = "label_id, customer_id, label_name, label_type, description, \
                             visibility, pin, status, qr_path, created_at, updated_at";

fn map_label(row: &PgRow) -> Result<Label> {
    let label_type: String = row.get("label_type");
    let visibility: String = row.get("visibility");
    let status: String = row.get("status");

    Ok(Label {
        label_id: row.get("label_id"),
        customer_id: row.get("customer_id"),
        label_name: row.get("label_name"),
        label_type: LabelType::parse(&label_type)
            .ok_or_else(|| anyhow::anyhow!("Unknown label type: {}", label_type))?,
        description: row.get("description"),
        visibility: Visibility::parse(&visibility)
            .ok_or_else(|| anyhow::anyhow!("Unknown visibility: {}", visibility))?,
        pin: row.get("pin"),
        status: LabelStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("Unknown label status: {}", status))?,
        qr_path: row.get("qr_path"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

/// Label repository
#[derive(Clone)]
pub struct LabelRepository {
    pool: PgPool,
}

impl LabelRepository {
    /// Create a new label repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Begin a transaction for a multi-row write
    pub async fn begin(&self) -> Result<Transaction<'static, Postgres>> {
        Ok(self.pool.begin().await?)
    }

    /// Insert a label and persist its description-page path
    ///
    /// The PIN is supplied by the caller only when the label is created
    /// private; the path is derived from the generated id.
    pub async fn insert(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        new_label: &NewLabel,
        pin: Option<&str>,
    ) -> Result<Label> {
        info!(
            "Creating label \"{}\" for customer {}",
            new_label.label_name, new_label.customer_id
        );

        let row = sqlx::query(&format!(
            r#"
            INSERT INTO label (customer_id, label_name, label_type, description, visibility, pin, status)
            VALUES ($1, $2, $3, $4, $5, $6, 'active')
            RETURNING {LABEL_COLUMNS}
            "#
        ))
        .bind(new_label.customer_id)
        .bind(&new_label.label_name)
        .bind(new_label.label_type.as_str())
        .bind(&new_label.description)
        .bind(new_label.visibility.as_str())
        .bind(pin)
        .fetch_one(&mut **tx)
        .await?;

        let mut label = map_label(&row)?;
        let qr_path = format!("/description/{}", label.label_id);

        sqlx::query("UPDATE label SET qr_path = $1 WHERE label_id = $2")
            .bind(&qr_path)
            .bind(label.label_id)
            .execute(&mut **tx)
            .await?;

        label.qr_path = qr_path;
        Ok(label)
    }

    /// Find a label by ID, regardless of soft-delete status
    pub async fn find_by_id(&self, label_id: i64) -> Result<Option<Label>> {
        let row = sqlx::query(&format!(
            "SELECT {LABEL_COLUMNS} FROM label WHERE label_id = $1"
        ))
        .bind(label_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_label).transpose()
    }

    /// Update the mutable fields of a label
    pub async fn update_fields(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        label_id: i64,
        label_name: &str,
        label_type: LabelType,
        description: &str,
        visibility: Visibility,
        pin: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE label
            SET label_name = $1, label_type = $2, description = $3,
                visibility = $4, pin = $5, updated_at = now()
            WHERE label_id = $6
            "#,
        )
        .bind(label_name)
        .bind(label_type.as_str())
        .bind(description)
        .bind(visibility.as_str())
        .bind(pin)
        .bind(label_id)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Set the soft-delete status
    pub async fn set_status(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        label_id: i64,
        status: LabelStatus,
    ) -> Result<()> {
        sqlx::query("UPDATE label SET status = $1, updated_at = now() WHERE label_id = $2")
            .bind(status.as_str())
            .bind(label_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// All active labels of one customer, in insertion order
    pub async fn list_active_by_customer(&self, customer_id: i64) -> Result<Vec<Label>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {LABEL_COLUMNS} FROM label
            WHERE customer_id = $1 AND status = 'active'
            ORDER BY label_id
            "#
        ))
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_label).collect()
    }

    /// All active public labels, plus the viewer's own active labels when
    /// a viewer id is supplied
    pub async fn list_public(&self, viewer_customer_id: Option<i64>) -> Result<Vec<Label>> {
        let rows = match viewer_customer_id {
            Some(viewer) => {
                sqlx::query(&format!(
                    r#"
                    SELECT {LABEL_COLUMNS} FROM label
                    WHERE status = 'active' AND (visibility = 'public' OR customer_id = $1)
                    ORDER BY label_id
                    "#
                ))
                .bind(viewer)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    r#"
                    SELECT {LABEL_COLUMNS} FROM label
                    WHERE status = 'active' AND visibility = 'public'
                    ORDER BY label_id
                    "#
                ))
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter().map(map_label).collect()
    }

    /// Images attached to a label, oldest first
    pub async fn images_for(&self, label_id: i64) -> Result<Vec<LabelImage>> {
        let rows = sqlx::query(
            r#"
            SELECT image_id, label_id, image_url, created_at
            FROM label_images
            WHERE label_id = $1
            ORDER BY image_id
            "#,
        )
        .bind(label_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LabelImage {
                image_id: row.get("image_id"),
                label_id: row.get("label_id"),
                image_url: row.get("image_url"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    /// The audio note attached to a label, if any
    pub async fn audio_for(&self, label_id: i64) -> Result<Option<LabelAudio>> {
        let row = sqlx::query(
            r#"
            SELECT audio_id, label_id, audio_url, created_at
            FROM label_audio
            WHERE label_id = $1
            "#,
        )
        .bind(label_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| LabelAudio {
            audio_id: row.get("audio_id"),
            label_id: row.get("label_id"),
            audio_url: row.get("audio_url"),
            created_at: row.get("created_at"),
        }))
    }

    /// Attach one image row
    pub async fn insert_image(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        label_id: i64,
        image_url: &str,
    ) -> Result<()> {
        sqlx::query("INSERT INTO label_images (label_id, image_url) VALUES ($1, $2)")
            .bind(label_id)
            .bind(image_url)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Replace the audio row (delete-then-insert)
    pub async fn replace_audio(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        label_id: i64,
        audio_url: &str,
    ) -> Result<()> {
        sqlx::query("DELETE FROM label_audio WHERE label_id = $1")
            .bind(label_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query("INSERT INTO label_audio (label_id, audio_url) VALUES ($1, $2)")
            .bind(label_id)
            .bind(audio_url)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Remove every media row of a label
    pub async fn delete_media_rows(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        label_id: i64,
    ) -> Result<()> {
        sqlx::query("DELETE FROM label_images WHERE label_id = $1")
            .bind(label_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query("DELETE FROM label_audio WHERE label_id = $1")
            .bind(label_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Hard-delete every label of a customer (account-deletion cascade)
    ///
    /// Child media rows go with the labels via the FK cascade.
    pub async fn delete_for_customer(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        customer_id: i64,
    ) -> Result<()> {
        info!("Deleting all labels for customer {}", customer_id);

        sqlx::query("DELETE FROM label WHERE customer_id = $1")
            .bind(customer_id)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }
}
