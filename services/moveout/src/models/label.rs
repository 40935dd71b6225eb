//! Label model and related functionality

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Physical label category, drives the printed artwork
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelType {
    Fragile,
    Heavy,
    Standard,
}

impl LabelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelType::Fragile => "fragile",
            LabelType::Heavy => "heavy",
            LabelType::Standard => "standard",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fragile" => Some(LabelType::Fragile),
            "heavy" => Some(LabelType::Heavy),
            "standard" => Some(LabelType::Standard),
            _ => None,
        }
    }
}

/// Whether the description page is PIN-gated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Private,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            _ => None,
        }
    }
}

/// Soft-delete status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStatus {
    Active,
    Deleted,
}

impl LabelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelStatus::Active => "active",
            LabelStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(LabelStatus::Active),
            "deleted" => Some(LabelStatus::Deleted),
            _ => None,
        }
    }
}

/// Label entity
///
/// The PIN is generated exactly once, the first time the label becomes
/// private, and is never regenerated while non-null.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Label {
    pub label_id: i64,
    pub customer_id: i64,
    pub label_name: String,
    #[serde(rename = "type")]
    pub label_type: LabelType,
    pub description: String,
    pub visibility: Visibility,
    pub pin: Option<String>,
    pub status: LabelStatus,
    pub qr_path: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New label creation payload
#[derive(Debug, Clone)]
pub struct NewLabel {
    pub customer_id: i64,
    pub label_name: String,
    pub label_type: LabelType,
    pub description: String,
    pub visibility: Visibility,
}

/// Generate a fresh 6-digit PIN, uniform in [100000, 999999]
pub fn generate_pin() -> String {
    use rand::Rng;
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Image attached to a label (at most five per label)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LabelImage {
    pub image_id: i64,
    pub label_id: i64,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
}

/// Audio note attached to a label (at most one per label)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LabelAudio {
    pub audio_id: i64,
    pub label_id: i64,
    pub audio_url: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_type_round_trip() {
        for ty in [LabelType::Fragile, LabelType::Heavy, LabelType::Standard] {
            assert_eq!(LabelType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(LabelType::parse("flimsy"), None);
    }

    #[test]
    fn test_visibility_round_trip() {
        assert_eq!(Visibility::parse("public"), Some(Visibility::Public));
        assert_eq!(Visibility::parse("private"), Some(Visibility::Private));
        assert_eq!(Visibility::parse(""), None);
    }

    #[test]
    fn test_generated_pin_is_six_digits() {
        for _ in 0..100 {
            let pin = generate_pin();
            assert_eq!(pin.len(), 6);
            assert!(pin.chars().all(|c| c.is_ascii_digit()));
            let value: u32 = pin.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[test]
    fn test_label_status_round_trip() {
        assert_eq!(LabelStatus::parse("active"), Some(LabelStatus::Active));
        assert_eq!(LabelStatus::parse("deleted"), Some(LabelStatus::Deleted));
        assert_eq!(LabelStatus::parse("archived"), None);
    }
}
