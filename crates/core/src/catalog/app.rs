//! A single listing record.

use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

use super::Category;

/// One app listing.
///
/// `id` is the only stable identity: position and category both change
/// over the record's life. Descriptive fields are never absent once
/// decoded; missing or `null` values become empty strings and lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default = "unplaced", deserialize_with = "lenient_category")]
    pub category: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtitle: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additional_images: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description_full: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub download_link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub telegram_link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub youtube_link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub video_link: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub report_details: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub requirements: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub downloads: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub store: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub date: String,
    /// Creation time in epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
}

impl App {
    /// Create a new record with a freshly assigned id.
    pub fn new(title: impl Into<String>, category: Category) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title.into(),
            category,
            subtitle: String::new(),
            image: String::new(),
            additional_images: Vec::new(),
            description: String::new(),
            description_full: String::new(),
            download_link: String::new(),
            telegram_link: String::new(),
            youtube_link: String::new(),
            video_link: String::new(),
            report_details: String::new(),
            size: String::new(),
            requirements: String::new(),
            downloads: String::new(),
            store: String::new(),
            version: String::new(),
            date: String::new(),
            created_at: Some(Utc::now().timestamp_millis()),
        }
    }
}

/// Placeholder for records stored without a usable category. The owning
/// catalog reassigns it from the sequence the record was found in.
fn unplaced() -> Category {
    Category::Latest
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn lenient_category<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()).unwrap_or_else(unplaced))
}
