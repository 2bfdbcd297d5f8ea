use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Length of a class join code in hex characters.
pub const CLASS_CODE_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    pub id: Uuid,
    pub title: String,
    /// Uppercase hex join code, unique across classes.
    pub code: String,
    pub creator_id: Uuid,
    pub members: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Class {
    pub fn is_creator(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id
    }

    pub fn is_member(&self, user_id: Uuid) -> bool {
        self.creator_id == user_id || self.members.contains(&user_id)
    }
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Class {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Class {
            id: row.try_get("id")?,
            title: row.try_get("title")?,
            code: row.try_get("code")?,
            creator_id: row.try_get("creator_id")?,
            members: row
                .try_get::<Option<Vec<Uuid>>, _>("members")?
                .unwrap_or_default(),
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Render four random bytes as an uppercase hex join code.
pub fn format_class_code(bytes: [u8; 4]) -> String {
    bytes.iter().map(|b| format!("{:02X}", b)).collect()
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateClassRequest {
    #[validate(length(min = 1, max = 200, message = "title is required"))]
    pub title: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinClassRequest {
    #[validate(length(equal = 8, message = "classCode must be 8 characters"))]
    pub class_code: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: Uuid,
    pub video_id: Uuid,
    pub user_id: Uuid,
    pub heading: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(feature = "sqlx")]
impl sqlx::FromRow<'_, sqlx::postgres::PgRow> for Note {
    fn from_row(row: &sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(Note {
            id: row.try_get("id")?,
            video_id: row.try_get("video_id")?,
            user_id: row.try_get("user_id")?,
            heading: row.try_get("heading")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateNoteRequest {
    #[validate(length(min = 1, message = "heading is required"))]
    pub heading: String,
    #[validate(length(min = 1, message = "content is required"))]
    pub content: String,
}
