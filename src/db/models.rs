//! Database Models - structs representing database tables (used by sqlx/serde).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Admin panel user. The password hash never leaves the server.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Public-safe user view (for /api/admin/users and auth responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub role: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
            last_login_at: user.last_login_at,
            created_at: user.created_at,
        }
    }
}

/// New user for insertion
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: String,
}

/// Sermon model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sermon {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    pub preacher: String,
    pub service_day: String,
    pub date: DateTime<Utc>,
    pub video_url: String,
    pub start_sec: i32,
    pub end_sec: Option<i32>,
    pub excerpt: Option<String>,
    pub outline: Option<String>,
    pub outline_rich_text: Option<String>,
    pub outline_doc_url: Option<String>,
    pub scriptures: Vec<String>,
    pub tags: Vec<String>,
    pub featured: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New sermon for insertion (slug already derived, dates already coerced)
#[derive(Debug, Clone)]
pub struct NewSermon {
    pub slug: String,
    pub title: String,
    pub preacher: String,
    pub service_day: String,
    pub date: DateTime<Utc>,
    pub video_url: String,
    pub start_sec: i32,
    pub end_sec: Option<i32>,
    pub excerpt: Option<String>,
    pub outline: Option<String>,
    pub outline_rich_text: Option<String>,
    pub outline_doc_url: Option<String>,
    pub scriptures: Vec<String>,
    pub tags: Vec<String>,
    pub featured: bool,
    pub created_by: Option<Uuid>,
}

/// Partial sermon update. Double-`Option` fields distinguish "leave as is"
/// (outer `None`) from "set to NULL" (inner `None`).
#[derive(Debug, Clone, Default)]
pub struct SermonPatch {
    pub title: Option<String>,
    pub preacher: Option<String>,
    pub service_day: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub video_url: Option<String>,
    pub start_sec: Option<i32>,
    pub end_sec: Option<Option<i32>>,
    pub excerpt: Option<Option<String>>,
    pub outline: Option<Option<String>>,
    pub outline_rich_text: Option<Option<String>>,
    pub outline_doc_url: Option<Option<String>>,
    pub scriptures: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub featured: Option<bool>,
}

/// Announcement model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub id: Uuid,
    pub slug: String,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub content_html: Option<String>,
    pub graphic_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Announcement {
    /// An announcement is active when its publish window includes `now`:
    /// `published_at <= now` and, when set, `expires_at > now`.
    ///
    /// Reference predicate for the WHERE clause in
    /// `storage::list_active_announcements` and `storage::content_counts`;
    /// the boundary tests below pin down both.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.published_at <= now && self.expires_at.map(|e| e > now).unwrap_or(true)
    }
}

/// New announcement for insertion
#[derive(Debug, Clone)]
pub struct NewAnnouncement {
    pub slug: String,
    pub title: String,
    pub kind: String,
    pub content_html: Option<String>,
    pub graphic_url: Option<String>,
    pub published_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub pinned: bool,
}

/// Partial announcement update
#[derive(Debug, Clone, Default)]
pub struct AnnouncementPatch {
    pub title: Option<String>,
    pub kind: Option<String>,
    pub content_html: Option<Option<String>>,
    pub graphic_url: Option<Option<String>>,
    pub published_at: Option<DateTime<Utc>>,
    pub expires_at: Option<Option<DateTime<Utc>>>,
    pub pinned: Option<bool>,
}

/// Newsletter subscriber model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub source: String,
    pub tags: Vec<String>,
    pub preferred_service_day: Option<String>,
    pub status: String,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
}

/// New subscriber for insertion
#[derive(Debug, Clone)]
pub struct NewSubscriber {
    pub name: String,
    pub email: String,
    pub source: String,
    pub tags: Vec<String>,
    pub preferred_service_day: Option<String>,
    pub status: String,
}

/// Partial subscriber update
#[derive(Debug, Clone, Default)]
pub struct SubscriberPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    pub preferred_service_day: Option<Option<String>>,
    pub status: Option<String>,
}

/// Worship/prayer content model
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorshipPrayer {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub video_url: Option<String>,
    pub start_sec: i32,
    pub end_sec: Option<i32>,
    pub lyrics: Option<String>,
    pub chord_chart: Option<String>,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New worship/prayer item for insertion
#[derive(Debug, Clone)]
pub struct NewWorshipPrayer {
    pub title: String,
    pub category: String,
    pub video_url: Option<String>,
    pub start_sec: i32,
    pub end_sec: Option<i32>,
    pub lyrics: Option<String>,
    pub chord_chart: Option<String>,
    pub attachments: Vec<String>,
}

/// Partial worship/prayer update
#[derive(Debug, Clone, Default)]
pub struct WorshipPrayerPatch {
    pub title: Option<String>,
    pub category: Option<String>,
    pub video_url: Option<Option<String>>,
    pub start_sec: Option<i32>,
    pub end_sec: Option<Option<i32>>,
    pub lyrics: Option<Option<String>>,
    pub chord_chart: Option<Option<String>>,
    pub attachments: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn announcement_with_window(
        published_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Announcement {
        Announcement {
            id: Uuid::new_v4(),
            slug: "test".to_string(),
            title: "Test".to_string(),
            kind: "non_graphic".to_string(),
            content_html: None,
            graphic_url: None,
            published_at,
            expires_at,
            pinned: false,
            created_at: published_at,
            updated_at: published_at,
        }
    }

    #[test]
    fn test_announcement_active_when_published_and_unexpired() {
        let now = Utc::now();
        let a = announcement_with_window(now - Duration::days(1), Some(now + Duration::days(1)));
        assert!(a.is_active_at(now));
    }

    #[test]
    fn test_announcement_active_without_expiry() {
        let now = Utc::now();
        let a = announcement_with_window(now - Duration::days(1), None);
        assert!(a.is_active_at(now));
    }

    #[test]
    fn test_announcement_inactive_before_publish() {
        let now = Utc::now();
        let a = announcement_with_window(now + Duration::hours(1), None);
        assert!(!a.is_active_at(now));
    }

    #[test]
    fn test_announcement_inactive_after_expiry() {
        let now = Utc::now();
        let a = announcement_with_window(now - Duration::days(2), Some(now - Duration::hours(1)));
        assert!(!a.is_active_at(now));
    }

    #[test]
    fn test_announcement_boundary_instants() {
        let now = Utc::now();
        // published_at == now is active; expires_at == now is not
        let published_now = announcement_with_window(now, None);
        assert!(published_now.is_active_at(now));
        let expires_now = announcement_with_window(now - Duration::days(1), Some(now));
        assert!(!expires_now.is_active_at(now));
    }

    #[test]
    fn test_user_serialization_omits_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            username: "admin".to_string(),
            email: "a@x.org".to_string(),
            password_hash: "$2b$12$topsecret".to_string(),
            role: "admin".to_string(),
            last_login_at: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("topsecret"));
        assert!(!json.contains("passwordHash"));
    }

    #[test]
    fn test_announcement_kind_serializes_as_type() {
        let a = announcement_with_window(Utc::now(), None);
        let json = serde_json::to_string(&a).unwrap();
        assert!(json.contains("\"type\":\"non_graphic\""));
    }
}
