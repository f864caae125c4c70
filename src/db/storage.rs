/**
 * Storage Layer
 * One thin repository function per entity per operation, wrapping sqlx.
 * Absence is Ok(None); unique collisions surface as sqlx errors the route
 * layer translates with `db::is_unique_violation`.
 */
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use super::models::{
    Announcement, AnnouncementPatch, NewAnnouncement, NewSermon, NewSubscriber, NewUser,
    NewWorshipPrayer, Sermon, SermonPatch, Subscriber, SubscriberPatch, User, WorshipPrayer,
    WorshipPrayerPatch,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, last_login_at, created_at";

const SERMON_COLUMNS: &str = "id, slug, title, preacher, service_day, date, video_url, start_sec, \
     end_sec, excerpt, outline, outline_rich_text, outline_doc_url, scriptures, tags, featured, \
     created_by, created_at, updated_at";

const ANNOUNCEMENT_COLUMNS: &str = "id, slug, title, kind, content_html, graphic_url, \
     published_at, expires_at, pinned, created_at, updated_at";

const SUBSCRIBER_COLUMNS: &str = "id, name, email, source, tags, preferred_service_day, status, \
     subscribed_at, unsubscribed_at";

const WORSHIP_PRAYER_COLUMNS: &str = "id, title, category, video_url, start_sec, end_sec, lyrics, \
     chord_chart, attachments, created_at, updated_at";

// ============================================================================
// Users
// ============================================================================

pub async fn get_user_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE username = $1",
        USER_COLUMNS
    ))
    .bind(username)
    .fetch_optional(pool)
    .await
}

pub async fn get_user_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users WHERE LOWER(email) = LOWER($1)",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn list_users(pool: &PgPool) -> Result<Vec<User>, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn create_user(pool: &PgPool, new: &NewUser) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(&format!(
        r#"
        INSERT INTO users (username, email, password_hash, role)
        VALUES ($1, $2, $3, $4)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(&new.username)
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(&new.role)
    .fetch_one(pool)
    .await
}

pub async fn touch_user_login(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

// ============================================================================
// Sermons
// ============================================================================

pub async fn get_sermon(pool: &PgPool, id: Uuid) -> Result<Option<Sermon>, sqlx::Error> {
    sqlx::query_as::<_, Sermon>(&format!(
        "SELECT {} FROM sermons WHERE id = $1",
        SERMON_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_sermon_by_slug(pool: &PgPool, slug: &str) -> Result<Option<Sermon>, sqlx::Error> {
    sqlx::query_as::<_, Sermon>(&format!(
        "SELECT {} FROM sermons WHERE slug = $1",
        SERMON_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
}

pub async fn list_sermons(pool: &PgPool) -> Result<Vec<Sermon>, sqlx::Error> {
    sqlx::query_as::<_, Sermon>(&format!(
        "SELECT {} FROM sermons ORDER BY date DESC",
        SERMON_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn list_featured_sermons(pool: &PgPool) -> Result<Vec<Sermon>, sqlx::Error> {
    sqlx::query_as::<_, Sermon>(&format!(
        "SELECT {} FROM sermons WHERE featured = true ORDER BY date DESC",
        SERMON_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn list_sermons_by_service_day(
    pool: &PgPool,
    service_day: &str,
) -> Result<Vec<Sermon>, sqlx::Error> {
    sqlx::query_as::<_, Sermon>(&format!(
        "SELECT {} FROM sermons WHERE service_day = $1 ORDER BY date DESC",
        SERMON_COLUMNS
    ))
    .bind(service_day)
    .fetch_all(pool)
    .await
}

pub async fn create_sermon(pool: &PgPool, new: &NewSermon) -> Result<Sermon, sqlx::Error> {
    sqlx::query_as::<_, Sermon>(&format!(
        r#"
        INSERT INTO sermons (slug, title, preacher, service_day, date, video_url, start_sec,
                             end_sec, excerpt, outline, outline_rich_text, outline_doc_url,
                             scriptures, tags, featured, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        RETURNING {}
        "#,
        SERMON_COLUMNS
    ))
    .bind(&new.slug)
    .bind(&new.title)
    .bind(&new.preacher)
    .bind(&new.service_day)
    .bind(new.date)
    .bind(&new.video_url)
    .bind(new.start_sec)
    .bind(new.end_sec)
    .bind(&new.excerpt)
    .bind(&new.outline)
    .bind(&new.outline_rich_text)
    .bind(&new.outline_doc_url)
    .bind(&new.scriptures)
    .bind(&new.tags)
    .bind(new.featured)
    .bind(new.created_by)
    .fetch_one(pool)
    .await
}

/// Merge a partial update into an existing sermon and refresh `updated_at`.
/// The slug is stable once assigned and is never rewritten here.
pub async fn update_sermon(
    pool: &PgPool,
    id: Uuid,
    patch: &SermonPatch,
) -> Result<Option<Sermon>, sqlx::Error> {
    let existing = match get_sermon(pool, id).await? {
        Some(s) => s,
        None => return Ok(None),
    };

    let title = patch.title.clone().unwrap_or(existing.title);
    let preacher = patch.preacher.clone().unwrap_or(existing.preacher);
    let service_day = patch.service_day.clone().unwrap_or(existing.service_day);
    let date = patch.date.unwrap_or(existing.date);
    let video_url = patch.video_url.clone().unwrap_or(existing.video_url);
    let start_sec = patch.start_sec.unwrap_or(existing.start_sec);
    let end_sec = patch.end_sec.unwrap_or(existing.end_sec);
    let excerpt = patch.excerpt.clone().unwrap_or(existing.excerpt);
    let outline = patch.outline.clone().unwrap_or(existing.outline);
    let outline_rich_text = patch
        .outline_rich_text
        .clone()
        .unwrap_or(existing.outline_rich_text);
    let outline_doc_url = patch
        .outline_doc_url
        .clone()
        .unwrap_or(existing.outline_doc_url);
    let scriptures = patch.scriptures.clone().unwrap_or(existing.scriptures);
    let tags = patch.tags.clone().unwrap_or(existing.tags);
    let featured = patch.featured.unwrap_or(existing.featured);

    sqlx::query_as::<_, Sermon>(&format!(
        r#"
        UPDATE sermons
        SET title = $1, preacher = $2, service_day = $3, date = $4, video_url = $5,
            start_sec = $6, end_sec = $7, excerpt = $8, outline = $9, outline_rich_text = $10,
            outline_doc_url = $11, scriptures = $12, tags = $13, featured = $14,
            updated_at = now()
        WHERE id = $15
        RETURNING {}
        "#,
        SERMON_COLUMNS
    ))
    .bind(&title)
    .bind(&preacher)
    .bind(&service_day)
    .bind(date)
    .bind(&video_url)
    .bind(start_sec)
    .bind(end_sec)
    .bind(&excerpt)
    .bind(&outline)
    .bind(&outline_rich_text)
    .bind(&outline_doc_url)
    .bind(&scriptures)
    .bind(&tags)
    .bind(featured)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_sermon(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM sermons WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Announcements
// ============================================================================

pub async fn get_announcement(pool: &PgPool, id: Uuid) -> Result<Option<Announcement>, sqlx::Error> {
    sqlx::query_as::<_, Announcement>(&format!(
        "SELECT {} FROM announcements WHERE id = $1",
        ANNOUNCEMENT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_announcement_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<Announcement>, sqlx::Error> {
    sqlx::query_as::<_, Announcement>(&format!(
        "SELECT {} FROM announcements WHERE slug = $1",
        ANNOUNCEMENT_COLUMNS
    ))
    .bind(slug)
    .fetch_optional(pool)
    .await
}

pub async fn list_announcements(pool: &PgPool) -> Result<Vec<Announcement>, sqlx::Error> {
    sqlx::query_as::<_, Announcement>(&format!(
        "SELECT {} FROM announcements ORDER BY published_at DESC",
        ANNOUNCEMENT_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

/// Active announcements: publish window includes now. Pinned first.
pub async fn list_active_announcements(pool: &PgPool) -> Result<Vec<Announcement>, sqlx::Error> {
    sqlx::query_as::<_, Announcement>(&format!(
        r#"
        SELECT {}
        FROM announcements
        WHERE published_at <= now() AND (expires_at IS NULL OR expires_at > now())
        ORDER BY pinned DESC, published_at DESC
        "#,
        ANNOUNCEMENT_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn list_pinned_announcements(pool: &PgPool) -> Result<Vec<Announcement>, sqlx::Error> {
    sqlx::query_as::<_, Announcement>(&format!(
        "SELECT {} FROM announcements WHERE pinned = true ORDER BY published_at DESC",
        ANNOUNCEMENT_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn create_announcement(
    pool: &PgPool,
    new: &NewAnnouncement,
) -> Result<Announcement, sqlx::Error> {
    sqlx::query_as::<_, Announcement>(&format!(
        r#"
        INSERT INTO announcements (slug, title, kind, content_html, graphic_url, published_at,
                                   expires_at, pinned)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        ANNOUNCEMENT_COLUMNS
    ))
    .bind(&new.slug)
    .bind(&new.title)
    .bind(&new.kind)
    .bind(&new.content_html)
    .bind(&new.graphic_url)
    .bind(new.published_at)
    .bind(new.expires_at)
    .bind(new.pinned)
    .fetch_one(pool)
    .await
}

pub async fn update_announcement(
    pool: &PgPool,
    id: Uuid,
    patch: &AnnouncementPatch,
) -> Result<Option<Announcement>, sqlx::Error> {
    let existing = match get_announcement(pool, id).await? {
        Some(a) => a,
        None => return Ok(None),
    };

    let title = patch.title.clone().unwrap_or(existing.title);
    let kind = patch.kind.clone().unwrap_or(existing.kind);
    let content_html = patch.content_html.clone().unwrap_or(existing.content_html);
    let graphic_url = patch.graphic_url.clone().unwrap_or(existing.graphic_url);
    let published_at = patch.published_at.unwrap_or(existing.published_at);
    let expires_at = patch.expires_at.unwrap_or(existing.expires_at);
    let pinned = patch.pinned.unwrap_or(existing.pinned);

    sqlx::query_as::<_, Announcement>(&format!(
        r#"
        UPDATE announcements
        SET title = $1, kind = $2, content_html = $3, graphic_url = $4, published_at = $5,
            expires_at = $6, pinned = $7, updated_at = now()
        WHERE id = $8
        RETURNING {}
        "#,
        ANNOUNCEMENT_COLUMNS
    ))
    .bind(&title)
    .bind(&kind)
    .bind(&content_html)
    .bind(&graphic_url)
    .bind(published_at)
    .bind(expires_at)
    .bind(pinned)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_announcement(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM announcements WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Subscribers
// ============================================================================

pub async fn get_subscriber(pool: &PgPool, id: Uuid) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers WHERE id = $1",
        SUBSCRIBER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_subscriber_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers WHERE LOWER(email) = LOWER($1)",
        SUBSCRIBER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await
}

pub async fn list_subscribers(pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers ORDER BY subscribed_at DESC",
        SUBSCRIBER_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn list_active_subscribers(pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {} FROM subscribers WHERE status = 'active' ORDER BY subscribed_at DESC",
        SUBSCRIBER_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn create_subscriber(
    pool: &PgPool,
    new: &NewSubscriber,
) -> Result<Subscriber, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        r#"
        INSERT INTO subscribers (name, email, source, tags, preferred_service_day, status)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {}
        "#,
        SUBSCRIBER_COLUMNS
    ))
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.source)
    .bind(&new.tags)
    .bind(&new.preferred_service_day)
    .bind(&new.status)
    .fetch_one(pool)
    .await
}

/// Merge a partial update into a subscriber. Transitioning into
/// `unsubscribed` stamps `unsubscribed_at`; transitioning back to `active`
/// deliberately leaves the old stamp in place (legacy behavior, kept as is).
pub async fn update_subscriber(
    pool: &PgPool,
    id: Uuid,
    patch: &SubscriberPatch,
) -> Result<Option<Subscriber>, sqlx::Error> {
    let existing = match get_subscriber(pool, id).await? {
        Some(s) => s,
        None => return Ok(None),
    };

    let unsubscribed_at = match &patch.status {
        Some(status) if status == "unsubscribed" && existing.status != "unsubscribed" => {
            Some(Utc::now())
        }
        _ => existing.unsubscribed_at,
    };

    let name = patch.name.clone().unwrap_or(existing.name);
    let email = patch.email.clone().unwrap_or(existing.email);
    let source = patch.source.clone().unwrap_or(existing.source);
    let tags = patch.tags.clone().unwrap_or(existing.tags);
    let preferred_service_day = patch
        .preferred_service_day
        .clone()
        .unwrap_or(existing.preferred_service_day);
    let status = patch.status.clone().unwrap_or(existing.status);

    sqlx::query_as::<_, Subscriber>(&format!(
        r#"
        UPDATE subscribers
        SET name = $1, email = $2, source = $3, tags = $4, preferred_service_day = $5,
            status = $6, unsubscribed_at = $7
        WHERE id = $8
        RETURNING {}
        "#,
        SUBSCRIBER_COLUMNS
    ))
    .bind(&name)
    .bind(&email)
    .bind(&source)
    .bind(&tags)
    .bind(&preferred_service_day)
    .bind(&status)
    .bind(unsubscribed_at)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_subscriber(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM subscribers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Worship/Prayer
// ============================================================================

pub async fn get_worship_prayer(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<WorshipPrayer>, sqlx::Error> {
    sqlx::query_as::<_, WorshipPrayer>(&format!(
        "SELECT {} FROM worship_prayer WHERE id = $1",
        WORSHIP_PRAYER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn list_worship_prayer(pool: &PgPool) -> Result<Vec<WorshipPrayer>, sqlx::Error> {
    sqlx::query_as::<_, WorshipPrayer>(&format!(
        "SELECT {} FROM worship_prayer ORDER BY created_at DESC",
        WORSHIP_PRAYER_COLUMNS
    ))
    .fetch_all(pool)
    .await
}

pub async fn list_worship_prayer_by_category(
    pool: &PgPool,
    category: &str,
) -> Result<Vec<WorshipPrayer>, sqlx::Error> {
    sqlx::query_as::<_, WorshipPrayer>(&format!(
        "SELECT {} FROM worship_prayer WHERE category = $1 ORDER BY created_at DESC",
        WORSHIP_PRAYER_COLUMNS
    ))
    .bind(category)
    .fetch_all(pool)
    .await
}

pub async fn create_worship_prayer(
    pool: &PgPool,
    new: &NewWorshipPrayer,
) -> Result<WorshipPrayer, sqlx::Error> {
    sqlx::query_as::<_, WorshipPrayer>(&format!(
        r#"
        INSERT INTO worship_prayer (title, category, video_url, start_sec, end_sec, lyrics,
                                    chord_chart, attachments)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {}
        "#,
        WORSHIP_PRAYER_COLUMNS
    ))
    .bind(&new.title)
    .bind(&new.category)
    .bind(&new.video_url)
    .bind(new.start_sec)
    .bind(new.end_sec)
    .bind(&new.lyrics)
    .bind(&new.chord_chart)
    .bind(&new.attachments)
    .fetch_one(pool)
    .await
}

pub async fn update_worship_prayer(
    pool: &PgPool,
    id: Uuid,
    patch: &WorshipPrayerPatch,
) -> Result<Option<WorshipPrayer>, sqlx::Error> {
    let existing = match get_worship_prayer(pool, id).await? {
        Some(w) => w,
        None => return Ok(None),
    };

    let title = patch.title.clone().unwrap_or(existing.title);
    let category = patch.category.clone().unwrap_or(existing.category);
    let video_url = patch.video_url.clone().unwrap_or(existing.video_url);
    let start_sec = patch.start_sec.unwrap_or(existing.start_sec);
    let end_sec = patch.end_sec.unwrap_or(existing.end_sec);
    let lyrics = patch.lyrics.clone().unwrap_or(existing.lyrics);
    let chord_chart = patch.chord_chart.clone().unwrap_or(existing.chord_chart);
    let attachments = patch.attachments.clone().unwrap_or(existing.attachments);

    sqlx::query_as::<_, WorshipPrayer>(&format!(
        r#"
        UPDATE worship_prayer
        SET title = $1, category = $2, video_url = $3, start_sec = $4, end_sec = $5,
            lyrics = $6, chord_chart = $7, attachments = $8, updated_at = now()
        WHERE id = $9
        RETURNING {}
        "#,
        WORSHIP_PRAYER_COLUMNS
    ))
    .bind(&title)
    .bind(&category)
    .bind(&video_url)
    .bind(start_sec)
    .bind(end_sec)
    .bind(&lyrics)
    .bind(&chord_chart)
    .bind(&attachments)
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn delete_worship_prayer(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM worship_prayer WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ============================================================================
// Aggregate counts (dashboard stats)
// ============================================================================

pub struct ContentCounts {
    pub total_sermons: i64,
    pub featured_sermons: i64,
    pub total_announcements: i64,
    pub active_announcements: i64,
    pub total_subscribers: i64,
    pub active_subscribers: i64,
}

pub async fn content_counts(pool: &PgPool) -> Result<ContentCounts, sqlx::Error> {
    let (total_sermons,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM sermons")
        .fetch_one(pool)
        .await?;
    let (featured_sermons,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM sermons WHERE featured = true")
            .fetch_one(pool)
            .await?;
    let (total_announcements,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM announcements")
        .fetch_one(pool)
        .await?;
    let (active_announcements,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM announcements \
         WHERE published_at <= now() AND (expires_at IS NULL OR expires_at > now())",
    )
    .fetch_one(pool)
    .await?;
    let (total_subscribers,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscribers")
        .fetch_one(pool)
        .await?;
    let (active_subscribers,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM subscribers WHERE status = 'active'")
            .fetch_one(pool)
            .await?;

    Ok(ContentCounts {
        total_sermons,
        featured_sermons,
        total_announcements,
        active_announcements,
        total_subscribers,
        active_subscribers,
    })
}
