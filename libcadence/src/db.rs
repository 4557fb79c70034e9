//! Durable store for Posts and Schedules
//!
//! Every Post transition is written in its own transaction, so a crash in
//! the middle of a publish pass leaves the other Posts untouched.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::Row;

use crate::error::{CadenceError, DbError, Result};
use crate::types::{
    ImageBundle, Platform, PlatformResult, Post, PostStatus, ResultStatus, Schedule, ScheduleKind,
    ScheduleType,
};

const POST_COLUMNS: &str = "id, owner, topic, explanation, tone, content, image, platforms, \
     status, requires_approval, is_approved, scheduled_time, retry_count, max_retries, \
     posted_at, created_at, updated_at";

const SCHEDULE_COLUMNS: &str =
    "id, owner, schedule_type, config, is_active, next_run_date, last_run_date, created_at, updated_at";

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at `db_path` and run migrations
    pub async fn new(db_path: &str) -> Result<Self> {
        let expanded_path = shellexpand::tilde(db_path).to_string();
        let path = Path::new(&expanded_path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(DbError::IoError)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(DbError::SqlxError)?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DbError::MigrationError)?;

        Ok(Self { pool })
    }

    // ========================================================================
    // Posts
    // ========================================================================

    /// Insert a new post together with any recorded results
    pub async fn create_post(&self, post: &Post) -> Result<()> {
        ensure_consistent(post)?;
        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;
        insert_post(&mut tx, post).await?;
        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Persist the mutable fields of an existing post (status, content,
    /// retry bookkeeping, results). The publish lease is left untouched.
    pub async fn update_post(&self, post: &Post) -> Result<()> {
        self.write_post(post, false).await
    }

    /// Persist the outcome of a publish attempt and release the publish lease
    pub async fn complete_publish(&self, post: &Post) -> Result<()> {
        self.write_post(post, true).await
    }

    async fn write_post(&self, post: &Post, release_lease: bool) -> Result<()> {
        ensure_consistent(post)?;

        let lease_clause = if release_lease {
            ", publish_lease = NULL"
        } else {
            ""
        };
        let sql = format!(
            r#"
            UPDATE posts SET
                content = ?, image = ?, platforms = ?, status = ?,
                requires_approval = ?, is_approved = ?, scheduled_time = ?,
                retry_count = ?, max_retries = ?, posted_at = ?, updated_at = ?{}
            WHERE id = ?
            "#,
            lease_clause
        );

        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;
        let updated = sqlx::query(&sql)
            .bind(serde_json::to_string(&post.content).map_err(DbError::Serialization)?)
            .bind(encode_image(post.image.as_ref())?)
            .bind(serde_json::to_string(&post.platforms).map_err(DbError::Serialization)?)
            .bind(post.status.as_str())
            .bind(post.requires_approval)
            .bind(post.is_approved)
            .bind(post.scheduled_time)
            .bind(post.retry_count)
            .bind(post.max_retries)
            .bind(post.posted_at)
            .bind(post.updated_at)
            .bind(&post.id)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        if updated.rows_affected() == 0 {
            return Err(CadenceError::NotFound(format!("post {}", post.id)));
        }

        replace_results(&mut tx, post).await?;
        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Take the publish lease on a post.
    ///
    /// Returns `false` when another publisher holds a lease younger than
    /// `lease_ttl` seconds, or the post does not exist.
    pub async fn claim_post(&self, post_id: &str, now: i64, lease_ttl: i64) -> Result<bool> {
        let claimed = sqlx::query(
            r#"
            UPDATE posts SET publish_lease = ?
            WHERE id = ? AND (publish_lease IS NULL OR publish_lease <= ?)
            "#,
        )
        .bind(now)
        .bind(post_id)
        .bind(now - lease_ttl)
        .execute(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        Ok(claimed.rows_affected() == 1)
    }

    /// Drop the publish lease without recording an outcome
    pub async fn release_lease(&self, post_id: &str) -> Result<()> {
        sqlx::query("UPDATE posts SET publish_lease = NULL WHERE id = ?")
            .bind(post_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Get a post by ID
    pub async fn get_post(&self, post_id: &str) -> Result<Option<Post>> {
        let sql = format!("SELECT {} FROM posts WHERE id = ?", POST_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        match row {
            Some(row) => Ok(Some(self.hydrate_post(&row).await?)),
            None => Ok(None),
        }
    }

    /// Get a post by ID, treating posts of other owners as absent
    pub async fn get_post_for_owner(&self, owner: &str, post_id: &str) -> Result<Option<Post>> {
        Ok(self.get_post(post_id).await?.filter(|p| p.owner == owner))
    }

    /// Posts the scheduler may publish at `now`: scheduled, due, approved
    /// when approval is required, and not leased by another publisher.
    pub async fn due_posts(&self, now: i64, lease_ttl: i64) -> Result<Vec<Post>> {
        let sql = format!(
            r#"
            SELECT {} FROM posts
            WHERE status = 'scheduled'
              AND scheduled_time IS NOT NULL
              AND scheduled_time <= ?
              AND (requires_approval = 0 OR is_approved = 1)
              AND (publish_lease IS NULL OR publish_lease <= ?)
            ORDER BY scheduled_time ASC
            "#,
            POST_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(now - lease_ttl)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        self.hydrate_posts(rows).await
    }

    /// Whether `owner` already has a post on `topic` scheduled in `[start, end)`
    pub async fn post_exists_for_topic(
        &self,
        owner: &str,
        topic: &str,
        start: i64,
        end: i64,
    ) -> Result<bool> {
        let count: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS n FROM posts
            WHERE owner = ? AND topic = ? AND scheduled_time >= ? AND scheduled_time < ?
            "#,
        )
        .bind(owner)
        .bind(topic)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await
        .map_err(DbError::SqlxError)?
        .get("n");

        Ok(count > 0)
    }

    /// List an owner's posts, newest first
    pub async fn list_posts(
        &self,
        owner: &str,
        status: Option<PostStatus>,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let status_clause = if status.is_some() {
            " AND status = ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM posts WHERE owner = ?{} ORDER BY created_at DESC, id LIMIT ?",
            POST_COLUMNS, status_clause
        );

        let mut query = sqlx::query(&sql).bind(owner);
        if let Some(status) = status {
            query = query.bind(status.as_str());
        }
        let rows = query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        self.hydrate_posts(rows).await
    }

    async fn hydrate_posts(&self, rows: Vec<SqliteRow>) -> Result<Vec<Post>> {
        let mut posts = Vec::with_capacity(rows.len());
        for row in &rows {
            posts.push(self.hydrate_post(row).await?);
        }
        Ok(posts)
    }

    async fn hydrate_post(&self, row: &SqliteRow) -> Result<Post> {
        let mut post = post_from_row(row)?;
        post.post_results = self.get_post_results(&post.id).await?;
        Ok(post)
    }

    /// Results of the latest publish attempt, in recorded order
    pub async fn get_post_results(&self, post_id: &str) -> Result<Vec<PlatformResult>> {
        let rows = sqlx::query(
            r#"
            SELECT platform, status, platform_post_id, url, error, posted_at
            FROM post_results
            WHERE post_id = ?
            ORDER BY position ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?;

        rows.iter().map(result_from_row).collect()
    }

    // ========================================================================
    // Schedules
    // ========================================================================

    /// Insert a schedule. Every id in `post_ids` must name an existing post.
    pub async fn create_schedule(&self, schedule: &Schedule) -> Result<()> {
        self.create_schedule_with_posts(schedule, &[]).await
    }

    /// Insert `posts` and a schedule owning them in one transaction
    pub async fn create_schedule_with_posts(&self, schedule: &Schedule, posts: &[Post]) -> Result<()> {
        for post in posts {
            ensure_consistent(post)?;
        }

        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;
        for post in posts {
            insert_post(&mut tx, post).await?;
        }

        let sql = format!(
            "INSERT INTO schedules ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            SCHEDULE_COLUMNS
        );
        sqlx::query(&sql)
            .bind(&schedule.id)
            .bind(&schedule.owner)
            .bind(schedule.schedule_type().as_str())
            .bind(serde_json::to_string(&schedule.kind).map_err(DbError::Serialization)?)
            .bind(schedule.is_active)
            .bind(schedule.next_run_date)
            .bind(schedule.last_run_date)
            .bind(schedule.created_at)
            .bind(schedule.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(DbError::SqlxError)?;

        for (position, post_id) in schedule.post_ids.iter().enumerate() {
            link_post(&mut tx, &schedule.id, post_id, position as i64).await?;
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Store a post produced by recurrence expansion, append it to its
    /// schedule and stamp the schedule's last run, all in one transaction.
    pub async fn record_expansion(&self, schedule_id: &str, post: &Post, now: i64) -> Result<()> {
        ensure_consistent(post)?;

        let mut tx = self.pool.begin().await.map_err(DbError::SqlxError)?;
        insert_post(&mut tx, post).await?;

        sqlx::query(
            r#"
            INSERT INTO schedule_posts (schedule_id, post_id, position)
            SELECT ?, ?, COALESCE(MAX(position) + 1, 0) FROM schedule_posts WHERE schedule_id = ?
            "#,
        )
        .bind(schedule_id)
        .bind(&post.id)
        .bind(schedule_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        let updated = sqlx::query(
            "UPDATE schedules SET last_run_date = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(schedule_id)
        .execute(&mut *tx)
        .await
        .map_err(DbError::SqlxError)?;

        if updated.rows_affected() == 0 {
            return Err(CadenceError::NotFound(format!("schedule {}", schedule_id)));
        }

        tx.commit().await.map_err(DbError::SqlxError)?;
        Ok(())
    }

    /// Set a schedule's active flag. Returns `false` if it does not exist.
    pub async fn set_schedule_active(&self, schedule_id: &str, active: bool, now: i64) -> Result<bool> {
        let updated = sqlx::query("UPDATE schedules SET is_active = ?, updated_at = ? WHERE id = ?")
            .bind(active)
            .bind(now)
            .bind(schedule_id)
            .execute(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        Ok(updated.rows_affected() == 1)
    }

    pub async fn get_schedule(&self, schedule_id: &str) -> Result<Option<Schedule>> {
        let sql = format!("SELECT {} FROM schedules WHERE id = ?", SCHEDULE_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(schedule_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;

        match row {
            Some(row) => Ok(Some(self.hydrate_schedule(&row).await?)),
            None => Ok(None),
        }
    }

    pub async fn get_schedule_for_owner(
        &self,
        owner: &str,
        schedule_id: &str,
    ) -> Result<Option<Schedule>> {
        Ok(self
            .get_schedule(schedule_id)
            .await?
            .filter(|s| s.owner == owner))
    }

    /// An owner's schedules, newest first
    pub async fn list_schedules(&self, owner: &str) -> Result<Vec<Schedule>> {
        let sql = format!(
            "SELECT {} FROM schedules WHERE owner = ? ORDER BY created_at DESC, id",
            SCHEDULE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(owner)
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        self.hydrate_schedules(rows).await
    }

    /// Active schedules of one type, across all owners
    pub async fn active_schedules(&self, schedule_type: ScheduleType) -> Result<Vec<Schedule>> {
        let sql = format!(
            "SELECT {} FROM schedules WHERE schedule_type = ? AND is_active = 1 ORDER BY created_at, id",
            SCHEDULE_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(schedule_type.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(DbError::SqlxError)?;
        self.hydrate_schedules(rows).await
    }

    async fn hydrate_schedules(&self, rows: Vec<SqliteRow>) -> Result<Vec<Schedule>> {
        let mut schedules = Vec::with_capacity(rows.len());
        for row in &rows {
            schedules.push(self.hydrate_schedule(row).await?);
        }
        Ok(schedules)
    }

    async fn hydrate_schedule(&self, row: &SqliteRow) -> Result<Schedule> {
        let id: String = row.get("id");
        let kind: ScheduleKind =
            serde_json::from_str(row.get::<&str, _>("config")).map_err(DbError::Serialization)?;

        let post_ids = sqlx::query(
            "SELECT post_id FROM schedule_posts WHERE schedule_id = ? ORDER BY position ASC",
        )
        .bind(&id)
        .fetch_all(&self.pool)
        .await
        .map_err(DbError::SqlxError)?
        .iter()
        .map(|r| r.get::<String, _>("post_id"))
        .collect();

        Ok(Schedule {
            id,
            owner: row.get("owner"),
            kind,
            post_ids,
            is_active: row.get("is_active"),
            next_run_date: row.get("next_run_date"),
            last_run_date: row.get("last_run_date"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

fn ensure_consistent(post: &Post) -> Result<()> {
    post.check_invariants().map_err(|violation| {
        CadenceError::InvalidState(format!("refusing to store post {}: {}", post.id, violation))
    })
}

fn encode_image(image: Option<&ImageBundle>) -> Result<Option<String>> {
    image
        .map(|bundle| serde_json::to_string(bundle).map_err(|e| CadenceError::from(DbError::Serialization(e))))
        .transpose()
}

async fn insert_post(conn: &mut SqliteConnection, post: &Post) -> Result<()> {
    let sql = format!(
        "INSERT INTO posts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        POST_COLUMNS
    );
    sqlx::query(&sql)
        .bind(&post.id)
        .bind(&post.owner)
        .bind(&post.topic)
        .bind(&post.explanation)
        .bind(post.tone.as_str())
        .bind(serde_json::to_string(&post.content).map_err(DbError::Serialization)?)
        .bind(encode_image(post.image.as_ref())?)
        .bind(serde_json::to_string(&post.platforms).map_err(DbError::Serialization)?)
        .bind(post.status.as_str())
        .bind(post.requires_approval)
        .bind(post.is_approved)
        .bind(post.scheduled_time)
        .bind(post.retry_count)
        .bind(post.max_retries)
        .bind(post.posted_at)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::SqlxError)?;

    replace_results(conn, post).await
}

async fn replace_results(conn: &mut SqliteConnection, post: &Post) -> Result<()> {
    sqlx::query("DELETE FROM post_results WHERE post_id = ?")
        .bind(&post.id)
        .execute(&mut *conn)
        .await
        .map_err(DbError::SqlxError)?;

    for (position, result) in post.post_results.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO post_results
                (post_id, position, platform, status, platform_post_id, url, error, posted_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&post.id)
        .bind(position as i64)
        .bind(result.platform.as_str())
        .bind(result.status.as_str())
        .bind(&result.post_id)
        .bind(&result.url)
        .bind(&result.error)
        .bind(result.posted_at)
        .execute(&mut *conn)
        .await
        .map_err(DbError::SqlxError)?;
    }

    Ok(())
}

async fn link_post(
    conn: &mut SqliteConnection,
    schedule_id: &str,
    post_id: &str,
    position: i64,
) -> Result<()> {
    sqlx::query("INSERT INTO schedule_posts (schedule_id, post_id, position) VALUES (?, ?, ?)")
        .bind(schedule_id)
        .bind(post_id)
        .bind(position)
        .execute(&mut *conn)
        .await
        .map_err(DbError::SqlxError)?;
    Ok(())
}

fn corrupt(column: &str, detail: impl std::fmt::Display) -> CadenceError {
    DbError::Corrupt(format!("{}: {}", column, detail)).into()
}

fn post_from_row(r: &SqliteRow) -> Result<Post> {
    let content: BTreeMap<Platform, String> =
        serde_json::from_str(r.get::<&str, _>("content")).map_err(DbError::Serialization)?;
    let image: Option<ImageBundle> = r
        .get::<Option<&str>, _>("image")
        .map(serde_json::from_str)
        .transpose()
        .map_err(DbError::Serialization)?;
    let platforms: Vec<Platform> =
        serde_json::from_str(r.get::<&str, _>("platforms")).map_err(DbError::Serialization)?;

    Ok(Post {
        id: r.get("id"),
        owner: r.get("owner"),
        topic: r.get("topic"),
        explanation: r.get("explanation"),
        tone: r
            .get::<&str, _>("tone")
            .parse()
            .map_err(|e| corrupt("tone", e))?,
        content,
        image,
        platforms,
        status: r
            .get::<&str, _>("status")
            .parse()
            .map_err(|e| corrupt("status", e))?,
        requires_approval: r.get("requires_approval"),
        is_approved: r.get("is_approved"),
        scheduled_time: r.get("scheduled_time"),
        retry_count: r.get("retry_count"),
        max_retries: r.get("max_retries"),
        post_results: Vec::new(),
        posted_at: r.get("posted_at"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    })
}

fn result_from_row(r: &SqliteRow) -> Result<PlatformResult> {
    let status = match r.get::<&str, _>("status") {
        "success" => ResultStatus::Success,
        "failed" => ResultStatus::Failed,
        other => return Err(corrupt("post_results.status", other)),
    };

    Ok(PlatformResult {
        platform: r
            .get::<&str, _>("platform")
            .parse()
            .map_err(|e| corrupt("post_results.platform", e))?,
        status,
        post_id: r.get("platform_post_id"),
        url: r.get("url"),
        error: r.get("error"),
        posted_at: r.get("posted_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DayOfWeek, DayTemplate, Tone, WeeklyConfig};
    use tempfile::TempDir;

    async fn setup_db() -> (Database, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let db = Database::new(db_path.to_str().unwrap()).await.unwrap();
        (db, temp_dir)
    }

    fn scheduled_post(owner: &str, topic: &str, at: i64) -> Post {
        let mut post = Post::new(owner, topic, "Why it matters");
        post.platforms = vec![Platform::LinkedIn, Platform::Twitter];
        post.content
            .insert(Platform::LinkedIn, "Long form text".to_string());
        post.content.insert(Platform::Twitter, "Short text".to_string());
        post.status = PostStatus::Scheduled;
        post.scheduled_time = Some(at);
        post
    }

    #[tokio::test]
    async fn test_database_initialization_with_invalid_path() {
        #[cfg(unix)]
        let invalid_path = "/tmp/cadence\0invalid.db";

        #[cfg(windows)]
        let invalid_path = "C:\\invalid<>path\\test.db";

        let result = Database::new(invalid_path).await;
        assert!(matches!(result, Err(CadenceError::Database(_))));
    }

    #[tokio::test]
    async fn test_create_and_get_post_round_trips_fields() {
        let (db, _dir) = setup_db().await;

        let mut post = scheduled_post("owner-1", "AI in Healthcare", 1_000);
        post.tone = Tone::Educational;
        let mut image = ImageBundle::new("https://img.example/a.png");
        image
            .variants
            .insert(Platform::Twitter, "https://img.example/a-tw.jpg".to_string());
        post.image = Some(image.clone());

        db.create_post(&post).await.unwrap();
        let loaded = db.get_post(&post.id).await.unwrap().unwrap();

        assert_eq!(loaded.owner, "owner-1");
        assert_eq!(loaded.topic, "AI in Healthcare");
        assert_eq!(loaded.tone, Tone::Educational);
        assert_eq!(loaded.status, PostStatus::Scheduled);
        assert_eq!(loaded.scheduled_time, Some(1_000));
        assert_eq!(loaded.platforms, vec![Platform::LinkedIn, Platform::Twitter]);
        assert_eq!(loaded.content.get(&Platform::Twitter).unwrap(), "Short text");
        assert_eq!(loaded.image, Some(image));
        assert_eq!(loaded.max_retries, 3);
    }

    #[tokio::test]
    async fn test_get_nonexistent_post_returns_none() {
        let (db, _dir) = setup_db().await;
        assert!(db.get_post("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_post_for_other_owner_returns_none() {
        let (db, _dir) = setup_db().await;
        let post = scheduled_post("owner-1", "Topic", 1_000);
        db.create_post(&post).await.unwrap();

        assert!(db.get_post_for_owner("owner-2", &post.id).await.unwrap().is_none());
        assert!(db.get_post_for_owner("owner-1", &post.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_create_rejects_inconsistent_post() {
        let (db, _dir) = setup_db().await;
        let mut post = scheduled_post("owner-1", "Topic", 1_000);
        post.scheduled_time = None;

        let result = db.create_post(&post).await;
        assert!(matches!(result, Err(CadenceError::InvalidState(_))));
        assert!(db.get_post(&post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_post_replaces_results_in_order() {
        let (db, _dir) = setup_db().await;
        let mut post = scheduled_post("owner-1", "Topic", 1_000);
        db.create_post(&post).await.unwrap();

        post.post_results = vec![
            PlatformResult::success(
                Platform::LinkedIn,
                "urn:1".to_string(),
                "https://linkedin/1".to_string(),
                2_000,
            ),
            PlatformResult::failed(Platform::Twitter, "rate limited", 2_000),
        ];
        post.status = PostStatus::Posted;
        post.posted_at = Some(2_000);
        db.update_post(&post).await.unwrap();

        let loaded = db.get_post(&post.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, PostStatus::Posted);
        assert_eq!(loaded.post_results.len(), 2);
        assert_eq!(loaded.post_results[0].platform, Platform::LinkedIn);
        assert!(loaded.post_results[0].is_success());
        assert_eq!(loaded.post_results[1].error.as_deref(), Some("rate limited"));

        // A later write replaces rather than appends
        post.post_results.truncate(1);
        db.update_post(&post).await.unwrap();
        assert_eq!(db.get_post_results(&post.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_post_is_not_found() {
        let (db, _dir) = setup_db().await;
        let post = scheduled_post("owner-1", "Topic", 1_000);
        let result = db.update_post(&post).await;
        assert!(matches!(result, Err(CadenceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_due_posts_filters_by_time_status_and_approval() {
        let (db, _dir) = setup_db().await;

        let due = scheduled_post("o", "due", 900);
        let future = scheduled_post("o", "future", 1_100);

        let mut awaiting = scheduled_post("o", "awaiting", 900);
        awaiting.status = PostStatus::PendingReview;
        awaiting.requires_approval = true;

        let mut approved = scheduled_post("o", "approved", 900);
        approved.requires_approval = true;
        approved.is_approved = true;

        let mut draft = scheduled_post("o", "draft", 900);
        draft.status = PostStatus::Draft;

        for post in [&due, &future, &awaiting, &approved, &draft] {
            db.create_post(post).await.unwrap();
        }

        let selected: Vec<String> = db
            .due_posts(1_000, 600)
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.topic)
            .collect();
        assert_eq!(selected.len(), 2);
        assert!(selected.contains(&"due".to_string()));
        assert!(selected.contains(&"approved".to_string()));
    }

    #[tokio::test]
    async fn test_claim_is_exclusive_until_released_or_expired() {
        let (db, _dir) = setup_db().await;
        let post = scheduled_post("o", "topic", 900);
        db.create_post(&post).await.unwrap();

        assert!(db.claim_post(&post.id, 1_000, 600).await.unwrap());
        assert!(!db.claim_post(&post.id, 1_010, 600).await.unwrap());

        // Leased posts are not due
        assert!(db.due_posts(1_010, 600).await.unwrap().is_empty());

        // Expired leases can be taken over
        assert!(db.claim_post(&post.id, 1_700, 600).await.unwrap());

        db.release_lease(&post.id).await.unwrap();
        assert!(db.claim_post(&post.id, 1_701, 600).await.unwrap());
    }

    #[tokio::test]
    async fn test_complete_publish_releases_lease() {
        let (db, _dir) = setup_db().await;
        let mut post = scheduled_post("o", "topic", 900);
        db.create_post(&post).await.unwrap();
        assert!(db.claim_post(&post.id, 1_000, 600).await.unwrap());

        post.scheduled_time = Some(1_300);
        post.retry_count = 1;
        db.complete_publish(&post).await.unwrap();

        assert!(db.claim_post(&post.id, 1_001, 600).await.unwrap());
    }

    #[tokio::test]
    async fn test_post_exists_for_topic_window() {
        let (db, _dir) = setup_db().await;
        db.create_post(&scheduled_post("o", "AI", 1_000)).await.unwrap();

        assert!(db.post_exists_for_topic("o", "AI", 0, 2_000).await.unwrap());
        assert!(!db.post_exists_for_topic("o", "AI", 1_001, 2_000).await.unwrap());
        assert!(!db.post_exists_for_topic("o", "Other", 0, 2_000).await.unwrap());
        assert!(!db.post_exists_for_topic("p", "AI", 0, 2_000).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_posts_with_status_filter() {
        let (db, _dir) = setup_db().await;
        let mut draft = Post::new("o", "draft", "x");
        draft.platforms = vec![Platform::Facebook];
        db.create_post(&draft).await.unwrap();
        db.create_post(&scheduled_post("o", "sched", 10)).await.unwrap();
        db.create_post(&scheduled_post("other", "sched", 10)).await.unwrap();

        assert_eq!(db.list_posts("o", None, 50).await.unwrap().len(), 2);
        let drafts = db.list_posts("o", Some(PostStatus::Draft), 50).await.unwrap();
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].topic, "draft");
        assert_eq!(db.list_posts("o", None, 1).await.unwrap().len(), 1);
    }

    fn weekly_schedule(owner: &str) -> Schedule {
        let mut config = WeeklyConfig::default();
        config.days.insert(
            DayOfWeek::Monday,
            DayTemplate {
                topic: "AI in Healthcare".to_string(),
                explanation: "Diagnostics".to_string(),
                platforms: vec![Platform::LinkedIn, Platform::Twitter],
            },
        );
        Schedule::new(owner, ScheduleKind::Weekly(config))
    }

    #[tokio::test]
    async fn test_schedule_round_trip_and_active_filter() {
        let (db, _dir) = setup_db().await;
        let schedule = weekly_schedule("o");
        db.create_schedule(&schedule).await.unwrap();

        let loaded = db.get_schedule(&schedule.id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, schedule.kind);
        assert!(loaded.is_active);
        assert!(loaded.post_ids.is_empty());

        assert_eq!(db.active_schedules(ScheduleType::Weekly).await.unwrap().len(), 1);
        assert!(db.active_schedules(ScheduleType::Monthly).await.unwrap().is_empty());

        assert!(db.set_schedule_active(&schedule.id, false, 5).await.unwrap());
        assert!(db.active_schedules(ScheduleType::Weekly).await.unwrap().is_empty());
        assert!(!db.set_schedule_active("missing", false, 5).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_expansion_appends_post_and_stamps_run() {
        let (db, _dir) = setup_db().await;
        let schedule = weekly_schedule("o");
        db.create_schedule(&schedule).await.unwrap();

        let first = scheduled_post("o", "AI in Healthcare", 1_000);
        let second = scheduled_post("o", "AI in Healthcare", 90_000);
        db.record_expansion(&schedule.id, &first, 1_000).await.unwrap();
        db.record_expansion(&schedule.id, &second, 90_000).await.unwrap();

        let loaded = db.get_schedule(&schedule.id).await.unwrap().unwrap();
        assert_eq!(loaded.post_ids, vec![first.id.clone(), second.id.clone()]);
        assert_eq!(loaded.last_run_date, Some(90_000));
    }

    #[tokio::test]
    async fn test_record_expansion_for_missing_schedule_rolls_back() {
        let (db, _dir) = setup_db().await;
        let post = scheduled_post("o", "topic", 1_000);

        let result = db.record_expansion("missing", &post, 1_000).await;
        assert!(result.is_err());
        assert!(db.get_post(&post.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_post_belongs_to_one_schedule() {
        let (db, _dir) = setup_db().await;
        let post = scheduled_post("o", "topic", 1_000);

        let mut first = Schedule::new("o", ScheduleKind::Today);
        first.post_ids = vec![post.id.clone()];
        db.create_schedule_with_posts(&first, std::slice::from_ref(&post))
            .await
            .unwrap();

        let mut second = Schedule::new("o", ScheduleKind::Today);
        second.post_ids = vec![post.id.clone()];
        assert!(db.create_schedule(&second).await.is_err());
        assert!(db.get_schedule(&second.id).await.unwrap().is_none());
    }
}
