//! PostgreSQL store
//!
//! Implements the repository traits with SQLx. The schema lives in
//! `migrations/0001_init.sql` and is applied by [`PgStore::migrate`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::models::{
    NewNote, NewUser, Note, NoteAuthor, NoteChanges, NoteFilter, RefreshToken, User, UserChanges,
    UserFilter, Visibility,
};
use crate::pagination::{Page, PageRequest};
use crate::repository::{
    NoteRepository, RefreshTokenStore, UserRepository, NOTE_SORTS, USER_SORTS,
};
use crate::{NotesError, Result};

const SCHEMA: &str = include_str!("../migrations/0001_init.sql");

const NOTE_SELECT: &str = r#"
    SELECT
        n.id, n.title, n.description, n.cover_url, n.content, n.visibility,
        n.user_id, u.name AS author_name, u.avatar_url AS author_avatar_url,
        n.created_at, n.updated_at
    FROM notes n
    JOIN users u ON u.id = n.user_id
"#;

/// PostgreSQL-backed store
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect with a pool of at most `pool_size` connections
    pub async fn new(database_url: &str, pool_size: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size)
            .connect(database_url)
            .await
            .map_err(|e| NotesError::DatabaseError(format!("PostgreSQL connection failed: {e}")))?;

        Ok(Self { pool })
    }

    /// Create from an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist
    pub async fn migrate(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| NotesError::DatabaseError(format!("Schema migration failed: {e}")))?;

        info!("Database schema is up to date");
        Ok(())
    }
}

/// User row from database
#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    bio: String,
    avatar_url: String,
    password: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            email: row.email,
            bio: row.bio,
            avatar_url: row.avatar_url,
            password_hash: row.password,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Note row joined with its author
#[derive(Debug, FromRow)]
struct NoteRow {
    id: Uuid,
    title: String,
    description: String,
    cover_url: String,
    content: String,
    visibility: String,
    user_id: Uuid,
    author_name: String,
    author_avatar_url: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Note {
            id: row.id,
            title: row.title,
            description: row.description,
            cover_url: row.cover_url,
            content: row.content,
            visibility: match row.visibility.as_str() {
                "public" => Visibility::Public,
                _ => Visibility::Private,
            },
            user_id: row.user_id,
            author: NoteAuthor {
                id: row.user_id,
                name: row.author_name,
                avatar_url: row.author_avatar_url,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn push_user_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE TRUE");
    if let Some(name) = &filter.name {
        builder.push(" AND name = ").push_bind(name.clone());
    }
}

fn push_note_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &NoteFilter) {
    builder.push(" WHERE TRUE");
    if let Some(title) = &filter.title {
        builder.push(" AND n.title = ").push_bind(title.clone());
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND n.user_id = ").push_bind(user_id);
    }
    if let Some(visibility) = filter.visibility {
        builder
            .push(" AND n.visibility = ")
            .push_bind(visibility.as_str());
    }
    match filter.viewer {
        Some(viewer) => {
            builder
                .push(" AND (n.visibility = 'public' OR n.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        None => {
            builder.push(" AND n.visibility = 'public'");
        }
    }
}

#[async_trait]
impl UserRepository for PgStore {
    async fn create(&self, user: NewUser) -> Result<User> {
        let row: UserRow = sqlx::query_as(
            r#"
            INSERT INTO users (id, name, email, password)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn get_by_email(&self, email: &str) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::from)
            .ok_or_else(|| NotesError::NotFound("User".to_string()))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(User::from)
            .ok_or_else(|| NotesError::NotFound("User".to_string()))
    }

    async fn list(&self, filter: &UserFilter, page: &PageRequest) -> Result<Page<User>> {
        let mut count = QueryBuilder::new("SELECT COUNT(*) FROM users");
        push_user_filter(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let metadata = page.normalize(total.max(0) as u64, USER_SORTS);

        let mut select = QueryBuilder::new("SELECT * FROM users");
        push_user_filter(&mut select, filter);
        // sort and order come from the whitelist in `normalize`
        select
            .push(format!(" ORDER BY {} {}", metadata.sort, metadata.order))
            .push(" LIMIT ")
            .push_bind(i64::from(metadata.limit))
            .push(" OFFSET ")
            .push_bind(metadata.offset() as i64);

        let rows: Vec<UserRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page {
            items: rows.into_iter().map(User::from).collect(),
            metadata,
        })
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                bio = COALESCE($4, bio),
                avatar_url = COALESCE($5, avatar_url),
                password = COALESCE($6, password),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.email)
        .bind(changes.bio)
        .bind(changes.avatar_url)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await?;

        row.map(User::from)
            .ok_or_else(|| NotesError::NotFound("User".to_string()))
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        // notes and refresh_tokens cascade through their foreign keys
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotesError::NotFound("User".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl NoteRepository for PgStore {
    async fn create(&self, note: NewNote) -> Result<Note> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO notes (id, title, description, cover_url, content, visibility, user_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&note.title)
        .bind(&note.description)
        .bind(&note.cover_url)
        .bind(&note.content)
        .bind(note.visibility.as_str())
        .bind(note.user_id)
        .fetch_one(&self.pool)
        .await?;

        NoteRepository::get_by_id(self, id).await
    }

    async fn list(&self, filter: &NoteFilter, page: &PageRequest) -> Result<Page<Note>> {
        let mut count =
            QueryBuilder::new("SELECT COUNT(*) FROM notes n JOIN users u ON u.id = n.user_id");
        push_note_filter(&mut count, filter);
        let (total,): (i64,) = count.build_query_as().fetch_one(&self.pool).await?;

        let metadata = page.normalize(total.max(0) as u64, NOTE_SORTS);

        let mut select = QueryBuilder::new(NOTE_SELECT);
        push_note_filter(&mut select, filter);
        select
            .push(format!(" ORDER BY n.{} {}", metadata.sort, metadata.order))
            .push(" LIMIT ")
            .push_bind(i64::from(metadata.limit))
            .push(" OFFSET ")
            .push_bind(metadata.offset() as i64);

        let rows: Vec<NoteRow> = select.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page {
            items: rows.into_iter().map(Note::from).collect(),
            metadata,
        })
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Note> {
        let row: Option<NoteRow> = sqlx::query_as(&format!("{NOTE_SELECT} WHERE n.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Note::from)
            .ok_or_else(|| NotesError::NotFound("Note".to_string()))
    }

    async fn update(&self, id: Uuid, changes: NoteChanges) -> Result<Note> {
        let updated: Option<(Uuid,)> = sqlx::query_as(
            r#"
            UPDATE notes SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                cover_url = COALESCE($4, cover_url),
                content = COALESCE($5, content),
                visibility = COALESCE($6, visibility),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(id)
        .bind(changes.title)
        .bind(changes.description)
        .bind(changes.cover_url)
        .bind(changes.content)
        .bind(changes.visibility.map(|v| v.as_str()))
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(_) => NoteRepository::get_by_id(self, id).await,
            None => Err(NotesError::NotFound("Note".to_string())),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query("DELETE FROM notes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(NotesError::NotFound("Note".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RefreshTokenStore for PgStore {
    async fn get(&self, user_id: Uuid) -> Result<RefreshToken> {
        let row: Option<(Uuid, String)> =
            sqlx::query_as("SELECT user_id, token FROM refresh_tokens WHERE user_id = $1")
                .bind(user_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(user_id, token)| RefreshToken { user_id, token })
            .ok_or_else(|| NotesError::NotFound("Refresh token".to_string()))
    }

    async fn put(&self, user_id: Uuid, token: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (user_id, token)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET token = EXCLUDED.token
            "#,
        )
        .bind(user_id)
        .bind(token)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, token: &RefreshToken) -> Result<()> {
        sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
            .bind(token.user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
