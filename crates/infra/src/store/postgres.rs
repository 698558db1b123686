//! Postgres-backed portal store.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | Any other | `Backend` |
//! | Row decode failure | N/A | `Decode` |
//! | Unknown `access_type` | N/A | `UnknownAccessKind` |
//! | Other | N/A | `Backend` |
//!
//! Reference tables are written by the spreadsheet import, never by the portal.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use cardioportal_auth::{AccessKind, ContentPermissions};
use cardioportal_core::{CompanyId, DeviceId, GroupId, UserId};
use cardioportal_portal::{
    Company, Device, DeviceScope, DeviceStatus, Group, PortalStore, StoreError, User,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS portal_groups (
    id    UUID PRIMARY KEY,
    code  TEXT NOT NULL UNIQUE,
    name  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS portal_companies (
    id          UUID PRIMARY KEY,
    code        TEXT NOT NULL UNIQUE,
    name        TEXT NOT NULL,
    group_code  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS portal_devices (
    id                UUID PRIMARY KEY,
    serial_number     TEXT NOT NULL UNIQUE,
    company_name      TEXT NOT NULL,
    group_name        TEXT NOT NULL,
    status            TEXT NOT NULL DEFAULT 'ACTIVE',
    model             TEXT,
    location          TEXT,
    installed_at      DATE,
    last_review_date  DATE,
    next_review_date  DATE
);

CREATE INDEX IF NOT EXISTS portal_devices_group_idx ON portal_devices (group_name);
CREATE INDEX IF NOT EXISTS portal_devices_company_idx ON portal_devices (company_name);

CREATE TABLE IF NOT EXISTS portal_users (
    id                  UUID PRIMARY KEY,
    email               TEXT NOT NULL UNIQUE,
    first_name          TEXT NOT NULL,
    last_name           TEXT NOT NULL DEFAULT '',
    access_type         TEXT NOT NULL,
    access_id           TEXT,
    group_id            UUID,
    company_id          UUID,
    device_id           UUID,
    can_view_contracts  BOOLEAN NOT NULL DEFAULT FALSE,
    can_view_trainings  BOOLEAN NOT NULL DEFAULT FALSE,
    can_view_invoices   BOOLEAN NOT NULL DEFAULT FALSE,
    active              BOOLEAN NOT NULL DEFAULT TRUE,
    password_hash       TEXT NOT NULL,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at          TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
"#;

const USER_COLUMNS: &str = "id, email, first_name, last_name, access_type, access_id, \
     group_id, company_id, device_id, can_view_contracts, can_view_trainings, \
     can_view_invoices, active, password_hash, created_at, updated_at";

const DEVICE_COLUMNS: &str = "id, serial_number, company_name, group_name, status, model, \
     location, installed_at, last_review_date, next_review_date";

#[derive(Debug, Clone)]
pub struct PostgresPortalStore {
    pool: Arc<PgPool>,
}

impl PostgresPortalStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the portal tables when they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

#[async_trait]
impl PortalStore for PostgresPortalStore {
    async fn list_groups(&self) -> Result<Vec<Group>, StoreError> {
        let rows: Vec<GroupRow> =
            sqlx::query_as("SELECT id, code, name FROM portal_groups ORDER BY name ASC")
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_groups", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_companies(&self) -> Result<Vec<Company>, StoreError> {
        let rows: Vec<CompanyRow> = sqlx::query_as(
            "SELECT id, code, name, group_code FROM portal_companies ORDER BY name ASC",
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_companies", e))?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self), err)]
    async fn list_devices(&self, scope: &DeviceScope) -> Result<Vec<Device>, StoreError> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {DEVICE_COLUMNS} FROM portal_devices"));
        match scope {
            DeviceScope::Unrestricted => {
                qb.push(" ORDER BY serial_number ASC");
            }
            DeviceScope::Group(name) => {
                qb.push(" WHERE group_name = ").push_bind(name);
                qb.push(" ORDER BY next_review_date ASC NULLS LAST, serial_number ASC");
            }
            DeviceScope::Company(name) => {
                qb.push(" WHERE company_name = ").push_bind(name);
                qb.push(" ORDER BY next_review_date ASC NULLS LAST, serial_number ASC");
            }
            DeviceScope::Device(serial) => {
                qb.push(" WHERE serial_number = ").push_bind(serial);
            }
        }

        let rows: Vec<DeviceRow> = qb
            .build_query_as()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_devices", e))?;
        tracing::debug!(count = rows.len(), "devices loaded");
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM portal_users WHERE id = $1"))
                .bind(id.as_uuid())
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_user", e))?;
        row.map(User::try_from).transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let row: Option<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM portal_users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.map(User::try_from).transpose()
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let rows: Vec<UserRow> =
            sqlx::query_as(&format!("SELECT {USER_COLUMNS} FROM portal_users ORDER BY email ASC"))
                .fetch_all(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("list_users", e))?;
        Ok(decode_users(rows))
    }

    #[instrument(skip(self), err)]
    async fn search_users(&self, needle: &str, limit: usize) -> Result<Vec<User>, StoreError> {
        let pattern = format!("%{}%", escape_like(needle));
        let rows: Vec<UserRow> = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM portal_users \
             WHERE email ILIKE $1 OR first_name ILIKE $1 OR last_name ILIKE $1 \
             ORDER BY email ASC LIMIT $2"
        ))
        .bind(pattern)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("search_users", e))?;
        Ok(decode_users(rows))
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO portal_users ({USER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)"
        ))
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.access_kind.as_str())
        .bind(&user.access_id)
        .bind(user.group_id.map(|id| *id.as_uuid()))
        .bind(user.company_id.map(|id| *id.as_uuid()))
        .bind(user.device_id.map(|id| *id.as_uuid()))
        .bind(user.permissions.can_view_contracts)
        .bind(user.permissions.can_view_trainings)
        .bind(user.permissions.can_view_invoices)
        .bind(user.active)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE portal_users SET
                email = $2,
                first_name = $3,
                last_name = $4,
                access_type = $5,
                access_id = $6,
                group_id = $7,
                company_id = $8,
                device_id = $9,
                can_view_contracts = $10,
                can_view_trainings = $11,
                can_view_invoices = $12,
                active = $13,
                password_hash = $14,
                updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.access_kind.as_str())
        .bind(&user.access_id)
        .bind(user.group_id.map(|id| *id.as_uuid()))
        .bind(user.company_id.map(|id| *id.as_uuid()))
        .bind(user.device_id.map(|id| *id.as_uuid()))
        .bind(user.permissions.can_view_contracts)
        .bind(user.permissions.can_view_trainings)
        .bind(user.permissions.can_view_invoices)
        .bind(user.active)
        .bind(&user.password_hash)
        .bind(user.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user".to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn delete_user(&self, id: UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM portal_users WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_user", e))?;
        Ok(result.rows_affected() > 0)
    }
}

/// Listings skip users whose stored kind no longer decodes; single-user reads
/// surface it as [`StoreError::UnknownAccessKind`].
fn decode_users(rows: Vec<UserRow>) -> Vec<User> {
    rows.into_iter()
        .filter_map(|row| match User::try_from(row) {
            Ok(user) => Some(user),
            Err(err) => {
                tracing::warn!(error = %err, "skipping undecodable user row");
                None
            }
        })
        .collect()
}

fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for ch in needle.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.as_ref() == "23505" => StoreError::Conflict(msg),
                _ => StoreError::Backend(msg),
            }
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) | sqlx::Error::ColumnNotFound(_) => {
            StoreError::Decode(format!("row decode failed in {}: {}", operation, err))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Backend(format!("connection pool closed in {}", operation))
        }
        _ => StoreError::Backend(format!("sqlx error in {}: {}", operation, err)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Row types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, FromRow)]
struct GroupRow {
    id: uuid::Uuid,
    code: String,
    name: String,
}

impl From<GroupRow> for Group {
    fn from(row: GroupRow) -> Self {
        Group {
            id: GroupId::from_uuid(row.id),
            code: row.code,
            name: row.name,
        }
    }
}

#[derive(Debug, FromRow)]
struct CompanyRow {
    id: uuid::Uuid,
    code: String,
    name: String,
    group_code: String,
}

impl From<CompanyRow> for Company {
    fn from(row: CompanyRow) -> Self {
        Company {
            id: CompanyId::from_uuid(row.id),
            code: row.code,
            name: row.name,
            group_code: row.group_code,
        }
    }
}

#[derive(Debug, FromRow)]
struct DeviceRow {
    id: uuid::Uuid,
    serial_number: String,
    company_name: String,
    group_name: String,
    status: String,
    model: Option<String>,
    location: Option<String>,
    installed_at: Option<NaiveDate>,
    last_review_date: Option<NaiveDate>,
    next_review_date: Option<NaiveDate>,
}

impl From<DeviceRow> for Device {
    fn from(row: DeviceRow) -> Self {
        Device {
            id: DeviceId::from_uuid(row.id),
            serial_number: row.serial_number,
            company_name: row.company_name,
            group_name: row.group_name,
            status: DeviceStatus::from_stored(&row.status),
            model: row.model,
            location: row.location,
            installed_at: row.installed_at,
            last_review_date: row.last_review_date,
            next_review_date: row.next_review_date,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: uuid::Uuid,
    email: String,
    first_name: String,
    last_name: String,
    access_type: String,
    access_id: Option<String>,
    group_id: Option<uuid::Uuid>,
    company_id: Option<uuid::Uuid>,
    device_id: Option<uuid::Uuid>,
    can_view_contracts: bool,
    can_view_trainings: bool,
    can_view_invoices: bool,
    active: bool,
    password_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let access_kind: AccessKind = row.access_type.parse().map_err(|_| {
            tracing::warn!(user_id = %row.id, access_type = %row.access_type, "stored user has an unknown access kind");
            StoreError::UnknownAccessKind(row.access_type.clone())
        })?;
        Ok(User {
            id: UserId::from_uuid(row.id),
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            access_kind,
            access_id: row.access_id,
            group_id: row.group_id.map(GroupId::from_uuid),
            company_id: row.company_id.map(CompanyId::from_uuid),
            device_id: row.device_id.map(DeviceId::from_uuid),
            permissions: ContentPermissions {
                can_view_contracts: row.can_view_contracts,
                can_view_trainings: row.can_view_trainings,
                can_view_invoices: row.can_view_invoices,
            },
            active: row.active,
            password_hash: row.password_hash,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_row(email: &str, access_type: &str) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: uuid::Uuid::now_v7(),
            email: email.to_string(),
            first_name: "Ana".to_string(),
            last_name: String::new(),
            access_type: access_type.to_string(),
            access_id: Some("ABANCA".to_string()),
            group_id: None,
            company_id: None,
            device_id: None,
            can_view_contracts: false,
            can_view_trainings: false,
            can_view_invoices: false,
            active: true,
            password_hash: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn unknown_access_kind_is_reported_not_decode_failure() {
        let err = User::try_from(user_row("a@x.test", "SUPERVISOR")).unwrap_err();
        assert_eq!(err, StoreError::UnknownAccessKind("SUPERVISOR".into()));
    }

    #[test]
    fn listings_skip_rows_with_unknown_kinds() {
        let users = decode_users(vec![
            user_row("a@x.test", "GRUPO"),
            user_row("b@x.test", "SUPERVISOR"),
            user_row("c@x.test", "ADMIN"),
        ]);
        let emails: Vec<&str> = users.iter().map(|u| u.email.as_str()).collect();
        assert_eq!(emails, vec!["a@x.test", "c@x.test"]);
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("ana"), "ana");
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
