use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub role_id: Uuid,
    pub organization_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct RoleRecord {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub home: bool,
    pub create_job: bool,
    pub view_job: bool,
    pub iam: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct InviteRecord {
    pub id: Uuid,
    pub email: String,
    pub organization_id: Uuid,
    pub role_id: Uuid,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub accepted: bool,
}

#[derive(Debug)]
pub struct ProvisionedOrg {
    pub user_id: Uuid,
    pub organization_id: Uuid,
    pub role_id: Uuid,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("email already registered")]
    EmailTaken,
    #[error("organization name already in use")]
    OrganizationExists,
    #[error("invite already used or missing")]
    InviteUnavailable,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// All reads and writes against organizations, roles, users, and invites.
/// Multi-step creation flows run inside a single transaction so a failure
/// partway leaves no rows behind.
#[derive(Clone)]
pub struct AuthStore {
    pool: PgPool,
}

impl AuthStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, password_hash, role_id, organization_id, created_at, updated_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn organization_name_exists(&self, name: &str) -> Result<bool, sqlx::Error> {
        let row: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM organizations WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    pub async fn find_role(&self, role_id: Uuid) -> Result<Option<RoleRecord>, sqlx::Error> {
        sqlx::query_as::<_, RoleRecord>(
            "SELECT id, organization_id, name, home, create_job, view_job, iam
             FROM roles WHERE id = $1",
        )
        .bind(role_id)
        .fetch_optional(&self.pool)
        .await
    }

    /// Accepted invites never match; expiry is left to the caller so a
    /// lapsed invite can be reported as expired rather than missing.
    pub async fn find_invite_by_token(
        &self,
        token: &str,
    ) -> Result<Option<InviteRecord>, sqlx::Error> {
        sqlx::query_as::<_, InviteRecord>(
            "SELECT id, email, organization_id, role_id, token, expires_at, accepted
             FROM invites WHERE token = $1 AND accepted = FALSE",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Creates the organization, its all-capability admin role, and the
    /// first user, then backfills the organization's creator, all in one
    /// transaction. The application-level existence checks in the handler
    /// are advisory; the unique constraints here are the actual guard.
    pub async fn provision_organization(
        &self,
        name: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<ProvisionedOrg, StoreError> {
        let mut tx = self.pool.begin().await?;

        let organization_id = Uuid::new_v4();
        sqlx::query("INSERT INTO organizations (id, name) VALUES ($1, $2)")
            .bind(organization_id)
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(|err| map_unique(err, StoreError::OrganizationExists))?;

        let role_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO roles (id, organization_id, name, home, create_job, view_job, iam)
             VALUES ($1, $2, $3, TRUE, TRUE, TRUE, TRUE)",
        )
        .bind(role_id)
        .bind(organization_id)
        .bind("admin")
        .execute(&mut *tx)
        .await?;

        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, role_id, organization_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .bind(role_id)
        .bind(organization_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| map_unique(err, StoreError::EmailTaken))?;

        sqlx::query("UPDATE organizations SET created_by = $1 WHERE id = $2")
            .bind(user_id)
            .bind(organization_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(ProvisionedOrg {
            user_id,
            organization_id,
            role_id,
        })
    }

    pub async fn create_invite(
        &self,
        email: &str,
        organization_id: Uuid,
        role_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<InviteRecord, sqlx::Error> {
        sqlx::query_as::<_, InviteRecord>(
            "INSERT INTO invites (id, email, organization_id, role_id, token, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id, email, organization_id, role_id, token, expires_at, accepted",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(organization_id)
        .bind(role_id)
        .bind(token)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
    }

    /// Flips the accepted flag and creates the invited user in one
    /// transaction. The update predicate carries `accepted = FALSE`, so two
    /// concurrent accepts race on the row update rather than on the earlier
    /// lookup; the loser sees zero updated rows and aborts.
    pub async fn consume_invite(
        &self,
        invite: &InviteRecord,
        password_hash: &str,
    ) -> Result<Uuid, StoreError> {
        let mut tx = self.pool.begin().await?;

        let updated =
            sqlx::query("UPDATE invites SET accepted = TRUE WHERE id = $1 AND accepted = FALSE")
                .bind(invite.id)
                .execute(&mut *tx)
                .await?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::InviteUnavailable);
        }

        let user_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, email, password_hash, role_id, organization_id)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(&invite.email)
        .bind(password_hash)
        .bind(invite.role_id)
        .bind(invite.organization_id)
        .execute(&mut *tx)
        .await
        .map_err(|err| map_unique(err, StoreError::EmailTaken))?;

        tx.commit().await?;
        Ok(user_id)
    }
}

fn map_unique(err: sqlx::Error, conflict: StoreError) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => conflict,
        _ => StoreError::Database(err),
    }
}
