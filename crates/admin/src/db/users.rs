//! User account repository.
//!
//! Accounts are read with their role IDs and restaurant assignments. Writes
//! that can change who holds Administrator run inside a transaction opened
//! by the caller: [`lock_admin_count`] locks the Administrator role row and
//! only then counts its active holders, so concurrent demotions serialize on
//! that one lock and each sees what the previous one committed.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use tablewise_core::access::{ADMINISTRATOR, FilterField, FilterOp};
use tablewise_core::{Email, RecordFilter, RestaurantId, Role, RoleId, RoleRef, User, UserId};

use super::{RepositoryError, conflict_on_unique};

const ACCOUNT_COLUMNS: &str = r"
    u.id, u.email, u.is_active, u.loyalty_points, u.created_at, u.updated_at,
    ARRAY(SELECT ur.role_id FROM app.user_role ur WHERE ur.user_id = u.id ORDER BY ur.role_id) AS role_ids,
    ARRAY(SELECT ua.restaurant_id FROM app.user_restaurant ua WHERE ua.user_id = u.id ORDER BY ua.restaurant_id) AS restaurant_ids
";

#[derive(Debug, sqlx::FromRow)]
struct AccountRow {
    id: i32,
    email: String,
    is_active: bool,
    loyalty_points: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    role_ids: Vec<i32>,
    restaurant_ids: Vec<i32>,
}

#[derive(Debug, sqlx::FromRow)]
struct AccountWithPasswordRow {
    #[sqlx(flatten)]
    account: AccountRow,
    password_hash: String,
}

/// A stored account with role references left as IDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub id: UserId,
    pub email: Email,
    pub roles: Vec<RoleId>,
    pub restaurants: Vec<RestaurantId>,
    pub is_active: bool,
    pub loyalty_points: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepositoryError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            email,
            roles: row.role_ids.into_iter().map(RoleId::new).collect(),
            restaurants: row.restaurant_ids.into_iter().map(RestaurantId::new).collect(),
            is_active: row.is_active,
            loyalty_points: row.loyalty_points,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl Account {
    /// Build the access-model user, resolving role IDs against `roles`.
    ///
    /// Roles missing from `roles` stay unresolved.
    #[must_use]
    pub fn to_user(&self, roles: &[Role]) -> User {
        User {
            id: self.id,
            email: self.email.clone(),
            roles: self
                .roles
                .iter()
                .map(|id| {
                    roles
                        .iter()
                        .find(|r| r.id == *id)
                        .map_or(RoleRef::Unresolved(*id), |r| RoleRef::Resolved(r.clone()))
                })
                .collect(),
            restaurants: self.restaurants.clone(),
            is_active: self.is_active,
        }
    }
}

/// Fields of a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: Email,
    pub password_hash: String,
    pub roles: Vec<RoleId>,
    pub restaurants: Vec<RestaurantId>,
}

/// Partial update of an account. `None` leaves the field unchanged; list
/// fields replace the whole set.
#[derive(Debug, Clone, Default)]
pub struct AccountPatch {
    pub email: Option<Email>,
    pub password_hash: Option<String>,
    pub roles: Option<Vec<RoleId>>,
    pub restaurants: Option<Vec<RestaurantId>>,
    pub is_active: Option<bool>,
}

impl AccountPatch {
    /// Whether the patch touches role membership, tenant scope or the active
    /// flag, as opposed to only profile fields.
    #[must_use]
    pub const fn changes_capabilities(&self) -> bool {
        self.roles.is_some() || self.restaurants.is_some() || self.is_active.is_some()
    }

    /// Whether the patch replaces the login email or password.
    #[must_use]
    pub const fn changes_credentials(&self) -> bool {
        self.email.is_some() || self.password_hash.is_some()
    }
}

/// Repository for user accounts.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List accounts, optionally constrained by an access filter.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a stored email is invalid.
    pub async fn list(&self, filter: Option<&RecordFilter>) -> Result<Vec<Account>, RepositoryError> {
        let rows = match filter.map(|f| (f.field, &f.op)) {
            None => {
                sqlx::query_as::<_, AccountRow>(&format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM app.app_user u ORDER BY u.id"
                ))
                .fetch_all(self.pool)
                .await?
            }
            Some((FilterField::User, FilterOp::Equals(id))) => {
                sqlx::query_as::<_, AccountRow>(&format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM app.app_user u WHERE u.id = $1 ORDER BY u.id"
                ))
                .bind(*id)
                .fetch_all(self.pool)
                .await?
            }
            Some((FilterField::User, FilterOp::In(ids))) => {
                sqlx::query_as::<_, AccountRow>(&format!(
                    "SELECT {ACCOUNT_COLUMNS} FROM app.app_user u WHERE u.id = ANY($1) ORDER BY u.id"
                ))
                .bind(ids)
                .fetch_all(self.pool)
                .await?
            }
            Some((FilterField::Restaurant, op)) => {
                let ids = match op {
                    FilterOp::In(ids) => ids.clone(),
                    FilterOp::Equals(id) => vec![*id],
                };
                sqlx::query_as::<_, AccountRow>(&format!(
                    r"
                    SELECT {ACCOUNT_COLUMNS} FROM app.app_user u
                    WHERE EXISTS (
                        SELECT 1 FROM app.user_restaurant ua
                        WHERE ua.user_id = u.id AND ua.restaurant_id = ANY($1)
                    )
                    ORDER BY u.id
                    "
                ))
                .bind(&ids)
                .fetch_all(self.pool)
                .await?
            }
        };

        rows.into_iter().map(TryInto::try_into).collect()
    }

    /// Get an account by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: UserId) -> Result<Option<Account>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM app.app_user u WHERE u.id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get an account and its password hash by email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_with_password(
        &self,
        email: &Email,
    ) -> Result<Option<(Account, String)>, RepositoryError> {
        let row = sqlx::query_as::<_, AccountWithPasswordRow>(&format!(
            "SELECT {ACCOUNT_COLUMNS}, u.password_hash FROM app.app_user u WHERE u.email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(|r| Account::try_from(r.account).map(|account| (account, r.password_hash)))
            .transpose()
    }

    /// Create an account.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(&self, new: &NewAccount) -> Result<Account, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO app.app_user (email, password_hash)
            VALUES ($1, $2)
            RETURNING id
            ",
        )
        .bind(new.email.as_str())
        .bind(&new.password_hash)
        .fetch_one(&mut *tx)
        .await
        .map_err(conflict_on_unique("email already exists"))?;

        let id = UserId::new(id);
        replace_roles(&mut tx, id, &new.roles).await?;
        replace_restaurants(&mut tx, id, &new.restaurants).await?;
        tx.commit().await?;

        self.get(id).await?.ok_or(RepositoryError::NotFound)
    }

    /// Add loyalty points and return the new balance.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the account doesn't exist.
    pub async fn add_loyalty_points(&self, id: UserId, points: i64) -> Result<i64, RepositoryError> {
        let balance: Option<i64> = sqlx::query_scalar(
            r"
            UPDATE app.app_user
            SET loyalty_points = loyalty_points + $2, updated_at = NOW()
            WHERE id = $1
            RETURNING loyalty_points
            ",
        )
        .bind(id.as_i32())
        .bind(points)
        .fetch_optional(self.pool)
        .await?;

        balance.ok_or(RepositoryError::NotFound)
    }
}

/// Lock the Administrator role rows, then count the active accounts holding
/// one of them.
///
/// Must run inside the transaction performing the write. The count is a
/// separate statement so that, once a waiting transaction gets the lock, it
/// reads role membership as of that moment rather than as of when it
/// started waiting.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn lock_admin_count(conn: &mut PgConnection) -> Result<usize, RepositoryError> {
    sqlx::query(
        r"
        SELECT id FROM app.role
        WHERE is_system OR name = $1
        ORDER BY id
        FOR NO KEY UPDATE
        ",
    )
    .bind(ADMINISTRATOR)
    .fetch_all(&mut *conn)
    .await?;

    let count: i64 = sqlx::query_scalar(
        r"
        SELECT count(*) FROM app.app_user u
        WHERE u.is_active
          AND EXISTS (
              SELECT 1 FROM app.user_role ur
              JOIN app.role r ON r.id = ur.role_id
              WHERE ur.user_id = u.id AND (r.is_system OR r.name = $1)
          )
        ",
    )
    .bind(ADMINISTRATOR)
    .fetch_one(conn)
    .await?;

    usize::try_from(count)
        .map_err(|_| RepositoryError::DataCorruption(format!("negative admin count: {count}")))
}

/// Lock and read one account.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_account(conn: &mut PgConnection, id: UserId) -> Result<Option<Account>, RepositoryError> {
    let row = sqlx::query_as::<_, AccountRow>(&format!(
        "SELECT {ACCOUNT_COLUMNS} FROM app.app_user u WHERE u.id = $1 FOR UPDATE OF u"
    ))
    .bind(id.as_i32())
    .fetch_optional(conn)
    .await?;

    row.map(TryInto::try_into).transpose()
}

/// Whether any of `roles` is the Administrator role.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn includes_administrator(
    conn: &mut PgConnection,
    roles: &[RoleId],
) -> Result<bool, RepositoryError> {
    let ids: Vec<i32> = roles.iter().map(RoleId::as_i32).collect();
    let found: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM app.role WHERE id = ANY($1) AND (is_system OR name = $2))",
    )
    .bind(&ids)
    .bind(ADMINISTRATOR)
    .fetch_one(conn)
    .await?;

    Ok(found)
}

/// Apply a patch to a locked account.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the account doesn't exist,
/// `RepositoryError::Conflict` if the new email is taken or a role is unknown.
pub async fn apply_patch(
    conn: &mut PgConnection,
    id: UserId,
    patch: &AccountPatch,
) -> Result<(), RepositoryError> {
    let result = sqlx::query(
        r"
        UPDATE app.app_user
        SET email = COALESCE($2, email),
            password_hash = COALESCE($3, password_hash),
            is_active = COALESCE($4, is_active),
            updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(id.as_i32())
    .bind(patch.email.as_ref().map(Email::as_str))
    .bind(patch.password_hash.as_deref())
    .bind(patch.is_active)
    .execute(&mut *conn)
    .await
    .map_err(conflict_on_unique("email already exists"))?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    if let Some(roles) = &patch.roles {
        replace_roles(conn, id, roles).await?;
    }
    if let Some(restaurants) = &patch.restaurants {
        replace_restaurants(conn, id, restaurants).await?;
    }
    Ok(())
}

/// Delete an account.
///
/// # Errors
///
/// Returns `RepositoryError::NotFound` if the account doesn't exist.
pub async fn delete(conn: &mut PgConnection, id: UserId) -> Result<(), RepositoryError> {
    let result = sqlx::query("DELETE FROM app.app_user WHERE id = $1")
        .bind(id.as_i32())
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(RepositoryError::NotFound);
    }
    Ok(())
}

async fn replace_roles(conn: &mut PgConnection, user: UserId, roles: &[RoleId]) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM app.user_role WHERE user_id = $1")
        .bind(user.as_i32())
        .execute(&mut *conn)
        .await?;

    let ids: Vec<i32> = roles.iter().map(RoleId::as_i32).collect();
    sqlx::query(
        r"
        INSERT INTO app.user_role (user_id, role_id)
        SELECT $1, UNNEST($2::int4[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(user.as_i32())
    .bind(&ids)
    .execute(&mut *conn)
    .await
    .map_err(|e| {
        if let sqlx::Error::Database(ref db_err) = e
            && db_err.is_foreign_key_violation()
        {
            return RepositoryError::Conflict("unknown role".to_owned());
        }
        RepositoryError::Database(e)
    })?;

    Ok(())
}

async fn replace_restaurants(
    conn: &mut PgConnection,
    user: UserId,
    restaurants: &[RestaurantId],
) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM app.user_restaurant WHERE user_id = $1")
        .bind(user.as_i32())
        .execute(&mut *conn)
        .await?;

    let ids: Vec<i32> = restaurants.iter().map(RestaurantId::as_i32).collect();
    sqlx::query(
        r"
        INSERT INTO app.user_restaurant (user_id, restaurant_id)
        SELECT $1, UNNEST($2::int4[])
        ON CONFLICT DO NOTHING
        ",
    )
    .bind(user.as_i32())
    .bind(&ids)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
