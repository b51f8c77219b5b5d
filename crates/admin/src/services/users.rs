//! User account management.
//!
//! Writes that can change who holds Administrator run in one transaction:
//! the Administrator role row is locked, its active holders are counted, the
//! guard is checked against that count, and the write is applied or the
//! transaction rolled back.

use sqlx::PgPool;

use tablewise_core::access::{AccountState, UserWrite, check_user_write};
use tablewise_core::{
    AccessError, Action, Collection, Decision, Email, Principal, RecordId, RecordRef, RestaurantId,
    RoleId, UserId, evaluate,
};

use super::access::AccessService;
use super::auth::{hash_password, validate_password};
use crate::db::RepositoryError;
use crate::db::users::{
    self, Account, AccountPatch, NewAccount, UserRepository, includes_administrator,
    lock_account, lock_admin_count,
};
use crate::error::AppError;

const COLLECTION: Collection = Collection::Users;

const fn record_id(id: UserId) -> RecordId {
    RecordId::new(id.as_i32())
}

fn access_ref(account: &Account) -> RecordRef {
    RecordRef::owned_by(account.id)
}

/// Fields accepted when creating a staff account.
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    pub roles: Vec<RoleId>,
    pub restaurants: Vec<RestaurantId>,
}

/// Fields accepted when updating an account. `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password: Option<String>,
    pub roles: Option<Vec<RoleId>>,
    pub restaurants: Option<Vec<RestaurantId>>,
    pub is_active: Option<bool>,
}

impl UpdateUser {
    fn into_patch(self) -> Result<AccountPatch, AppError> {
        let email = self
            .email
            .as_deref()
            .map(Email::parse)
            .transpose()
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        let password_hash = match self.password.as_deref() {
            Some(password) => {
                validate_password(password)?;
                Some(hash_password(password)?)
            }
            None => None,
        };

        Ok(AccountPatch {
            email,
            password_hash,
            roles: self.roles,
            restaurants: self.restaurants,
            is_active: self.is_active,
        })
    }
}

/// User account service.
pub struct UserService<'a> {
    pool: &'a PgPool,
    access: AccessService<'a>,
    users: UserRepository<'a>,
}

impl<'a> UserService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            access: AccessService::new(pool),
            users: UserRepository::new(pool),
        }
    }

    /// List the accounts the principal may see: all of them with a users
    /// permission, otherwise only its own.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if the principal may not list users.
    pub async fn list(&self, principal: &Principal) -> Result<Vec<Account>, AppError> {
        let filter = self.access.list_filter(principal, COLLECTION).await?;
        if filter.as_ref().is_some_and(|f| f.matches_nothing()) {
            return Ok(Vec::new());
        }
        Ok(self.users.list(filter.as_ref()).await?)
    }

    /// Get one account.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused, `NotFound` if it doesn't exist.
    pub async fn get(&self, principal: &Principal, id: UserId) -> Result<Account, AppError> {
        self.access
            .authorize_stored(
                principal,
                Action::Read,
                COLLECTION,
                record_id(id),
                self.users.get(id),
                access_ref,
            )
            .await
    }

    /// Create a staff account.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` if refused or if a non-admin grants
    /// Administrator, `Conflict` if the email is taken.
    pub async fn create(&self, principal: &Principal, input: CreateUser) -> Result<Account, AppError> {
        self.access
            .require(principal, Action::Create, COLLECTION, &RecordRef::default(), None)
            .await?;

        let email = Email::parse(&input.email).map_err(|e| AppError::BadRequest(e.to_string()))?;
        validate_password(&input.password)?;

        let mut conn = self.pool.acquire().await.map_err(RepositoryError::from)?;
        let administrator = includes_administrator(&mut conn, &input.roles).await?;
        drop(conn);

        let write = UserWrite::create(AccountState::new(administrator, true));
        self.guard(principal, Action::Create, None, write, 0).await?;

        let account = self
            .users
            .create(&NewAccount {
                email,
                password_hash: hash_password(&input.password)?,
                roles: input.roles,
                restaurants: input.restaurants,
            })
            .await?;

        tracing::info!(user_id = %account.id, administrator, "User created");
        Ok(account)
    }

    /// Update an account.
    ///
    /// Principals acting only as the account's owner may change its email
    /// and password, nothing else.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` for refusals and guard rejections.
    pub async fn update(&self, principal: &Principal, id: UserId, input: UpdateUser) -> Result<Account, AppError> {
        let owner_only = !matches!(
            evaluate(principal, Action::Update, COLLECTION, None).decision,
            Decision::Allow
        );
        self.access
            .authorize_stored(
                principal,
                Action::Update,
                COLLECTION,
                record_id(id),
                self.users.get(id),
                access_ref,
            )
            .await?;

        let patch = input.into_patch()?;
        if owner_only && patch.changes_capabilities() {
            return Err(self
                .access
                .reject(principal, Action::Update, COLLECTION, Some(record_id(id)), AccessError::Denied)
                .await
                .into());
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let admins = lock_admin_count(&mut tx).await?;
        let before = lock_account(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;

        let before_state = AccountState::new(
            includes_administrator(&mut tx, &before.roles).await?,
            before.is_active,
        );
        let after_administrator = match &patch.roles {
            Some(roles) => includes_administrator(&mut tx, roles).await?,
            None => before_state.administrator,
        };
        let after_state = AccountState::new(
            after_administrator,
            patch.is_active.unwrap_or(before.is_active),
        );

        let mut write = UserWrite::update(before_state, after_state);
        if patch.changes_credentials() {
            write = write.with_credentials();
        }

        // The transaction rolls back on drop if the guard rejects.
        self.guard(principal, Action::Update, Some(record_id(id)), write, admins)
            .await?;

        users::apply_patch(&mut tx, id, &patch).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(
            user_id = %id,
            administrator = after_state.administrator,
            active = after_state.active,
            "User updated"
        );
        Ok(self.users.get(id).await?.ok_or(RepositoryError::NotFound)?)
    }

    /// Delete an account.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Access` for refusals and guard rejections.
    pub async fn delete(&self, principal: &Principal, id: UserId) -> Result<(), AppError> {
        self.access
            .authorize_stored(
                principal,
                Action::Delete,
                COLLECTION,
                record_id(id),
                self.users.get(id),
                access_ref,
            )
            .await?;

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from)?;
        let admins = lock_admin_count(&mut tx).await?;
        let before = lock_account(&mut tx, id).await?.ok_or(RepositoryError::NotFound)?;
        let before_state = AccountState::new(
            includes_administrator(&mut tx, &before.roles).await?,
            before.is_active,
        );

        self.guard(
            principal,
            Action::Delete,
            Some(record_id(id)),
            UserWrite::delete(before_state),
            admins,
        )
        .await?;

        users::delete(&mut tx, id).await?;
        tx.commit().await.map_err(RepositoryError::from)?;

        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    async fn guard(
        &self,
        principal: &Principal,
        action: Action,
        record: Option<RecordId>,
        write: UserWrite,
        active_admins: usize,
    ) -> Result<(), AccessError> {
        match check_user_write(principal, write, active_admins) {
            Ok(()) => Ok(()),
            Err(error) => Err(self
                .access
                .reject(principal, action, COLLECTION, record, error)
                .await),
        }
    }
}
