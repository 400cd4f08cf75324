use async_trait::async_trait;

use crate::prelude::*;

/// A database server the bootstrap can provision.
///
/// Implementations report "already exists" as
/// `Provision::AlreadyPresent`; every `Err` they return is fatal.
#[async_trait]
pub trait Deployment: Send + Sync {
    type Database: LogicalDatabase;

    /// Fails fast when the server cannot be reached
    async fn ping(&self) -> BResult;

    /// Creates `principal` unless it exists. After this returns the
    /// deployment must be able to run the remaining steps, which may
    /// mean switching to the principal's own credentials.
    async fn create_admin_principal(&self, principal: &AdminPrincipal) -> BResult<PrincipalState>;

    /// Roles currently granted to `name` in `admin_db`, `None` when no
    /// such principal exists
    async fn principal_roles(&self, admin_db: &str, name: &str)
        -> BResult<Option<Vec<RoleGrant>>>;

    /// Addresses a logical database. No server round trip happens until
    /// something is written to it.
    fn select_database(&self, name: &str) -> Self::Database;
}

/// A named database within a deployment
#[async_trait]
pub trait LogicalDatabase: Send + Sync {
    fn name(&self) -> &str;

    async fn ensure_collection(&self, name: &str) -> BResult<Provision>;

    /// Ensures an ascending unique index on `field` of `collection`
    async fn ensure_unique_index(&self, collection: &str, field: &str) -> BResult<Provision>;
}
