use std::fmt;

use crate::credentials::{Credentials, Secret};
use crate::prelude::*;

/// Built-in server roles granted to the administrative principal
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    UserAdminAnyDatabase,
    ReadWriteAnyDatabase,
    DbAdminAnyDatabase,
    Other(String),
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::UserAdminAnyDatabase => "userAdminAnyDatabase",
            Role::ReadWriteAnyDatabase => "readWriteAnyDatabase",
            Role::DbAdminAnyDatabase => "dbAdminAnyDatabase",
            Role::Other(name) => name,
        }
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        match name {
            "userAdminAnyDatabase" => Role::UserAdminAnyDatabase,
            "readWriteAnyDatabase" => Role::ReadWriteAnyDatabase,
            "dbAdminAnyDatabase" => Role::DbAdminAnyDatabase,
            other => Role::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role scoped to the database it is defined on
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleGrant {
    pub role: Role,
    pub db: String,
}

impl RoleGrant {
    pub fn new(role: Role, db: impl Into<String>) -> Self {
        Self {
            role,
            db: db.into(),
        }
    }
}

impl fmt::Display for RoleGrant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.role, self.db)
    }
}

/// Administrative user created once per database instance
#[derive(Debug)]
pub struct AdminPrincipal {
    name: String,
    /// Database the principal authenticates against
    database: String,
    secret: Secret,
    roles: Vec<RoleGrant>,
}

impl AdminPrincipal {
    /// Fails with a configuration error when the name or the secret is
    /// empty
    pub fn new(
        name: impl Into<String>,
        database: impl Into<String>,
        secret: Secret,
        roles: Vec<RoleGrant>,
    ) -> BResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(BootstrapError::configuration(
                "administrative principal name is empty",
            ));
        }
        if secret.is_empty() {
            return Err(BootstrapError::configuration(
                "administrative principal secret is empty",
            ));
        }
        Ok(Self {
            name,
            database: database.into(),
            secret,
            roles,
        })
    }

    /// The root principal: user administration, read-write and database
    /// administration on every database, all granted on `admin_db`
    pub fn root(credentials: Credentials, admin_db: &str) -> BResult<Self> {
        Self::new(
            credentials.username,
            admin_db,
            credentials.password,
            root_roles(admin_db),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn secret(&self) -> &Secret {
        &self.secret
    }

    pub fn roles(&self) -> &[RoleGrant] {
        &self.roles
    }
}

pub fn root_roles(admin_db: &str) -> Vec<RoleGrant> {
    vec![
        RoleGrant::new(Role::UserAdminAnyDatabase, admin_db),
        RoleGrant::new(Role::ReadWriteAnyDatabase, admin_db),
        RoleGrant::new(Role::DbAdminAnyDatabase, admin_db),
    ]
}

/// Outcome of a single create-if-missing step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provision {
    Created,
    AlreadyPresent,
}

impl fmt::Display for Provision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provision::Created => write!(f, "created"),
            Provision::AlreadyPresent => write!(f, "already present"),
        }
    }
}

/// Outcome of the principal step. An existing principal carries the
/// roles it was found with, when the lookup could see them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrincipalState {
    Created,
    Existing { roles: Option<Vec<RoleGrant>> },
}

impl PrincipalState {
    pub fn provision(&self) -> Provision {
        match self {
            PrincipalState::Created => Provision::Created,
            PrincipalState::Existing { .. } => Provision::AlreadyPresent,
        }
    }
}

/// Names of everything the bootstrap creates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    pub admin_database: String,
    pub database: String,
    pub collection: String,
    pub unique_field: String,
}

impl Default for BootstrapPlan {
    fn default() -> Self {
        Self {
            admin_database: "admin".into(),
            database: "f1_discord_app".into(),
            collection: "locations".into(),
            unique_field: "meeting_key".into(),
        }
    }
}

/// Name the server gives a single-field ascending index
pub fn index_name(field: &str) -> String {
    format!("{field}_1")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub principal: Provision,
    pub collection: Provision,
    pub index: Provision,
}

impl BootstrapReport {
    /// True when the run changed nothing
    pub fn is_noop(&self) -> bool {
        [self.principal, self.collection, self.index]
            .iter()
            .all(|p| *p == Provision::AlreadyPresent)
    }
}
