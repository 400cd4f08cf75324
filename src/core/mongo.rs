use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::{ClientOptions, Credential, IndexOptions};
use mongodb::{Client, Database, IndexModel};
use slog::Logger;

use crate::config::MongoConfig;
use crate::error::{classify, code, settle, Resource};
use crate::prelude::*;

/// Deployment backed by a live MongoDB server
pub struct MongoDeployment {
    /// Replaced once the run has to continue as the new principal
    client: RwLock<Client>,
    options: ClientOptions,
    logger: Logger,
}

pub struct MongoDatabase {
    db: Database,
    logger: Logger,
}

impl MongoDeployment {
    /// Builds a client from the connection settings. The driver connects
    /// lazily, so an unreachable server only shows up on the first
    /// command (see [`Deployment::ping`]).
    pub async fn connect(config: &MongoConfig, logger: Logger) -> BResult<Self> {
        let mut options = ClientOptions::parse(config.connection_uri())
            .await
            .map_err(|why| {
                BootstrapError::configuration(format!("invalid MongoDB connection string: {why}"))
            })?;
        options.app_name = Some(config.app_name.clone());
        if let Some(timeout) = config.server_selection_timeout() {
            options.server_selection_timeout = Some(timeout);
        }
        let client = Client::with_options(options.clone())?;
        Ok(Self {
            client: RwLock::new(client),
            options,
            logger,
        })
    }

    fn client(&self) -> Client {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reconnects with the principal's own credentials and makes that
    /// client the one every later step uses
    async fn authenticate_as(&self, principal: &AdminPrincipal) -> BResult {
        let mut options = self.options.clone();
        options.credential = Some(
            Credential::builder()
                .username(principal.name().to_string())
                .password(principal.secret().expose_secret().to_string())
                .source(principal.database().to_string())
                .build(),
        );
        let client = Client::with_options(options)?;
        client
            .database(principal.database())
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|why| {
                BootstrapError::Connectivity(format!(
                    "cannot authenticate as '{}': {}",
                    principal.name(),
                    BootstrapError::from(why)
                ))
            })?;

        *self.client.write().unwrap_or_else(PoisonError::into_inner) = client;
        info!(self.logger, "Continuing as the administrative principal";
            "principal" => principal.name());
        Ok(())
    }
}

/// Next move of the principal step once `createUser` has answered
#[derive(Debug, PartialEq, Eq)]
enum AfterCreateUser {
    /// Created. When the lookup had been refused the user went in through
    /// the localhost exception, which is now closed, so the run has to
    /// continue under the new principal.
    Created { reauthenticate: bool },
    AlreadyPresent,
    /// Lookup and creation were both refused: users exist and the client
    /// is unauthenticated. Log in as the principal to inspect it.
    AuthenticateAndInspect,
}

fn after_create_user(lookup_refused: bool, result: BResult) -> BResult<AfterCreateUser> {
    match result {
        Ok(()) => Ok(AfterCreateUser::Created {
            reauthenticate: lookup_refused,
        }),
        Err(why) if why.is_already_exists() => Ok(AfterCreateUser::AlreadyPresent),
        Err(why) if lookup_refused && why.is_unauthorized() => {
            Ok(AfterCreateUser::AuthenticateAndInspect)
        }
        Err(why) => Err(why),
    }
}

/// A missing collection has no indexes yet
fn indexes_or_empty(listed: BResult<Vec<IndexModel>>) -> BResult<Vec<IndexModel>> {
    match listed {
        Err(BootstrapError::Engine {
            code: Some(code::NAMESPACE_NOT_FOUND),
            ..
        }) => Ok(Vec::new()),
        other => other,
    }
}

/// Looks for an index on exactly `{ field: 1 }`. `None` means it still
/// has to be created; a non-unique one is a conflict.
fn inspect_indexes(
    indexes: &[IndexModel],
    collection: &str,
    field: &str,
) -> BResult<Option<Provision>> {
    let existing = match indexes.iter().find(|i| is_ascending_on(&i.keys, field)) {
        Some(existing) => existing,
        None => return Ok(None),
    };
    let unique = existing
        .options
        .as_ref()
        .and_then(|o| o.unique)
        .unwrap_or(false);
    if unique {
        Ok(Some(Provision::AlreadyPresent))
    } else {
        Err(BootstrapError::IndexConflict(format!(
            "{collection}.{field} is indexed without a uniqueness constraint"
        )))
    }
}

fn malformed_reply(command: &str, why: impl std::fmt::Display) -> BootstrapError {
    BootstrapError::Engine {
        code: None,
        message: format!("malformed {command} reply: {why}"),
    }
}

fn parse_roles(user: &Document) -> BResult<Vec<RoleGrant>> {
    let roles = user
        .get_array("roles")
        .map_err(|why| malformed_reply("usersInfo", why))?;
    roles
        .iter()
        .map(|entry| {
            let entry = entry
                .as_document()
                .ok_or_else(|| malformed_reply("usersInfo", "role entry is not a document"))?;
            let role = entry
                .get_str("role")
                .map_err(|why| malformed_reply("usersInfo", why))?;
            let db = entry
                .get_str("db")
                .map_err(|why| malformed_reply("usersInfo", why))?;
            Ok(RoleGrant::new(Role::from(role), db))
        })
        .collect()
}

/// Whether `keys` is exactly `{ field: 1 }`. Shell-created indexes carry
/// the direction as a double.
fn is_ascending_on(keys: &Document, field: &str) -> bool {
    if keys.len() != 1 {
        return false;
    }
    match keys.get(field) {
        Some(Bson::Int32(1)) | Some(Bson::Int64(1)) => true,
        Some(Bson::Double(d)) => *d == 1.0,
        _ => false,
    }
}

#[async_trait]
impl Deployment for MongoDeployment {
    type Database = MongoDatabase;

    async fn ping(&self) -> BResult {
        self.client()
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        debug!(self.logger, "Database server answered ping");
        Ok(())
    }

    async fn create_admin_principal(&self, principal: &AdminPrincipal) -> BResult<PrincipalState> {
        let admin_db = principal.database();

        let lookup_refused = match self.principal_roles(admin_db, principal.name()).await {
            Ok(Some(roles)) => {
                return Ok(PrincipalState::Existing { roles: Some(roles) })
            }
            Ok(None) => false,
            Err(why) if why.is_unauthorized() => {
                debug!(self.logger, "Principal lookup not authorized, creating directly";
                    "principal" => principal.name());
                true
            }
            Err(why) => return Err(why),
        };

        let roles: Vec<Document> = principal
            .roles()
            .iter()
            .map(|grant| doc! { "role": grant.role.as_str(), "db": grant.db.as_str() })
            .collect();
        let command = doc! {
            "createUser": principal.name(),
            "pwd": principal.secret().expose_secret(),
            "roles": roles,
        };
        let created = self
            .client()
            .database(admin_db)
            .run_command(command)
            .await
            .map(|_| ())
            .map_err(|err| classify(err, Resource::Principal, principal.name()));

        match after_create_user(lookup_refused, created)? {
            AfterCreateUser::Created { reauthenticate } => {
                if reauthenticate {
                    self.authenticate_as(principal).await?;
                }
                Ok(PrincipalState::Created)
            }
            AfterCreateUser::AlreadyPresent => Ok(PrincipalState::Existing { roles: None }),
            AfterCreateUser::AuthenticateAndInspect => {
                self.authenticate_as(principal).await?;
                let roles = self.principal_roles(admin_db, principal.name()).await?;
                Ok(PrincipalState::Existing { roles })
            }
        }
    }

    async fn principal_roles(
        &self,
        admin_db: &str,
        name: &str,
    ) -> BResult<Option<Vec<RoleGrant>>> {
        let reply = self
            .client()
            .database(admin_db)
            .run_command(doc! { "usersInfo": { "user": name, "db": admin_db } })
            .await?;
        let users = reply
            .get_array("users")
            .map_err(|why| malformed_reply("usersInfo", why))?;
        match users.first() {
            None => Ok(None),
            Some(user) => {
                let user = user
                    .as_document()
                    .ok_or_else(|| malformed_reply("usersInfo", "user entry is not a document"))?;
                Ok(Some(parse_roles(user)?))
            }
        }
    }

    fn select_database(&self, name: &str) -> MongoDatabase {
        MongoDatabase {
            db: self.client().database(name),
            logger: self.logger.new(o!("database" => name.to_string())),
        }
    }
}

#[async_trait]
impl LogicalDatabase for MongoDatabase {
    fn name(&self) -> &str {
        self.db.name()
    }

    async fn ensure_collection(&self, name: &str) -> BResult<Provision> {
        let existing = self
            .db
            .list_collection_names()
            .filter(doc! { "name": name })
            .await?;
        if existing.iter().any(|n| n == name) {
            return Ok(Provision::AlreadyPresent);
        }

        let created = self
            .db
            .create_collection(name)
            .await
            .map_err(|err| classify(err, Resource::Collection, name));
        let outcome = settle(created)?;
        if outcome == Provision::AlreadyPresent {
            debug!(self.logger, "Collection appeared concurrently"; "collection" => name);
        }
        Ok(outcome)
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> BResult<Provision> {
        let coll = self.db.collection::<Document>(collection);
        let name = index_name(field);

        let listed = match coll.list_indexes().await {
            Ok(cursor) => cursor
                .try_collect::<Vec<IndexModel>>()
                .await
                .map_err(BootstrapError::from),
            Err(err) => Err(err.into()),
        };
        let indexes = indexes_or_empty(listed)?;
        if let Some(outcome) = inspect_indexes(&indexes, collection, field)? {
            return Ok(outcome);
        }

        let mut keys = Document::new();
        keys.insert(field, 1);
        let model = IndexModel::builder()
            .keys(keys)
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name(name.clone())
                    .build(),
            )
            .build();
        let created = coll
            .create_index(model)
            .await
            .map(|_| ())
            .map_err(|err| classify(err, Resource::Index, &name));
        settle(created)
    }
}
