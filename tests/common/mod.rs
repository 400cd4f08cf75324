#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use f1_discord_bootstrap::credentials::Secret;
use f1_discord_bootstrap::error::settle;
use f1_discord_bootstrap::prelude::*;
use slog::{o, Logger};

pub fn test_logger() -> Logger {
    Logger::root(slog::Discard, o!())
}

pub fn root_principal(name: &str, secret: &str) -> AdminPrincipal {
    AdminPrincipal::new(name, "admin", Secret::new(secret), root_roles("admin")).unwrap()
}

#[derive(Default, Debug)]
pub struct Collection {
    /// Values of every field per stored document
    pub documents: Vec<BTreeMap<String, String>>,
    pub unique_fields: BTreeSet<String>,
    pub plain_fields: BTreeSet<String>,
}

#[derive(Default, Debug)]
pub struct State {
    pub reachable: bool,
    pub users: BTreeMap<(String, String), Vec<RoleGrant>>,
    pub databases: BTreeMap<String, BTreeMap<String, Collection>>,
    pub create_user_calls: usize,
    pub role_lookups: usize,
}

/// In-process stand-in for a database server. Every step checks, yields
/// to the runtime, then creates, so concurrent runs interleave between the
/// two the way they can against a real server.
#[derive(Clone)]
pub struct MemoryDeployment {
    pub state: Arc<Mutex<State>>,
}

pub struct MemoryDatabase {
    name: String,
    state: Arc<Mutex<State>>,
}

impl MemoryDeployment {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                reachable: true,
                ..Default::default()
            })),
        }
    }

    pub fn unreachable() -> Self {
        let deployment = Self::new();
        deployment.state.lock().unwrap().reachable = false;
        deployment
    }

    pub fn seed_user(&self, db: &str, name: &str, roles: Vec<RoleGrant>) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert((db.to_string(), name.to_string()), roles);
    }

    pub fn seed_documents(&self, db: &str, collection: &str, field: &str, values: &[&str]) {
        let mut state = self.state.lock().unwrap();
        let coll = state
            .databases
            .entry(db.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default();
        for value in values {
            let mut document = BTreeMap::new();
            document.insert(field.to_string(), value.to_string());
            coll.documents.push(document);
        }
    }

    pub fn seed_plain_index(&self, db: &str, collection: &str, field: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .databases
            .entry(db.to_string())
            .or_default()
            .entry(collection.to_string())
            .or_default()
            .plain_fields
            .insert(field.to_string());
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().unwrap().users.len()
    }

    pub fn collection_names(&self, db: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .databases
            .get(db)
            .map(|colls| colls.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn unique_fields(&self, db: &str, collection: &str) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .databases
            .get(db)
            .and_then(|colls| colls.get(collection))
            .map(|c| c.unique_fields.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn has_database(&self, db: &str) -> bool {
        self.state.lock().unwrap().databases.contains_key(db)
    }
}

fn ensure_reachable(state: &State) -> BResult {
    if state.reachable {
        Ok(())
    } else {
        Err(BootstrapError::Connectivity(
            "No servers available for operation".into(),
        ))
    }
}

#[async_trait]
impl Deployment for MemoryDeployment {
    type Database = MemoryDatabase;

    async fn ping(&self) -> BResult {
        ensure_reachable(&self.state.lock().unwrap())
    }

    async fn create_admin_principal(&self, principal: &AdminPrincipal) -> BResult<PrincipalState> {
        let key = (principal.database().to_string(), principal.name().to_string());
        let existing = {
            let state = self.state.lock().unwrap();
            ensure_reachable(&state)?;
            state.users.get(&key).cloned()
        };
        if let Some(roles) = existing {
            return Ok(PrincipalState::Existing { roles: Some(roles) });
        }

        tokio::task::yield_now().await;

        let created = {
            let mut state = self.state.lock().unwrap();
            state.create_user_calls += 1;
            if state.users.contains_key(&key) {
                Err(BootstrapError::AlreadyExists(format!(
                    "principal '{}': User \"{}@{}\" already exists",
                    key.1, key.1, key.0
                )))
            } else {
                state.users.insert(key, principal.roles().to_vec());
                Ok(())
            }
        };
        Ok(match settle(created)? {
            Provision::Created => PrincipalState::Created,
            Provision::AlreadyPresent => PrincipalState::Existing { roles: None },
        })
    }

    async fn principal_roles(
        &self,
        admin_db: &str,
        name: &str,
    ) -> BResult<Option<Vec<RoleGrant>>> {
        let mut state = self.state.lock().unwrap();
        ensure_reachable(&state)?;
        state.role_lookups += 1;
        Ok(state
            .users
            .get(&(admin_db.to_string(), name.to_string()))
            .cloned())
    }

    fn select_database(&self, name: &str) -> MemoryDatabase {
        MemoryDatabase {
            name: name.to_string(),
            state: self.state.clone(),
        }
    }
}

#[async_trait]
impl LogicalDatabase for MemoryDatabase {
    fn name(&self) -> &str {
        &self.name
    }

    async fn ensure_collection(&self, name: &str) -> BResult<Provision> {
        let present = {
            let state = self.state.lock().unwrap();
            ensure_reachable(&state)?;
            state
                .databases
                .get(&self.name)
                .map_or(false, |colls| colls.contains_key(name))
        };
        if present {
            return Ok(Provision::AlreadyPresent);
        }

        tokio::task::yield_now().await;

        let created = {
            let mut state = self.state.lock().unwrap();
            let colls = state.databases.entry(self.name.clone()).or_default();
            if colls.contains_key(name) {
                Err(BootstrapError::AlreadyExists(format!(
                    "collection '{name}': Collection {}.{name} already exists.",
                    self.name
                )))
            } else {
                colls.insert(name.to_string(), Collection::default());
                Ok(())
            }
        };
        settle(created)
    }

    async fn ensure_unique_index(&self, collection: &str, field: &str) -> BResult<Provision> {
        {
            let state = self.state.lock().unwrap();
            ensure_reachable(&state)?;
            let coll = state
                .databases
                .get(&self.name)
                .and_then(|colls| colls.get(collection));
            if let Some(coll) = coll {
                if coll.unique_fields.contains(field) {
                    return Ok(Provision::AlreadyPresent);
                }
                if coll.plain_fields.contains(field) {
                    return Err(BootstrapError::IndexConflict(format!(
                        "{collection}.{field} is indexed without a uniqueness constraint"
                    )));
                }
            }
        }

        tokio::task::yield_now().await;

        let created = {
            let mut state = self.state.lock().unwrap();
            let coll = state
                .databases
                .entry(self.name.clone())
                .or_default()
                .entry(collection.to_string())
                .or_default();
            let mut seen = BTreeSet::new();
            let duplicate = coll
                .documents
                .iter()
                .filter_map(|document| document.get(field))
                .find(|value| !seen.insert(value.as_str()))
                .cloned();
            match duplicate {
                Some(value) => Err(BootstrapError::ConstraintViolation(format!(
                    "E11000 duplicate key error collection: {}.{collection} index: {} dup key: {{ {field}: \"{value}\" }}",
                    self.name,
                    index_name(field)
                ))),
                None if coll.unique_fields.contains(field) => Err(BootstrapError::AlreadyExists(
                    format!("index '{}' already exists", index_name(field)),
                )),
                None => {
                    coll.unique_fields.insert(field.to_string());
                    Ok(())
                }
            }
        };
        settle(created)
    }
}
