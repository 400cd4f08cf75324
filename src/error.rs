use std::fmt;

use mongodb::error::{ErrorKind, WriteFailure};
use thiserror::Error;

use crate::prelude::{BResult, Provision};

/// Server error codes the bootstrap cares about
pub mod code {
    pub const UNAUTHORIZED: i32 = 13;
    pub const NAMESPACE_NOT_FOUND: i32 = 26;
    pub const NAMESPACE_EXISTS: i32 = 48;
    pub const INDEX_OPTIONS_CONFLICT: i32 = 85;
    pub const INDEX_KEY_SPECS_CONFLICT: i32 = 86;
    pub const DUPLICATE_KEY: i32 = 11000;
    pub const USER_ALREADY_EXISTS: i32 = 51003;
}

/// Every failure a bootstrap run can end with. All of them are fatal
/// except `AlreadyExists`, which the deployment layer folds into
/// `Provision::AlreadyPresent` before it reaches the initializer.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("unique constraint cannot be established: {0}")]
    ConstraintViolation(String),

    #[error("database server unreachable: {0}")]
    Connectivity(String),

    #[error("conflicting index: {0}")]
    IndexConflict(String),

    #[error("database engine error{}: {message}", code_suffix(.code))]
    Engine { code: Option<i32>, message: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl BootstrapError {
    pub fn configuration(message: impl Into<String>) -> Self {
        BootstrapError::Configuration(message.into())
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, BootstrapError::AlreadyExists(_))
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            BootstrapError::Engine {
                code: Some(code::UNAUTHORIZED),
                ..
            }
        )
    }
}

/// Folds the result of a creation command into a provisioning outcome:
/// "already exists" is success, every other error stays fatal
pub fn settle(result: BResult) -> BResult<Provision> {
    match result {
        Ok(()) => Ok(Provision::Created),
        Err(why) if why.is_already_exists() => Ok(Provision::AlreadyPresent),
        Err(why) => Err(why),
    }
}

/// Kind of object a creation command was issued for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Principal,
    Collection,
    Index,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Principal => write!(f, "principal"),
            Resource::Collection => write!(f, "collection"),
            Resource::Index => write!(f, "index"),
        }
    }
}

/// Maps a server error code raised while creating `resource` named
/// `name` onto the bootstrap taxonomy.
///
/// A duplicate key means "already there" for principals, but for an
/// index build it means the stored documents break uniqueness.
pub fn classify_code(code: i32, resource: Resource, name: &str, message: String) -> BootstrapError {
    match (code, resource) {
        (code::DUPLICATE_KEY, Resource::Index) => BootstrapError::ConstraintViolation(message),
        (code::NAMESPACE_EXISTS | code::USER_ALREADY_EXISTS | code::DUPLICATE_KEY, _) => {
            BootstrapError::AlreadyExists(format!("{resource} '{name}'"))
        }
        (code::INDEX_OPTIONS_CONFLICT | code::INDEX_KEY_SPECS_CONFLICT, _) => {
            BootstrapError::IndexConflict(message)
        }
        _ => BootstrapError::Engine {
            code: Some(code),
            message,
        },
    }
}

/// Classifies a driver error raised while creating `resource`
pub fn classify(err: mongodb::error::Error, resource: Resource, name: &str) -> BootstrapError {
    match err.kind.as_ref() {
        ErrorKind::Command(cmd) => classify_code(cmd.code, resource, name, cmd.message.clone()),
        ErrorKind::Write(WriteFailure::WriteError(we)) => {
            classify_code(we.code, resource, name, we.message.clone())
        }
        _ => err.into(),
    }
}

fn code_suffix(code: &Option<i32>) -> String {
    code.map(|c| format!(" (code {c})")).unwrap_or_default()
}

impl From<mongodb::error::Error> for BootstrapError {
    fn from(err: mongodb::error::Error) -> Self {
        match err.kind.as_ref() {
            ErrorKind::ServerSelection { message, .. }
            | ErrorKind::ConnectionPoolCleared { message, .. }
            | ErrorKind::DnsResolve { message, .. }
            | ErrorKind::Authentication { message, .. } => {
                BootstrapError::Connectivity(message.clone())
            }
            ErrorKind::Io(io) => BootstrapError::Connectivity(io.to_string()),
            ErrorKind::Command(cmd) => BootstrapError::Engine {
                code: Some(cmd.code),
                message: cmd.message.clone(),
            },
            _ => BootstrapError::Engine {
                code: None,
                message: err.to_string(),
            },
        }
    }
}

impl From<toml::de::Error> for BootstrapError {
    fn from(err: toml::de::Error) -> Self {
        BootstrapError::Configuration(format!("malformed config file: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_exists_is_not_fatal() {
        let err = classify_code(
            code::NAMESPACE_EXISTS,
            Resource::Collection,
            "locations",
            "Collection already exists".into(),
        );
        assert!(err.is_already_exists());
        assert_eq!(err.to_string(), "collection 'locations' already exists");
    }

    #[test]
    fn duplicate_user_is_not_fatal() {
        for c in [code::USER_ALREADY_EXISTS, code::DUPLICATE_KEY] {
            let err = classify_code(c, Resource::Principal, "root", "User already exists".into());
            assert!(err.is_already_exists(), "code {c}");
        }
    }

    #[test]
    fn duplicate_key_during_index_build_is_a_violation() {
        let msg = "E11000 duplicate key error collection: f1_discord_app.locations";
        let err = classify_code(code::DUPLICATE_KEY, Resource::Index, "meeting_key_1", msg.into());
        match err {
            BootstrapError::ConstraintViolation(m) => assert_eq!(m, msg),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn index_spec_conflicts_are_fatal() {
        for c in [code::INDEX_OPTIONS_CONFLICT, code::INDEX_KEY_SPECS_CONFLICT] {
            let err = classify_code(c, Resource::Index, "meeting_key_1", "conflict".into());
            assert!(matches!(err, BootstrapError::IndexConflict(_)), "code {c}");
        }
    }

    #[test]
    fn collection_created_by_a_concurrent_run_settles_as_present() {
        let raced = classify_code(
            code::NAMESPACE_EXISTS,
            Resource::Collection,
            "locations",
            "Collection f1_discord_app.locations already exists.".into(),
        );
        assert_eq!(settle(Err(raced)).unwrap(), Provision::AlreadyPresent);
        assert_eq!(settle(Ok(())).unwrap(), Provision::Created);
    }

    #[test]
    fn duplicate_data_does_not_settle() {
        let violated = classify_code(
            code::DUPLICATE_KEY,
            Resource::Index,
            "meeting_key_1",
            "E11000 duplicate key error".into(),
        );
        assert!(matches!(
            settle(Err(violated)),
            Err(BootstrapError::ConstraintViolation(_))
        ));
    }

    #[test]
    fn unauthorized_is_recognised_only_for_code_13() {
        let refused = classify_code(code::UNAUTHORIZED, Resource::Principal, "root", "denied".into());
        assert!(refused.is_unauthorized());
        assert!(!BootstrapError::Connectivity("down".into()).is_unauthorized());
    }

    #[test]
    fn unknown_codes_keep_their_code() {
        let err = classify_code(13, Resource::Principal, "root", "not authorized".into());
        assert_eq!(
            err.to_string(),
            "database engine error (code 13): not authorized"
        );
    }
}
