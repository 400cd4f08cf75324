use slog::Logger;

use crate::config;
use crate::prelude::*;

/// Brings a database instance to its baseline state: the root
/// principal, the application database and its uniquely indexed
/// collection. Every step is create-if-missing, so running it again
/// against an initialized instance changes nothing.
pub struct Bootstrap<D>
where
    D: Deployment,
{
    logger: Logger,
    deployment: D,
    plan: BootstrapPlan,
}

/// Builder type for the construction of a bootstrap run
pub struct BootstrapBuilder<D>
where
    D: Deployment,
{
    logger: Option<Logger>,
    deployment: Option<D>,
    plan: Option<BootstrapPlan>,
}

impl<D> Default for BootstrapBuilder<D>
where
    D: Deployment,
{
    fn default() -> Self {
        BootstrapBuilder {
            logger: None,
            deployment: None,
            plan: None,
        }
    }
}

impl<D> BootstrapBuilder<D>
where
    D: Deployment,
{
    pub fn logger(self, logger: Logger) -> Self {
        Self {
            logger: Some(logger),
            ..self
        }
    }

    /// Set the database server to provision
    pub fn deployment(self, deployment: D) -> Self {
        Self {
            deployment: Some(deployment),
            ..self
        }
    }

    /// Override the default names (`f1_discord_app.locations`, unique on
    /// `meeting_key`)
    pub fn plan(self, plan: BootstrapPlan) -> Self {
        Self {
            plan: Some(plan),
            ..self
        }
    }

    /// Finalize the construction. Fails when no logger or no deployment
    /// was provided.
    pub fn build(self) -> BResult<Bootstrap<D>> {
        let logger = self
            .logger
            .ok_or_else(|| BootstrapError::configuration("no logger provided for the bootstrap"))?;
        let deployment = self.deployment.ok_or_else(|| {
            BootstrapError::configuration("no deployment provided for the bootstrap")
        })?;
        Ok(Bootstrap {
            logger,
            deployment,
            plan: self.plan.unwrap_or_default(),
        })
    }
}

impl<D> Bootstrap<D>
where
    D: Deployment,
{
    pub fn new() -> BootstrapBuilder<D> {
        Default::default()
    }

    pub fn plan(&self) -> &BootstrapPlan {
        &self.plan
    }

    pub fn deployment(&self) -> &D {
        &self.deployment
    }

    fn introduce_self(&self) {
        info!(self.logger, "Starting F1 Discord database bootstrap";
            "version" => config::PACKAGE_VERSION,
            "database" => &self.plan.database,
            "collection" => &self.plan.collection,
        );
    }

    /// Creates the administrative principal, or leaves an existing one
    /// untouched. An existing principal whose roles differ from the
    /// requested ones is reported, never modified.
    pub async fn create_admin_principal(&self, principal: &AdminPrincipal) -> BResult<Provision> {
        let state = self.deployment.create_admin_principal(principal).await?;
        match &state {
            PrincipalState::Created => {
                info!(self.logger, "Administrative principal created";
                    "principal" => principal.name(),
                    "roles" => format_roles(principal.roles()),
                );
            }
            PrincipalState::Existing { roles } => {
                info!(self.logger, "Administrative principal already exists";
                    "principal" => principal.name());
                match roles {
                    Some(roles) => self.check_role_drift(principal, roles),
                    None => {
                        debug!(self.logger, "Existing principal roles were not inspected";
                            "principal" => principal.name());
                    }
                }
            }
        }
        Ok(state.provision())
    }

    fn check_role_drift(&self, principal: &AdminPrincipal, current: &[RoleGrant]) {
        let mut actual = current.to_vec();
        let mut expected = principal.roles().to_vec();
        actual.sort_by_key(|g| g.to_string());
        expected.sort_by_key(|g| g.to_string());
        if actual != expected {
            warn!(self.logger, "Existing principal roles differ from the declared set";
                "principal" => principal.name(),
                "declared" => format_roles(&expected),
                "actual" => format_roles(&actual),
            );
        }
    }

    pub fn select_database(&self) -> D::Database {
        debug!(self.logger, "Selecting database"; "database" => &self.plan.database);
        self.deployment.select_database(&self.plan.database)
    }

    pub async fn ensure_collection(&self, db: &D::Database) -> BResult<Provision> {
        let outcome = db.ensure_collection(&self.plan.collection).await?;
        info!(self.logger, "Collection {}", outcome;
            "database" => db.name(),
            "collection" => &self.plan.collection);
        Ok(outcome)
    }

    pub async fn ensure_unique_index(&self, db: &D::Database) -> BResult<Provision> {
        let outcome = db
            .ensure_unique_index(&self.plan.collection, &self.plan.unique_field)
            .await?;
        info!(self.logger, "Unique index {}", outcome;
            "database" => db.name(),
            "collection" => &self.plan.collection,
            "field" => &self.plan.unique_field,
            "index" => index_name(&self.plan.unique_field));
        Ok(outcome)
    }

    /// Runs every step in order and stops at the first fatal error
    pub async fn run(&self, principal: &AdminPrincipal) -> BResult<BootstrapReport> {
        self.introduce_self();

        if let Err(why) = self.deployment.ping().await {
            crit!(self.logger, "Database server is not reachable"; "reason" => why.to_string());
            return Err(why);
        }

        let principal = self.create_admin_principal(principal).await.map_err(|why| {
            crit!(self.logger, "Could not create the administrative principal";
                "reason" => why.to_string());
            why
        })?;

        let db = self.select_database();

        let collection = self.ensure_collection(&db).await.map_err(|why| {
            crit!(self.logger, "Could not create the collection";
                "collection" => &self.plan.collection,
                "reason" => why.to_string());
            why
        })?;

        let index = self.ensure_unique_index(&db).await.map_err(|why| {
            crit!(self.logger, "Could not establish the unique index";
                "collection" => &self.plan.collection,
                "field" => &self.plan.unique_field,
                "reason" => why.to_string());
            why
        })?;

        let report = BootstrapReport {
            principal,
            collection,
            index,
        };
        if report.is_noop() {
            info!(self.logger, "Database was already initialized, nothing changed");
        } else {
            info!(self.logger, "Database bootstrap complete");
        }
        Ok(report)
    }
}

fn format_roles(roles: &[RoleGrant]) -> String {
    roles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
