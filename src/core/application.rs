use crate::config::Config;
use crate::credentials::Credentials;
use crate::prelude::*;

#[derive(Clone)]
pub struct BootstrapRequirements {
    pub logger: slog::Logger,
    pub config: Config,
}

fn extract_principal<F>(ctx: &BootstrapRequirements, lookup: F) -> BResult<AdminPrincipal>
where
    F: Fn(&str) -> Option<String>,
{
    let credentials = Credentials::from_lookup(&ctx.config.credentials, lookup).map_err(|why| {
        crit!(ctx.logger, "Could not fetch the root credentials from the environment";
            "username var" => &ctx.config.credentials.username_var,
            "password var" => &ctx.config.credentials.password_var,
            "reason" => why.to_string());
        why
    })?;
    let principal = AdminPrincipal::root(credentials, &ctx.config.target.admin_database)
        .map_err(|why| {
            crit!(ctx.logger, "Root credentials do not describe a valid principal";
                "admin database" => &ctx.config.target.admin_database,
                "reason" => why.to_string());
            why
        })?;
    debug!(ctx.logger, "Root credentials fetched"; "principal" => principal.name());
    Ok(principal)
}

/// Resolves the root credentials through `lookup` and runs the bootstrap
/// against `deployment`. Nothing is sent to the server when the
/// credentials are missing.
pub async fn bootstrap<D, F>(
    ctx: &BootstrapRequirements,
    deployment: D,
    lookup: F,
) -> BResult<BootstrapReport>
where
    D: Deployment,
    F: Fn(&str) -> Option<String>,
{
    let principal = extract_principal(ctx, lookup)?;

    let bootstrap = Bootstrap::new()
        .logger(ctx.logger.clone())
        .deployment(deployment)
        .plan(ctx.config.target.plan())
        .build()
        .map_err(|why| {
            crit!(ctx.logger, "Could not assemble the bootstrap"; "reason" => why.to_string());
            why
        })?;

    bootstrap.run(&principal).await
}
