use f1_discord_bootstrap::config::{self, Config};
use f1_discord_bootstrap::prelude::*;

#[tokio::main(flavor = "current_thread")]
async fn main() -> BResult {
    let cfg_path = config::config_path(std::env::var(config::CONFIG_PATH_VAR).ok());
    let config = match config::read_or_default::<Config>(&cfg_path) {
        Ok(config) => config,
        Err(why) => {
            let logger = configure_term_root(slog::Level::Info);
            crit!(logger, "Could not load the bootstrap config";
                "path" => cfg_path.display().to_string(),
                "reason" => why.to_string());
            return Err(why);
        }
    };
    let logger = configure_root(&config.logging)?;
    debug!(logger, "Config loaded"; "path" => cfg_path.display().to_string());

    let deployment = match MongoDeployment::connect(&config.mongodb, logger.clone()).await {
        Ok(deployment) => deployment,
        Err(why) => {
            crit!(logger, "Could not set up the database client";
                "host" => &config.mongodb.host,
                "port" => config.mongodb.port,
                "reason" => why.to_string());
            return Err(why);
        }
    };

    let ctx = BootstrapRequirements { logger, config };
    bootstrap(&ctx, deployment, |var| std::env::var(var).ok())
        .await
        .map(|_| ())
}
