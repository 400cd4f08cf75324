use crate::config::LoggingConfig;
use crate::prelude::*;
use slog::{o, Drain, Level, Logger};
use std::path::Path;

fn get_datetime_str() -> String {
    chrono::offset::Local::now()
        .format("%d-%m-%Y_%H-%M")
        .to_string()
}

/// Terminal root logger with compact output
pub fn configure_term_root(level: Level) -> Logger {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::CompactFormat::new(decorator)
        .use_local_timestamp()
        .build()
        .fuse();
    let drain = slog::LevelFilter::new(drain, level).ignore_res();
    let drain = slog_async::Async::new(drain).build().fuse();

    slog::Logger::root(drain, o!("component" => "bootstrap"))
}

/// Root logger that also writes to a file when a directory is configured
pub fn configure_root(config: &LoggingConfig) -> BResult<Logger> {
    let level = config.level()?;
    let directory = match &config.directory {
        Some(dir) => dir,
        None => return Ok(configure_term_root(level)),
    };

    let term = {
        let decorator = slog_term::TermDecorator::new().stderr().build();
        slog_term::CompactFormat::new(decorator)
            .use_local_timestamp()
            .build()
            .fuse()
    };
    let file = {
        let file = create_log_file(directory)?;
        let decorator = slog_term::PlainDecorator::new(file);
        slog_term::FullFormat::new(decorator)
            .use_original_order()
            .use_local_timestamp()
            .build()
            .fuse()
    };
    let drain = slog::Duplicate::new(term, file).fuse();
    let drain = slog::LevelFilter::new(drain, level).ignore_res();
    let drain = slog_async::Async::new(drain).build().fuse();

    Ok(slog::Logger::root(drain, o!("component" => "bootstrap")))
}

fn create_log_file(directory: &Path) -> BResult<std::fs::File> {
    std::fs::create_dir_all(directory)?;
    let file_path = directory.join(format!("bootstrap_{}.txt", get_datetime_str()));
    Ok(std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(file_path)?)
}
