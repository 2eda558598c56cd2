// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const HTTP_STACK_CAP: &str = "reqwest=info,hyper=info,hyper_util=info";

/// Routes `tracing` output to `path` so the terminal stays with the UI.
/// `RUST_LOG` wins over `level` when set.
pub fn init_file_logging(path: &Path, level: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create log directory {}", parent.display()))?;
    }

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("open log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(level)?)
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .try_init()
        .map_err(|error| anyhow!("install log subscriber: {error}"))
}

fn env_filter(level: &str) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    // The HTTP stack logs request URLs at debug, and those carry the API key.
    let directives = format!("{level},{HTTP_STACK_CAP}");
    EnvFilter::try_new(directives).with_context(|| {
        format!("invalid [log].level {level:?}; use a level such as info, debug or warn")
    })
}
