use std::path::Path;
use std::time::Duration;

use interview_stream::{ClientConfig, Credentials, RetryPolicy};

use crate::{Cli, RetryArgs};

/// Loads `.env` from the crate directory and then the working directory.
pub fn init() {
    let _ = dotenvy::from_path(Path::new(
        format!("{}/.env", env!("CARGO_MANIFEST_DIR")).as_str(),
    ));
    dotenvy::dotenv().ok();
}

pub fn client_config(cli: &Cli) -> ClientConfig {
    let mut config = ClientConfig::new(cli.base_url.clone());
    if let Some(secs) = cli.timeout_secs {
        config = config.timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = cli.upload_timeout_secs {
        config = config.upload_timeout(Duration::from_secs(secs));
    }
    config
}

pub fn credentials(cli: &Cli) -> Credentials {
    match &cli.token {
        Some(token) => Credentials::bearer(token.clone()),
        None => Credentials::anonymous(),
    }
}

pub fn retry_policy(args: &RetryArgs) -> RetryPolicy {
    RetryPolicy::exponential(args.attempts, args.base_delay_ms)
}
