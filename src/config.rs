use anyhow::{Context, Result, bail};
use chrono::Duration;
use clap::Parser;
use rand::RngCore;
use std::{env, fmt, path::PathBuf, str::FromStr};

const ENV_PREFIX: &str = "BUCKET_GATE_";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments. Built once at startup
/// and handed to each service constructor; nothing reads it globally.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: Vec<u8>,
    pub token_ttl: Duration,
    pub default_region: String,
    pub credentials_file: Option<PathBuf>,
    pub storage_dir: String,
    pub database_url: String,
    pub account_id: String,
    pub rollback_on_folder_failure: bool,
}

/// One-shot actions that run instead of the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Serve,
    Migrate,
    HashPassword(String),
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Bearer-token gated bucket management API")]
pub struct Args {
    /// Host to bind to (overrides BUCKET_GATE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides BUCKET_GATE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Access token lifetime in minutes (overrides BUCKET_GATE_TOKEN_TTL_MINUTES)
    #[arg(long)]
    pub token_ttl_minutes: Option<i64>,

    /// Region used when a create request names none (overrides BUCKET_GATE_DEFAULT_REGION)
    #[arg(long)]
    pub default_region: Option<String>,

    /// JSON file mapping usernames to Argon2 verifiers (overrides BUCKET_GATE_CREDENTIALS_FILE)
    #[arg(long)]
    pub credentials_file: Option<PathBuf>,

    /// Directory where the local provider keeps object payloads (overrides BUCKET_GATE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL for provider metadata (overrides BUCKET_GATE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Delete a freshly created bucket when its folder marker cannot be written
    #[arg(long)]
    pub rollback_on_folder_failure: bool,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,

    /// Print an Argon2 verifier for the given password and exit
    #[arg(long, value_name = "PASSWORD")]
    pub hash_password: Option<String>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the requested command.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        let args = Args::parse();
        Self::from_args(args, |key| env::var(key))
    }

    /// Merge parsed arguments over an environment lookup. Split out so the
    /// merge rules can be exercised without touching process state.
    pub fn from_args<F>(args: Args, lookup: F) -> Result<(Self, Command)>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        let var = |name: &str| -> Result<Option<String>> {
            let key = format!("{ENV_PREFIX}{name}");
            match lookup(&key) {
                Ok(value) => Ok(Some(value)),
                Err(env::VarError::NotPresent) => Ok(None),
                Err(err) => Err(err).with_context(|| format!("reading {key}")),
            }
        };

        let env_host = var("HOST")?.unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var::<u16>("PORT", var("PORT")?)?.unwrap_or(8000);
        let env_ttl =
            parse_var::<i64>("TOKEN_TTL_MINUTES", var("TOKEN_TTL_MINUTES")?)?.unwrap_or(30);
        let env_region = var("DEFAULT_REGION")?.unwrap_or_else(|| "us-east-1".into());
        let env_credentials = var("CREDENTIALS_FILE")?.map(PathBuf::from);
        let env_storage = var("STORAGE_DIR")?.unwrap_or_else(|| "./data/buckets".into());
        let env_db = var("DATABASE_URL")?
            .unwrap_or_else(|| "sqlite://./data/meta/bucket_gate.db".into());
        let env_rollback = parse_var::<bool>(
            "ROLLBACK_ON_FOLDER_FAILURE",
            var("ROLLBACK_ON_FOLDER_FAILURE")?,
        )?
        .unwrap_or(false);

        let ttl_minutes = args.token_ttl_minutes.unwrap_or(env_ttl);
        if ttl_minutes <= 0 {
            bail!("token TTL must be a positive number of minutes, got {ttl_minutes}");
        }
        let token_ttl = Duration::try_minutes(ttl_minutes)
            .with_context(|| format!("token TTL of {ttl_minutes} minutes is out of range"))?;

        let jwt_secret = match var("JWT_SECRET")? {
            Some(secret) if !secret.is_empty() => secret.into_bytes(),
            _ => {
                tracing::warn!(
                    "{ENV_PREFIX}JWT_SECRET not set; using a random signing key, tokens will not survive a restart"
                );
                let mut key = vec![0u8; 32];
                rand::thread_rng().fill_bytes(&mut key);
                key
            }
        };

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            jwt_secret,
            token_ttl,
            default_region: args.default_region.unwrap_or(env_region),
            credentials_file: args.credentials_file.or(env_credentials),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            account_id: var("ACCOUNT_ID")?.unwrap_or_else(|| "local-account".into()),
            rollback_on_folder_failure: args.rollback_on_folder_failure || env_rollback,
        };

        let command = if let Some(password) = args.hash_password {
            Command::HashPassword(password)
        } else if args.migrate {
            Command::Migrate
        } else {
            Command::Serve
        };

        Ok((cfg, command))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<T>(name: &str, raw: Option<String>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.map(|value| {
        value
            .parse::<T>()
            .with_context(|| format!("parsing {ENV_PREFIX}{name} value `{value}`"))
    })
    .transpose()
}

// The signing key stays out of logs.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_minutes", &self.token_ttl.num_minutes())
            .field("default_region", &self.default_region)
            .field("credentials_file", &self.credentials_file)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("account_id", &self.account_id)
            .field(
                "rollback_on_folder_failure",
                &self.rollback_on_folder_failure,
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["bucket-gate"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Result<String, env::VarError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned().ok_or(env::VarError::NotPresent)
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let (cfg, command) = AppConfig::from_args(args(&[]), env_of(&[])).unwrap();
        assert_eq!(command, Command::Serve);
        assert_eq!(cfg.port, 8000);
        assert_eq!(cfg.token_ttl, Duration::minutes(30));
        assert_eq!(cfg.default_region, "us-east-1");
        assert_eq!(cfg.jwt_secret.len(), 32);
        assert!(!cfg.rollback_on_folder_failure);
    }

    #[test]
    fn cli_overrides_environment() {
        let env = env_of(&[
            ("BUCKET_GATE_PORT", "9000"),
            ("BUCKET_GATE_DEFAULT_REGION", "eu-west-1"),
            ("BUCKET_GATE_JWT_SECRET", "s3cr3t"),
        ]);
        let (cfg, _) = AppConfig::from_args(args(&["--port", "7000"]), env).unwrap();
        assert_eq!(cfg.port, 7000);
        assert_eq!(cfg.default_region, "eu-west-1");
        assert_eq!(cfg.jwt_secret, b"s3cr3t");
    }

    #[test]
    fn malformed_numbers_are_startup_errors() {
        let env = env_of(&[("BUCKET_GATE_TOKEN_TTL_MINUTES", "soon")]);
        let err = AppConfig::from_args(args(&[]), env).unwrap_err();
        assert!(err.to_string().contains("TOKEN_TTL_MINUTES"));
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        assert!(AppConfig::from_args(args(&["--token-ttl-minutes", "0"]), env_of(&[])).is_err());
    }

    #[test]
    fn hash_password_wins_over_migrate() {
        let (_, command) =
            AppConfig::from_args(args(&["--migrate", "--hash-password", "pw"]), env_of(&[]))
                .unwrap();
        assert_eq!(command, Command::HashPassword("pw".into()));
    }

    #[test]
    fn debug_output_redacts_secret() {
        let env = env_of(&[("BUCKET_GATE_JWT_SECRET", "do-not-print")]);
        let (cfg, _) = AppConfig::from_args(args(&[]), env).unwrap();
        assert!(!format!("{cfg:?}").contains("do-not-print"));
    }
}
