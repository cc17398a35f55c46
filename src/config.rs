use crate::dispatch::RetryPolicy;
use clap::{Args, Parser};
use secrecy::SecretString;
use std::time::Duration;
use thiserror::Error;

/// One day.
const MAX_RETRY_BASE_SECS: u64 = 86_400;

#[derive(Parser, Debug)]
#[command(version, about = "Records door sensor reports and serves a live status page")]
pub struct Cli {
    /// Listening address
    #[arg(short, long, env = "DOORSTAT_ADDRESS", default_value = "0.0.0.0:5000")]
    pub address: String,

    /// Number of reports kept in memory; the oldest is dropped first
    #[arg(
        long,
        env = "DOORSTAT_LOG_CAPACITY",
        default_value_t = 1024,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub log_capacity: u64,

    #[command(flatten)]
    pub mail: MailArgs,
}

/// Outbound mail. Leaving every mail flag unset disables notifications.
#[derive(Args, Debug)]
pub struct MailArgs {
    /// SMTP relay, reached over implicit TLS
    #[arg(long, env = "DOORSTAT_SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[arg(long, env = "DOORSTAT_SMTP_PORT", default_value_t = 465)]
    pub smtp_port: u16,

    #[arg(long, env = "DOORSTAT_SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    #[arg(long, env = "DOORSTAT_SMTP_PASSWORD", hide_env_values = true)]
    pub smtp_password: Option<String>,

    /// Sender address [default: the SMTP username]
    #[arg(long, env = "DOORSTAT_MAIL_FROM")]
    pub mail_from: Option<String>,

    /// Operator address that receives status changes
    #[arg(long, env = "DOORSTAT_MAIL_TO")]
    pub mail_to: Option<String>,

    /// Upper bound on a single delivery attempt
    #[arg(
        long,
        env = "DOORSTAT_MAIL_TIMEOUT_SECS",
        default_value_t = 30,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub mail_timeout_secs: u64,

    #[arg(
        long,
        env = "DOORSTAT_MAIL_MAX_ATTEMPTS",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub mail_max_attempts: u32,

    /// Delay before the first retry; doubles on every further retry
    #[arg(
        long,
        env = "DOORSTAT_MAIL_RETRY_BASE_SECS",
        default_value_t = 2,
        value_parser = clap::value_parser!(u64).range(..=MAX_RETRY_BASE_SECS)
    )]
    pub mail_retry_base_secs: u64,

    /// Notifications waiting for delivery before new ones are dropped
    #[arg(long, env = "DOORSTAT_MAIL_QUEUE_CAPACITY", default_value_t = 32)]
    pub mail_queue_capacity: usize,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from: String,
    pub to: String,
    pub timeout: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Mail is partially configured, missing {0}")]
    IncompleteMail(&'static str),
}

impl MailArgs {
    /// `Ok(None)` when no mail flag is set at all.
    pub fn smtp_config(&self) -> Result<Option<SmtpConfig>, ConfigError> {
        let (host, username, password, to) = match (
            &self.smtp_host,
            &self.smtp_username,
            &self.smtp_password,
            &self.mail_to,
        ) {
            (None, None, None, None) if self.mail_from.is_none() => return Ok(None),
            (Some(host), Some(username), Some(password), Some(to)) => {
                (host, username, password, to)
            }
            (None, ..) => return Err(ConfigError::IncompleteMail("--smtp-host")),
            (_, None, ..) => return Err(ConfigError::IncompleteMail("--smtp-username")),
            (_, _, None, _) => return Err(ConfigError::IncompleteMail("--smtp-password")),
            (.., None) => return Err(ConfigError::IncompleteMail("--mail-to")),
        };

        Ok(Some(SmtpConfig {
            host: host.clone(),
            port: self.smtp_port,
            username: username.clone(),
            password: SecretString::new(password.clone()),
            from: self.mail_from.clone().unwrap_or_else(|| username.clone()),
            to: to.clone(),
            timeout: self.attempt_timeout(),
        }))
    }

    #[must_use]
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.mail_timeout_secs)
    }

    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.mail_max_attempts,
            base_delay: Duration::from_secs(self.mail_retry_base_secs),
            multiplier: 2.0,
        }
    }
}
