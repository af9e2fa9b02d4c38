use std::io::{BufRead, Write};
use std::time::Duration;

use structopt::StructOpt;
use time::{format_description::FormatItem, macros::format_description, UtcOffset};

pub mod backup;
pub mod disk;
pub mod error;
pub mod models;
pub mod record;
pub mod telemetry;
pub mod vk;

pub use backup::{Backup, BackupConfig, PollConfig, Summary};
pub use error::BackupError;

const OFFSET_FORMAT: &[FormatItem<'_>] =
    format_description!("[offset_hour sign:mandatory]:[offset_minute]");

#[derive(Debug)]
pub enum Error {
    PromptError(std::io::Error),
    TelemetryInitError(anyhow::Error),
    Backup(BackupError),
}

impl From<Error> for u8 {
    fn from(error: Error) -> u8 {
        match error {
            Error::Backup(_) => 1,
            Error::PromptError(_) => 2,
            Error::TelemetryInitError(_) => 4,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::PromptError(err) => {
                write!(f, "Failed to read credentials: {}", err)
            },
            Error::TelemetryInitError(err) => {
                write!(f, "Failed to init telemetry: {}", err)
            },
            Error::Backup(err) => write!(f, "{}", err),
        }
    }
}

fn parse_utc_offset(value: &str) -> Result<UtcOffset, time::error::Parse> {
    UtcOffset::parse(value, OFFSET_FORMAT)
}

#[derive(Debug, StructOpt)]
pub struct Args {
    /// VK profile ID whose profile photos are copied.
    #[structopt(long, env = "VK_PHOTO_BACKUP_OWNER_ID")]
    owner_id: Option<String>,
    /// VK access token.
    #[structopt(long, env = "VK_PHOTO_BACKUP_VK_TOKEN", hide_env_values = true)]
    vk_token: Option<String>,
    /// Yandex Disk OAuth token.
    #[structopt(long, env = "VK_PHOTO_BACKUP_DISK_TOKEN", hide_env_values = true)]
    disk_token: Option<String>,

    /// Prefix of the Yandex Disk folder created for this run.
    #[structopt(
        long,
        default_value = backup::DEFAULT_FOLDER_PREFIX,
        env = "VK_PHOTO_BACKUP_FOLDER_PREFIX"
    )]
    folder_prefix: String,

    /// Number of upload status checks per photo.
    #[structopt(long, default_value = "5", env = "VK_PHOTO_BACKUP_POLL_ATTEMPTS")]
    poll_attempts: u32,
    /// Seconds to wait after each unfinished upload status check.
    #[structopt(long, default_value = "2", env = "VK_PHOTO_BACKUP_POLL_INTERVAL")]
    poll_interval: u64,

    /// UTC offset used for file names, folder names and log timestamps.
    #[structopt(
        long,
        default_value = "+00:00",
        env = "VK_PHOTO_BACKUP_UTC_OFFSET",
        parse(try_from_str = parse_utc_offset)
    )]
    utc_offset: UtcOffset,

    /// Path of the event log.
    #[structopt(
        long,
        parse(from_os_str),
        default_value = telemetry::DEFAULT_EVENT_LOG,
        env = "VK_PHOTO_BACKUP_EVENT_LOG"
    )]
    event_log: std::path::PathBuf,
    /// Path of the upload record log.
    #[structopt(
        long,
        parse(from_os_str),
        default_value = record::DEFAULT_PATH,
        env = "VK_PHOTO_BACKUP_RECORD_LOG"
    )]
    record_log: std::path::PathBuf,

    /// VK API method base URL.
    #[structopt(long, default_value = vk::DEFAULT_API_BASE, env = "VK_PHOTO_BACKUP_VK_API_BASE")]
    vk_api_base: String,
    /// Yandex Disk API base URL.
    #[structopt(
        long,
        default_value = disk::DEFAULT_API_BASE,
        env = "VK_PHOTO_BACKUP_DISK_API_BASE"
    )]
    disk_api_base: String,
}

#[derive(Debug, PartialEq)]
pub struct Credentials {
    pub owner_id: String,
    pub vk_token: String,
    pub disk_token: String,
}

impl Args {
    /// Fills in missing credentials by prompting on `input`/`output`.
    pub fn credentials<R: BufRead, W: Write>(
        &self,
        input: &mut R,
        output: &mut W,
    ) -> std::io::Result<Credentials> {
        let mut resolve = |value: &Option<String>, label: &str| match value {
            Some(value) => Ok(value.clone()),
            None => prompt(input, output, label),
        };

        Ok(Credentials {
            owner_id: resolve(&self.owner_id, "Please enter VK profile ID")?,
            vk_token: resolve(&self.vk_token, "Please enter VK access token")?,
            disk_token: resolve(&self.disk_token, "Please enter Yandex Disk access token")?,
        })
    }

    pub fn log_config(&self) -> telemetry::LogConfig {
        telemetry::LogConfig {
            event_log: self.event_log.clone(),
            utc_offset: self.utc_offset,
        }
    }

    pub fn backup_config(&self) -> BackupConfig {
        BackupConfig {
            folder_prefix: self.folder_prefix.clone(),
            poll: PollConfig {
                attempts: self.poll_attempts,
                interval: Duration::from_secs(self.poll_interval),
            },
            utc_offset: self.utc_offset,
        }
    }
}

fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
) -> std::io::Result<String> {
    write!(output, "{}: ", label)?;
    output.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            format!("no input for \"{}\"", label),
        ));
    }

    Ok(line.trim().to_string())
}

pub async fn main() -> Result<(), Error> {
    dotenv::dotenv().ok();
    let args = Args::from_args();

    let credentials = {
        let stdin = std::io::stdin();
        let stdout = std::io::stdout();
        args.credentials(&mut stdin.lock(), &mut stdout.lock())
            .map_err(Error::PromptError)?
    };

    telemetry::init(&args.log_config()).map_err(Error::TelemetryInitError)?;
    tracing::info!("Starting new backup session");

    let source = vk::VkClient::new(&args.vk_api_base, credentials.vk_token, args.utc_offset);
    let storage = disk::DiskClient::new(&args.disk_api_base, &credentials.disk_token);
    let backup = Backup::new(
        source,
        storage,
        record::RecordLog::new(&args.record_log),
        args.backup_config(),
    );

    let summary = backup
        .run(&credentials.owner_id)
        .await
        .map_err(Error::Backup)?;
    println!("{}", summary);

    Ok(())
}
