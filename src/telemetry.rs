use std::{
    fs::OpenOptions,
    io,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{anyhow, Context, Result};
use time::{format_description::FormatItem, macros::format_description, UtcOffset};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{
        format::Writer,
        time::{FormatTime, OffsetTime},
        FmtContext, FormatEvent, FormatFields,
    },
    prelude::__tracing_subscriber_SubscriberExt,
    registry::LookupSpan,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

pub const DEFAULT_EVENT_LOG: &str = "app.log";
const CONSOLE_LEVEL_ENV: &str = "VK_PHOTO_BACKUP_LOG_LEVEL";
const FILE_LEVEL_ENV: &str = "VK_PHOTO_BACKUP_FILE_LOG_LEVEL";
const FILE_TIME_FORMAT: &[FormatItem<'_>] =
    format_description!("[day].[month].[year] [hour]:[minute]:[second]");

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub event_log: PathBuf,
    pub utc_offset: UtcOffset,
}

impl Default for LogConfig {
    fn default() -> Self {
        LogConfig {
            event_log: PathBuf::from(DEFAULT_EVENT_LOG),
            utc_offset: UtcOffset::UTC,
        }
    }
}

pub(crate) fn init(config: &LogConfig) -> Result<()> {
    subscriber(config)?
        .try_init()
        .context("Failed to set global default tracing subscriber")?;

    Ok(())
}

/// Console lines carry the event fields only.
struct ConsoleFormat;

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// `[DD.MM.YYYY HH:MM:SS] <ThreadId(N)> [LEVEL] message`, without span context.
struct EventLogFormat {
    timer: OffsetTime<&'static [FormatItem<'static>]>,
}

impl<S, N> FormatEvent<S, N> for EventLogFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        write!(writer, "[")?;
        self.timer.format_time(&mut writer)?;
        write!(
            writer,
            "] <{:?}> [{}] ",
            std::thread::current().id(),
            event.metadata().level()
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// Console sink with bare messages on stderr, plus the durable event log
/// sink appended to `config.event_log`.
pub fn subscriber(config: &LogConfig) -> Result<impl Subscriber + Send + Sync + 'static> {
    let fmt_env_filter = env_filter_merge_from_environment("info", CONSOLE_LEVEL_ENV)?;
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .event_format(ConsoleFormat)
        .with_filter(fmt_env_filter);

    let file_env_filter = env_filter_merge_from_environment("info", FILE_LEVEL_ENV)?;
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(open_event_log(&config.event_log)?))
        .with_ansi(false)
        .event_format(EventLogFormat {
            timer: OffsetTime::new(config.utc_offset, FILE_TIME_FORMAT),
        })
        .with_filter(file_env_filter);

    Ok(tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer))
}

fn open_event_log(path: &Path) -> Result<std::fs::File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| anyhow!("Failed to open event log {}", path.display()))
}

fn env_filter_merge_from_environment(
    default_directives: &'static str,
    env_var: &'static str,
) -> Result<EnvFilter> {
    let mut filter = EnvFilter::builder()
        .parse(default_directives)
        .with_context(|| anyhow!("Default directives were invalid: {default_directives}"))?;

    if let Ok(env_value) = std::env::var(env_var) {
        for env_directive in env_value.split(',') {
            match env_directive.parse() {
                Ok(directive) => filter = filter.add_directive(directive),
                Err(err) => eprintln!("WARN ignoring log directive: {env_directive:?}: {err}"),
            }
        }
    }

    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct Captured(std::sync::Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn event_log_lines_skip_span_context() {
        let path = std::env::temp_dir().join(format!(
            "vk-photo-backup-events-{}.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let config = LogConfig {
            event_log: path.clone(),
            utc_offset: UtcOffset::UTC,
        };
        let subscriber = subscriber(&config).unwrap();
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("run", owner_id = "1");
            let _entered = span.enter();
            tracing::info!("Creating folder 'x' on Yandex Disk");
            tracing::warn!("Photo 'a.jpg' could not be uploaded in 10 seconds");
            tracing::trace!("not written");
        });

        let contents = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        let thread = format!("{:?}", std::thread::current().id());
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(!contents.contains('\x1b'));

        // "[DD.MM.YYYY HH:MM:SS]" is 21 characters wide.
        assert!(lines[0].starts_with('['));
        assert_eq!(&lines[0][20..21], "]");
        assert_eq!(
            &lines[0][21..],
            format!(" <{}> [INFO] Creating folder 'x' on Yandex Disk", thread)
        );
        assert_eq!(
            &lines[1][21..],
            format!(
                " <{}> [WARN] Photo 'a.jpg' could not be uploaded in 10 seconds",
                thread
            )
        );
    }

    #[test]
    fn console_lines_are_bare_messages() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .event_format(ConsoleFormat)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("run", owner_id = "1");
            let _entered = span.enter();
            tracing::info!("Successfully uploaded 1/2 photos");
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output, "Successfully uploaded 1/2 photos\n");
    }

    #[test]
    fn environment_directives_are_merged() {
        std::env::set_var(
            "VK_PHOTO_BACKUP_TEST_LEVEL",
            "vk_photo_backup=debug,not a directive[",
        );
        let filter =
            env_filter_merge_from_environment("info", "VK_PHOTO_BACKUP_TEST_LEVEL").unwrap();
        std::env::remove_var("VK_PHOTO_BACKUP_TEST_LEVEL");

        let rendered = filter.to_string();
        assert!(rendered.contains("vk_photo_backup=debug"));
        assert!(rendered.contains("info"));
    }
}
