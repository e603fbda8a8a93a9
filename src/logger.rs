use std::{
    collections::HashMap,
    fmt::Write as _,
    fs::OpenOptions,
    path::PathBuf,
};
use nu_ansi_term::{Color, Style};
use serde::Deserialize;
use termcolor::ColorChoice;
use tracing::{field::Visit, Level};
use tracing_log::NormalizeEvent;
use tracing_subscriber::{
    filter::{FilterFn, LevelFilter},
    fmt::FormatEvent,
    prelude::*,
};

use crate::{prelude::*, args::Args};


#[derive(Debug, confique::Config)]
pub(crate) struct LogConfig {
    /// Specifies what log messages to emit, based on the module path and log
    /// level.
    ///
    /// This is a map where the key specifies a module path prefix, and the
    /// value specifies a minimum log level. For each log message, the map
    /// entry with the longest prefix matching the log's module path is
    /// chosen. If no such entry exists, the log is not emitted. Otherwise,
    /// that entry's level is used to check whether the log message should be
    /// emitted.
    ///
    /// Example: the following config only allows ≥"info" logs from Bookshelf
    /// generally, but also ≥"trace" messages from the `db` submodule, and
    /// ≥"debug" messages from the HTTP library `hyper`.
    ///
    ///    [log]
    ///    filters.bookshelf = "info"
    ///    filters."bookshelf::db" = "trace"
    ///    filters.hyper = "debug"
    #[config(default = { "bookshelf": "debug" })]
    pub(crate) filters: Filters,

    /// If this is set, log messages are also written to this file.
    /// Example: "/var/log/bookshelf.log".
    pub(crate) file: Option<PathBuf>,

    /// If this is set to `false`, log messages are not written to stdout.
    #[config(default = true)]
    pub(crate) stdout: bool,
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "HashMap<String, String>")]
pub(crate) struct Filters(HashMap<String, LevelFilter>);

impl TryFrom<HashMap<String, String>> for Filters {
    type Error = String;
    fn try_from(value: HashMap<String, String>) -> Result<Self, Self::Error> {
        value.into_iter()
            .map(|(target_prefix, level)| {
                let level = parse_level_filter(&level)?;
                Ok((target_prefix, level))
            })
            .collect::<Result<_, _>>()
            .map(Self)
    }
}

fn parse_level_filter(s: &str) -> Result<LevelFilter, String> {
    match s {
        "off" => Ok(LevelFilter::OFF),
        "trace" => Ok(LevelFilter::TRACE),
        "debug" => Ok(LevelFilter::DEBUG),
        "info" => Ok(LevelFilter::INFO),
        "warn" => Ok(LevelFilter::WARN),
        "error" => Ok(LevelFilter::ERROR),
        other => Err(format!("invalid log level '{other}'")),
    }
}

/// Installs our own logger globally. Must only be called once!
pub(crate) fn init(config: &LogConfig, args: &Args) -> Result<()> {
    let filter = {
        let filters = config.filters.0.clone();
        let max_level = filters.values().max().copied().unwrap_or(LevelFilter::OFF);
        let filter = FilterFn::new(move |metadata| {
            // If there are many filters, it might be worth to build an extra
            // prefix data structure, but in practice we only expect very few
            // entries.
            //
            // See the config doc comment to see the logic behind this filter.
            filters.iter()
                .filter(|(target_prefix, _)| metadata.target().starts_with(*target_prefix))
                .max_by_key(|(target_prefix, _)| target_prefix.len())
                .map(|(_, level_filter)| metadata.level() <= level_filter)
                .unwrap_or(false)
        });
        filter.with_max_level_hint(max_level)
    };

    macro_rules! subscriber {
        ($writer:expr) => {
            tracing_subscriber::fmt::layer()
                .event_format(EventFormatter(args.color))
                .with_writer($writer)
        };
    }

    let stdout_output = if config.stdout {
        Some(subscriber!(std::io::stdout))
    } else {
        None
    };

    let file_output = config.file.as_ref()
        .map(|path| -> Result<std::fs::File> {
            use std::io::Write;

            let mut file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(path)
                .with_context(|| format!("failed to open/create log file '{}'", path.display()))?;

            // Add an empty line separator to see process restarts easier.
            file.write_all(b"\n").context("could not write to log file")?;

            Ok(file)
        })
        .transpose()?
        .map(|file| subscriber!(file).with_ansi(args.color == ColorChoice::Always));

    tracing_subscriber::registry()
        .with(filter)
        .with(file_output)
        .with(stdout_output)
        .init();

    Ok(())
}

type TracingWriter<'a> = tracing_subscriber::fmt::format::Writer<'a>;

#[derive(Clone, Copy)]
struct EventFormatter(ColorChoice);

impl<S, N> FormatEvent<S, N> for EventFormatter
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
    N: for<'a> tracing_subscriber::fmt::FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &tracing_subscriber::fmt::FmtContext<'_, S, N>,
        mut writer: TracingWriter<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        // Helper macro to conditionally emit ANSI control codes
        let use_ansi = self.0 == ColorChoice::Always
            || (writer.has_ansi_escapes() && self.0 != ColorChoice::Never);
        macro_rules! wr {
            ($style:expr, $fmt:literal $($args:tt)*) => {{
                with_style(&mut writer, use_ansi, $style, |w| {
                    write!(w, $fmt $($args)*)
                })?;
            }};
        }

        // Normalize metadata of log events that came in through the `log`
        // bridge.
        let normalized_metadata = event.normalized_metadata();
        let metadata = normalized_metadata.as_ref().unwrap_or(event.metadata());

        // Determine styles/colors
        let dim_style = Style::new().dimmed();
        let level_style = match *metadata.level() {
            Level::ERROR => Style::new().fg(Color::Red).bold(),
            Level::WARN => Style::new().fg(Color::Yellow).bold(),
            Level::INFO => Style::new().fg(Color::Green),
            Level::DEBUG => Style::new().fg(Color::Blue),
            Level::TRACE => Style::new().fg(Color::Magenta),
        };
        let body_style = match *metadata.level() {
            Level::ERROR => Style::new().fg(Color::Red),
            Level::WARN => Style::new().fg(Color::Yellow),
            Level::INFO => Style::new(),
            Level::DEBUG => Style::new().dimmed(),
            Level::TRACE => Style::new().fg(Color::DarkGray),
        };


        // Print time, level and target.
        wr!(dim_style, "{} ", chrono::Local::now().format("%Y-%m-%d %H:%M:%S.%3f"));
        wr!(level_style, "{:5}", metadata.level());
        wr!(dim_style, " {} >  ", metadata.target());


        // Gather the message and all other fields. The `message` field is
        // printed in the body style, everything else dimmed after it.
        struct Collector {
            message: Option<String>,
            fields: String,
        }

        impl Visit for Collector {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                let name = field.name();
                if name == "message" {
                    self.message = Some(format!("{value:?}"));
                } else if !name.starts_with("log.") {
                    let _ = write!(self.fields, " {name}={value:?}");
                }
            }
        }

        let mut collector = Collector { message: None, fields: String::new() };
        event.record(&mut collector);

        if let Some(message) = &collector.message {
            with_style(&mut writer, use_ansi, body_style, |w| write!(w, "{message}"))?;
        }
        if !collector.fields.is_empty() {
            with_style(&mut writer, use_ansi, dim_style, |w| write!(w, "{}", collector.fields))?;
        }

        writeln!(writer)
    }
}

fn with_style(
    out: &mut TracingWriter<'_>,
    use_ansi: bool,
    style: Style,
    f: impl FnOnce(&mut TracingWriter<'_>) -> std::fmt::Result,
) -> std::fmt::Result {
    if use_ansi {
        write!(out, "{}", style.prefix())?;
    }
    f(out)?;
    if use_ansi {
        write!(out, "{}", style.suffix())?;
    }
    Ok(())
}
