// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use crate::{context::CoresImpl, platform::LogSinkImpl};
use core::fmt::{Arguments, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use percore::Cores;
use spin::{Once, mutex::SpinMutex};

/// True if the build is configured with debug assertions on.
pub const DEBUG: bool = cfg!(debug_assertions);

static LOGGER: Once<Logger<LogSinkImpl>> = Once::new();

/// Writes each record to a sink as one line, tagged with its level and the index of the core which
/// logged it.
struct Logger<S> {
    sink: S,
}

impl<S: LogSink + Send + Sync> Log for Logger<S> {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        writeln!(
            self.sink,
            "{:<5} [{}] {}",
            record.level(),
            CoresImpl::core_index(),
            record.args()
        );
    }

    fn flush(&self) {
        self.sink.flush();
    }
}

/// Installs the global logger, writing to the given sink.
///
/// Fails if a logger has already been installed.
pub fn init(sink: LogSinkImpl) -> Result<(), SetLoggerError> {
    let logger = LOGGER.call_once(|| Logger { sink });
    log::set_logger(logger)?;
    log::set_max_level(build_time_log_level());
    Ok(())
}

/// Returns the maximum log level, from the `LOG_LEVEL` environment variable at build time.
///
/// `LOG_LEVEL` may be any level name accepted by [`LevelFilter`]'s `FromStr` implementation, such
/// as "off", "warn" or "trace". Otherwise debug builds log at `Debug` and release builds at `Info`.
pub fn build_time_log_level() -> LevelFilter {
    parse_log_level(option_env!("LOG_LEVEL"))
}

fn parse_log_level(level: Option<&str>) -> LevelFilter {
    level
        .and_then(|level| level.parse().ok())
        .unwrap_or(if DEBUG {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
}

/// Somewhere log lines can be written from any core.
///
/// `write_fmt` takes `&self`, so an implementation shared between cores must do its own locking.
pub trait LogSink {
    /// Writes the given format arguments to the log sink.
    fn write_fmt(&self, args: Arguments);

    /// Waits until everything written so far has left the sink.
    fn flush(&self) {}
}

/// A [`LogSink`] which serialises writes to a [`Write`] implementation with a spin lock.
///
/// Each `writeln!` holds the lock for the whole line, so lines from different cores never
/// interleave.
pub struct LockedWriter<W: Write> {
    writer: SpinMutex<W>,
}

impl<W: Write> LockedWriter<W> {
    /// Wraps the given writer.
    pub const fn new(writer: W) -> Self {
        Self {
            writer: SpinMutex::new(writer),
        }
    }
}

impl<W: Write> LogSink for LockedWriter<W> {
    fn write_fmt(&self, args: Arguments) {
        // There is nowhere to report a failure to log.
        let _ = self.writer.lock().write_fmt(args);
    }
}
