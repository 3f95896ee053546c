//! Contains tools for debug-mode logging.
//!
//! Logging cannot be enabled when `cfg!(debug_assertions)` is false, otherwise
//! it's enabled by default. In release builds the macros compile to nothing,
//! so logging on the per-frame path costs nothing where it matters.
//!
//! Each line carries a [Level] tag, the module that logged it, and a second
//! line with the call site, the time, and the executable (see
//! [where_and_when]).

pub mod panic_on_errors;

use std::fmt::{self, Display, Formatter};
use std::panic::Location;
#[cfg(debug_assertions)]
use std::sync::atomic::{AtomicBool, Ordering};

use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Log some info to stdout if both `cfg!(debug_assertions)` and [enabled] are
/// true.
#[macro_export]
macro_rules! debug_log_info {
    ($($arg:tt)*) => {{
        $crate::__debug_log!($crate::debug_log::Level::Info, $($arg)*);
    }};
}

/// Log a warning to stderr if both `cfg!(debug_assertions)` and [enabled] are
/// true.
#[macro_export]
macro_rules! debug_log_warning {
    ($($arg:tt)*) => {{
        $crate::__debug_log!($crate::debug_log::Level::Warning, $($arg)*);
    }};
}

/// Log an error to stderr if both `cfg!(debug_assertions)` and [enabled] are
/// true.
///
/// If [panic_on_errors::enabled] is also true, the thread panics after the
/// message is written. This is how invariant violations (e.g. two buffers that
/// should always share dimensions) become fatal in debug builds while only
/// dropping the offending frame in release builds.
#[macro_export]
macro_rules! debug_log_error {
    ($($arg:tt)*) => {{
        $crate::__debug_log!($crate::debug_log::Level::Error, $($arg)*);

        #[cfg(debug_assertions)]
        if $crate::debug_log::enabled() && $crate::debug_log::panic_on_errors::enabled() {
            panic!("Panicking on error logging enabled.");
        }
    }};
}

/// Shared body of the `debug_log_*` macros. Not part of the public API.
#[doc(hidden)]
#[macro_export]
macro_rules! __debug_log {
    ($level:expr, $($arg:tt)*) => {{
        #[cfg(debug_assertions)]
        if $crate::debug_log::enabled() {
            let level: $crate::debug_log::Level = $level;
            let message = format!($($arg)*);
            $crate::debug_log::write_line(level, ::std::module_path!(), &message);
        }
    }};
}

/// How serious a logged message is. Decides the output stream and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Info,
    Warning,
    Error,
}

impl Level {
    /// ANSI color escape used for the level tag.
    const fn color(self) -> &'static str {
        match self {
            Level::Info => "\x1b[35m",
            Level::Warning => "\x1b[33m",
            Level::Error => "\x1b[31m",
        }
    }

    /// Info goes to stdout, everything else goes to stderr.
    const fn uses_stderr(self) -> bool {
        !matches!(self, Level::Info)
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
        })
    }
}

/// Write one formatted log entry. Called by the `debug_log_*` macros, which
/// have already checked [enabled].
#[track_caller]
pub fn write_line(level: Level, module: &str, message: &str) {
    use std::io::IsTerminal;

    let is_terminal = if level.uses_stderr() {
        std::io::stderr().is_terminal()
    } else {
        std::io::stdout().is_terminal()
    };
    let (blue, color, reset_color) = if is_terminal {
        ("\x1b[34m", level.color(), "\x1b[0m")
    } else {
        ("", "", "")
    };

    let where_and_when = where_and_when(blue, reset_color);
    let line = format!(
        "{blue}DEBUG LOG{reset_color} [{color}{level}{reset_color}] {module}: {message}\n{where_and_when}"
    );

    if level.uses_stderr() {
        eprintln!("{line}");
    } else {
        println!("{line}");
    }
}

/// Whether logging is enabled or not.
///
/// Logging cannot be enabled when `cfg!(debug_assertions)` is false, otherwise
/// it's enabled by default.
#[inline(always)]
pub fn enabled() -> bool {
    #[cfg(not(debug_assertions))]
    #[inline(always)]
    fn enabled_impl() -> bool {
        false
    }

    #[cfg(debug_assertions)]
    #[inline(always)]
    fn enabled_impl() -> bool {
        ENABLED.load(Ordering::Relaxed)
    }

    enabled_impl()
}

/// Disable logging.
#[inline(always)]
pub fn disable() {
    #[cfg(debug_assertions)]
    ENABLED.store(false, Ordering::Relaxed);
}

/// The location of the caller, the time this was called, and the executable
/// (argv), all as strings.
///
/// This function gets called through the debug log macros (e.g.
/// [debug_log_info]) and generally shouldn't be called directly.
#[track_caller]
pub fn where_and_when(color: &str, reset_color: &str) -> String {
    let now = OffsetDateTime::now_utc();

    let loc = Location::caller();
    let where_ = format!("{}:{}:{}", loc.file(), loc.line(), loc.column());

    let when = now
        .format(&Rfc3339)
        .unwrap_or_else(|e| format!("Unknown time: {e}"));

    let exec = std::env::args().collect::<Vec<_>>().join(" ");

    format!("\tWhere: {color}{where_}{reset_color}\n")
        + format!("\tTime:  {color}{when}{reset_color}\n").as_str()
        + format!("\tExec.: {color}{exec}{reset_color}").as_str()
}

#[cfg(debug_assertions)]
static ENABLED: AtomicBool = AtomicBool::new(true);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_are_ordered_by_severity() {
        assert!(Level::Info < Level::Warning);
        assert!(Level::Warning < Level::Error);
        assert_eq!(Level::Warning.to_string(), "WARNING");
    }

    #[test]
    fn where_and_when_names_this_file() {
        let s = where_and_when("", "");
        assert!(s.contains("debug_log.rs"), "unexpected location: {s}");
        assert!(s.contains("Time:"));
    }
}
