//! Pattern-formatted logger behind the `log` facade.
//!
//! Engine-internal messages use the `levikno` target (the core logger);
//! everything else is client logging. The output line format is driven by
//! a printf-style pattern string, e.g. the default
//! `"[%Y-%m-%d] [%T] [%#%l%^] %n: %v%$"`:
//!
//! | symbol | meaning |
//! |---|---|
//! | `%v` | message | `%n` | logger name (target) |
//! | `%l` | level name | `%#` / `%^` | level color begin / reset |
//! | `%T` | HH:MM:SS (24h) | `%Y` `%m` `%d` | date parts |
//! | `%H` `%M` `%S` | time parts | `%$` | newline | `%%` | percent |

use std::io::Write;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{Level, LevelFilter};

pub const DEFAULT_LOG_PATTERN: &str = "[%Y-%m-%d] [%T] [%#%l%^] %n: %v%$";

/// Target used by every engine-internal log statement.
pub const CORE_LOG_TARGET: &str = "levikno";

/// Logging switches passed at context creation.
#[derive(Clone, Debug)]
pub struct LoggingInfo {
    pub enable_logging: bool,
    pub disable_core_logging: bool,
    /// Requests API validation layers from the backend (Vulkan).
    pub enable_validation_layers: bool,
    /// Overrides [`DEFAULT_LOG_PATTERN`].
    pub log_pattern_format: Option<String>,
    pub max_level: LevelFilter,
}

impl Default for LoggingInfo {
    fn default() -> Self {
        LoggingInfo {
            enable_logging: false,
            disable_core_logging: false,
            enable_validation_layers: false,
            log_pattern_format: None,
            max_level: LevelFilter::Trace,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
enum LogPattern {
    Literal(String),
    Newline,
    Name,
    Level,
    ColorBegin,
    ColorReset,
    Message,
    Time24,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
}

fn parse_format(fmt: &str) -> Vec<LogPattern> {
    let mut patterns = Vec::new();
    let mut literal = String::new();
    let mut chars = fmt.chars();

    while let Some(c) = chars.next() {
        if c != '%' {
            literal.push(c);
            continue;
        }
        let Some(symbol) = chars.next() else { break };
        let pattern = match symbol {
            '$' => LogPattern::Newline,
            'n' => LogPattern::Name,
            'l' => LogPattern::Level,
            '#' => LogPattern::ColorBegin,
            '^' => LogPattern::ColorReset,
            'v' => LogPattern::Message,
            'T' => LogPattern::Time24,
            'Y' => LogPattern::Year,
            'm' => LogPattern::Month,
            'd' => LogPattern::Day,
            'H' => LogPattern::Hour,
            'M' => LogPattern::Minute,
            'S' => LogPattern::Second,
            '%' => {
                literal.push('%');
                continue;
            }
            other => {
                // unknown symbols pass through verbatim
                literal.push('%');
                literal.push(other);
                continue;
            }
        };
        if !literal.is_empty() {
            patterns.push(LogPattern::Literal(std::mem::take(&mut literal)));
        }
        patterns.push(pattern);
    }
    if !literal.is_empty() {
        patterns.push(LogPattern::Literal(literal));
    }
    patterns
}

fn level_color(level: Level) -> &'static str {
    match level {
        Level::Trace => "\x1b[0;37m",
        Level::Debug => "\x1b[0;36m",
        Level::Info => "\x1b[0;32m",
        Level::Warn => "\x1b[1;33m",
        Level::Error => "\x1b[1;31m",
    }
}

const COLOR_RESET: &str = "\x1b[0m";

/// (year, month, day) from days since the Unix epoch.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    let year = yoe as i64 + era * 400 + if month <= 2 { 1 } else { 0 };
    (year, month, day)
}

struct Timestamp {
    year: i64,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

fn timestamp() -> Timestamp {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let (year, month, day) = civil_from_days(secs.div_euclid(86_400));
    let tod = secs.rem_euclid(86_400) as u32;
    Timestamp {
        year,
        month,
        day,
        hour: tod / 3600,
        minute: (tod / 60) % 60,
        second: tod % 60,
    }
}

struct PatternLogger {
    patterns: Vec<LogPattern>,
    suppress_core: bool,
    max_level: LevelFilter,
}

impl PatternLogger {
    fn format(&self, record: &log::Record) -> String {
        let ts = timestamp();
        let mut out = String::with_capacity(96);
        for pattern in &self.patterns {
            match pattern {
                LogPattern::Literal(s) => out.push_str(s),
                LogPattern::Newline => out.push('\n'),
                LogPattern::Name => out.push_str(record.target()),
                LogPattern::Level => out.push_str(match record.level() {
                    Level::Trace => "trace",
                    Level::Debug => "debug",
                    Level::Info => "info",
                    Level::Warn => "warn",
                    Level::Error => "error",
                }),
                LogPattern::ColorBegin => out.push_str(level_color(record.level())),
                LogPattern::ColorReset => out.push_str(COLOR_RESET),
                LogPattern::Message => {
                    use std::fmt::Write as _;
                    let _ = write!(out, "{}", record.args());
                }
                LogPattern::Time24 => {
                    use std::fmt::Write as _;
                    let _ = write!(out, "{:02}:{:02}:{:02}", ts.hour, ts.minute, ts.second);
                }
                LogPattern::Year => {
                    use std::fmt::Write as _;
                    let _ = write!(out, "{:04}", ts.year);
                }
                LogPattern::Month => {
                    use std::fmt::Write as _;
                    let _ = write!(out, "{:02}", ts.month);
                }
                LogPattern::Day => {
                    use std::fmt::Write as _;
                    let _ = write!(out, "{:02}", ts.day);
                }
                LogPattern::Hour => {
                    use std::fmt::Write as _;
                    let _ = write!(out, "{:02}", ts.hour);
                }
                LogPattern::Minute => {
                    use std::fmt::Write as _;
                    let _ = write!(out, "{:02}", ts.minute);
                }
                LogPattern::Second => {
                    use std::fmt::Write as _;
                    let _ = write!(out, "{:02}", ts.second);
                }
            }
        }
        out
    }
}

impl log::Log for PatternLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        if metadata.level() > self.max_level {
            return false;
        }
        !(self.suppress_core && metadata.target().starts_with(CORE_LOG_TARGET))
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = self.format(record);
        let mut stdout = std::io::stdout().lock();
        let _ = stdout.write_all(line.as_bytes());
    }

    fn flush(&self) {
        let _ = std::io::stdout().lock().flush();
    }
}

/// Installs the process-global logger. Logging is process-wide; if another
/// logger is already installed this silently keeps it (the `log` facade
/// allows one logger per process).
pub(crate) fn log_init(info: &LoggingInfo) {
    let pattern = info
        .log_pattern_format
        .as_deref()
        .unwrap_or(DEFAULT_LOG_PATTERN);
    let logger = PatternLogger {
        patterns: parse_format(pattern),
        suppress_core: info.disable_core_logging,
        max_level: info.max_level,
    };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(info.max_level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_the_default_pattern() {
        let patterns = parse_format(DEFAULT_LOG_PATTERN);
        assert!(patterns.contains(&LogPattern::Message));
        assert!(patterns.contains(&LogPattern::Level));
        assert!(patterns.contains(&LogPattern::ColorBegin));
        assert_eq!(patterns.last(), Some(&LogPattern::Newline));
    }

    #[test]
    fn unknown_symbols_pass_through() {
        let patterns = parse_format("a%zb%%c");
        assert_eq!(patterns, vec![LogPattern::Literal("a%zb%c".to_string())]);
    }

    #[test]
    fn civil_date_roundtrip() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
        assert_eq!(civil_from_days(19_723), (2024, 1, 1));
        assert_eq!(civil_from_days(-1), (1969, 12, 31));
    }
}
