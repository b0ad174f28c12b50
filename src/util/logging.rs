use std::{
    collections::HashMap,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use once_cell::sync::Lazy;

static LOGGER_CONFIG: Lazy<RwLock<LoggingConfig>> =
    Lazy::new(|| RwLock::new(LoggingConfig::default()));

#[derive(Copy, Clone, Debug, PartialEq, PartialOrd)]
pub enum LogLevel {
    INFO,
    VERBOSE,
}

#[macro_export]
macro_rules! logln {
    ($fmt:literal) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            println!("[{}] {}", Self::CC, $fmt);
        }
    };
    ($fmt:literal, $($arg:tt)*) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            print!("[{}] ", Self::CC);
            println!($fmt, $($arg)*);
        }
    };
}

// Same-line output, each call overwrites the previous one.
#[macro_export]
macro_rules! logsl {
    ($fmt:literal) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            print!("\r[{}] {}", Self::CC, $fmt);
            let _ = std::io::Write::flush(&mut std::io::stdout());
        }
    };
    ($fmt:literal, $($arg:tt)*) => {
        if $crate::util::logging::is_enabled(Self::CC) {
            print!("\r[{}] ", Self::CC);
            print!($fmt, $($arg)*);
            let _ = std::io::Write::flush(&mut std::io::stdout());
        }
    }
}

#[macro_export]
macro_rules! logvbln {
    ($fmt:literal) => {
        if $crate::util::logging::is_enabled(Self::CC)
            && $crate::util::logging::is_at_level(Self::CC, $crate::util::logging::LogLevel::VERBOSE)
        {
            println!("[{}] {}", Self::CC, $fmt);
        }
    };
    ($fmt:literal, $($arg:tt)*) => {
        if $crate::util::logging::is_enabled(Self::CC)
            && $crate::util::logging::is_at_level(Self::CC, $crate::util::logging::LogLevel::VERBOSE)
        {
            print!("[{}] ", Self::CC);
            println!($fmt, $($arg)*);
        }
    }
}

// A poisoned lock only means a panic happened while logging; the flags are still usable.
fn config() -> RwLockReadGuard<'static, LoggingConfig> {
    LOGGER_CONFIG
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn config_mut() -> RwLockWriteGuard<'static, LoggingConfig> {
    LOGGER_CONFIG
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn is_enabled(cc: &'static str) -> bool {
    config().cc_enabled(cc)
}

pub fn is_at_level(cc: &'static str, level: LogLevel) -> bool {
    config().cc_at_level(cc, level)
}

/// Silences one component regardless of the global level.
pub fn disable_cc(cc: &str) {
    config_mut().disable_cc(cc);
}

pub fn enable_cc(cc: &str, level: LogLevel) {
    config_mut().enable_cc(cc, level);
}

pub fn set_global_logging(enabled: bool) {
    if enabled {
        config_mut().enable_global_tracing();
    } else {
        config_mut().disable_global_tracing();
    }
}

pub fn set_global_level(level: LogLevel) {
    config_mut().set_global_level(level);
}

pub struct LoggingConfig {
    global_tracing_enabled: bool,
    global_level: LogLevel,
    flags: HashMap<String, (bool, LogLevel)>, // <component, (tracing enabled, trace level)>
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_tracing_enabled: true,
            global_level: LogLevel::INFO,
            flags: Default::default(),
        }
    }
}

impl LoggingConfig {
    pub fn cc_enabled(&self, cc: &str) -> bool {
        if !self.global_tracing_enabled {
            return false;
        }

        self.flags.get(cc).map_or(true, |(enabled, _)| *enabled)
    }

    pub fn cc_at_level(&self, cc: &str, level: LogLevel) -> bool {
        if self.global_level >= level {
            return true;
        }

        self.flags
            .get(cc)
            .map_or(false, |(_, cc_level)| *cc_level >= level)
    }

    pub fn enable_cc(&mut self, cc: &str, level: LogLevel) {
        self.flags.insert(cc.to_string(), (true, level));
    }

    pub fn disable_cc(&mut self, cc: &str) {
        self.flags.insert(cc.to_string(), (false, LogLevel::INFO));
    }

    pub fn enable_global_tracing(&mut self) {
        self.global_tracing_enabled = true;
    }

    pub fn disable_global_tracing(&mut self) {
        self.global_tracing_enabled = false;
    }

    pub fn set_global_level(&mut self, level: LogLevel) {
        self.global_level = level;
    }
}
