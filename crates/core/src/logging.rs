//! Categorized logging for the arcade core.
//!
//! Every board component logs through [`log`] with a category and a level.
//! Levels are stored in atomics so the check on a hot path (a bus access,
//! an interrupt poll) is a single relaxed load, and the message closure is
//! never evaluated unless the category is enabled.
//!
//! A category with its own level overrides the global level; a category
//! left at `Off` falls back to the global level.
//!
//! ```rust
//! use arcade_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Bus, LogLevel::Debug, || {
//!     format!("bank switch: {:02X}", 0x05)
//! });
//! ```

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread;

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse a level name or digit (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Board component a message comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// CPU scheduling (slices, resets)
    Cpu,
    /// Address-space dispatch, open bus, bank switching
    Bus,
    /// Video registers, tilemaps, sprites, palette
    Video,
    /// Sound device forwarding
    Sound,
    /// Interrupt enables, assertions, acknowledges
    Interrupts,
    /// Inter-processor latches and MCU ports
    Handshake,
    /// Known ports that are not emulated (watchdog, coin counters)
    Stubs,
}

impl LogCategory {
    const COUNT: usize = 7;

    fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Bus => 1,
            LogCategory::Video => 2,
            LogCategory::Sound => 3,
            LogCategory::Interrupts => 4,
            LogCategory::Handshake => 5,
            LogCategory::Stubs => 6,
        }
    }

    fn tag(self) -> &'static str {
        match self {
            LogCategory::Cpu => "cpu",
            LogCategory::Bus => "bus",
            LogCategory::Video => "video",
            LogCategory::Sound => "sound",
            LogCategory::Interrupts => "irq",
            LogCategory::Handshake => "latch",
            LogCategory::Stubs => "stub",
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; LogCategory::COUNT],
    /// Background writer for the log file, if one is configured
    sink: Mutex<Option<Sender<String>>>,
    file_enabled: AtomicBool,
}

impl LogConfig {
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: std::array::from_fn(|_| AtomicU8::new(LogLevel::Off as u8)),
            sink: Mutex::new(None),
            file_enabled: AtomicBool::new(false),
        }
    }

    /// The process-wide instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// Check if a message at `level` in `category` would be emitted
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        match self.level(category) {
            LogLevel::Off => level <= self.global_level(),
            category_level => level <= category_level,
        }
    }

    /// Reset all levels to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for level in &self.levels {
            level.store(LogLevel::Off as u8, Ordering::Relaxed);
        }
    }

    /// Apply a filter string such as `"warn,bus=trace,irq=debug"`.
    ///
    /// A bare level sets the global level. Unknown entries are ignored.
    pub fn apply_filter(&self, filter: &str) {
        for entry in filter.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                None => {
                    if let Some(level) = LogLevel::parse(entry) {
                        self.set_global_level(level);
                    }
                }
                Some((name, level)) => {
                    let category = ALL_CATEGORIES
                        .iter()
                        .copied()
                        .find(|c| c.tag() == name.trim());
                    if let (Some(category), Some(level)) = (category, LogLevel::parse(level.trim())) {
                        self.set_level(category, level);
                    }
                }
            }
        }
    }

    /// Send output to a file instead of stderr.
    ///
    /// Writes happen on a background thread so a busy category does not
    /// stall emulation. Replaces any previous log file.
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, receiver) = channel::<String>();

        thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                }
                let _ = file.flush();
            })?;

        if let Ok(mut sink) = self.sink.lock() {
            *sink = Some(sender);
            self.file_enabled.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Stop writing to the log file and go back to stderr
    pub fn clear_log_file(&self) {
        if let Ok(mut sink) = self.sink.lock() {
            *sink = None;
        }
        self.file_enabled.store(false, Ordering::Relaxed);
    }

    fn write_message(&self, message: String) {
        if self.file_enabled.load(Ordering::Relaxed) {
            if let Ok(sink) = self.sink.lock() {
                if let Some(sender) = sink.as_ref() {
                    if let Err(failed) = sender.send(message) {
                        eprintln!("{}", failed.0);
                    }
                    return;
                }
            }
        }
        eprintln!("{}", message);
    }
}

const ALL_CATEGORIES: [LogCategory; LogCategory::COUNT] = [
    LogCategory::Cpu,
    LogCategory::Bus,
    LogCategory::Video,
    LogCategory::Sound,
    LogCategory::Interrupts,
    LogCategory::Handshake,
    LogCategory::Stubs,
];

/// Log a lazily formatted message.
///
/// `message_fn` only runs when `category` is enabled at `level`.
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    let config = LogConfig::global();
    if !config.should_log(category, level) {
        return;
    }
    config.write_message(format!("[{:?}] [{}] {}", level, category.tag(), message_fn()));
}
