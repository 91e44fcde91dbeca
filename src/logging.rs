//! Log setup for the binary.
//!
//! Lines look like `2024-05-01T10:00:00Z [INFO] : store => opened ...`. The
//! title is the explicit log target; records logged under the default module
//! target print the message alone. Output goes to stderr and, optionally, to a
//! log file as well.

use env_logger::{Builder, Target};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

pub const LOG_ENV: &str = "DIR2DB_LOG";

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub default_level: Option<log::LevelFilter>,
    pub file: Option<PathBuf>,
    pub append: bool,
}

pub fn init(options: &LogOptions) -> anyhow::Result<()> {
    use anyhow::Context;

    let level = options.default_level.unwrap_or(log::LevelFilter::Info);
    let mut builder = Builder::new();
    builder.filter_level(level);
    if let Ok(spec) = std::env::var(LOG_ENV) {
        builder.parse_filters(&spec);
    }

    let file = match options.file.as_deref() {
        Some(path) => Some(
            open_log_file(path, options.append)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?,
        ),
        None => None,
    };
    builder.target(Target::Pipe(Box::new(Tee { file })));

    builder.format(|buf, record| {
        let title = title_of(record.target(), record.module_path());
        match title {
            Some(title) => writeln!(
                buf,
                "{} [{}] : {title} => {}",
                buf.timestamp(),
                record.level(),
                record.args()
            ),
            None => writeln!(buf, "{} [{}] : {}", buf.timestamp(), record.level(), record.args()),
        }
    });

    builder
        .try_init()
        .context("Failed to install logger (already initialised?)")?;
    Ok(())
}

/// An explicit target is a title; the implicit module-path target is not.
fn title_of<'a>(target: &'a str, module_path: Option<&str>) -> Option<&'a str> {
    if target.is_empty() || Some(target) == module_path {
        None
    } else {
        Some(target)
    }
}

fn open_log_file(path: &Path, append: bool) -> io::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut options = OpenOptions::new();
    options.create(true);
    if append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options.open(path)
}

/// stderr plus an optional file.
struct Tee {
    file: Option<File>,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        if let Some(file) = self.file.as_mut() {
            file.write_all(buf)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
        }
        Ok(())
    }
}

/// Logs `'<name>' took <secs> seconds` when dropped or finished.
pub struct PhaseTimer {
    name: &'static str,
    start: Instant,
    reported: bool,
}

impl PhaseTimer {
    pub fn start(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
            reported: false,
        }
    }

    pub fn finish(mut self) -> u64 {
        self.report()
    }

    fn report(&mut self) -> u64 {
        let elapsed = self.start.elapsed();
        if !self.reported {
            self.reported = true;
            log::info!(target: "timing", "'{}' took {:.2} seconds", self.name, elapsed.as_secs_f64());
        }
        u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        self.report();
    }
}
