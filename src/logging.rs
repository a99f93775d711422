use std::io::Write;
use std::str::FromStr;

use chrono::Local;
use env_logger::{Builder, Env};
use log::{LevelFilter, SetLoggerError};

/// Parses a level name, falling back to `Info` for anything unknown.
pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level).unwrap_or(LevelFilter::Info)
}

fn builder(level: LevelFilter) -> Builder {
    // RUST_LOG wins over the configured level
    let mut builder = Builder::new();
    builder.filter_level(level);
    builder.parse_env(Env::default());
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{} [{}] {}: {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            record.level(),
            record.target(),
            record.args()
        )
    });
    builder
}

/// Installs the global logger. Fails if one is already set.
pub fn init(level: &str) -> Result<(), SetLoggerError> {
    builder(parse_level(level)).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("WARN"), LevelFilter::Warn);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("loud"), LevelFilter::Info);
    }

    #[test]
    fn second_init_fails() {
        let _ = init("info");
        assert!(init("debug").is_err());
    }
}
