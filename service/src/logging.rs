use crate::config::{Config, RustEnv};
use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode};

/// Modules to filter out from logging when not in Trace mode.
/// These are typically verbose dependencies that clutter normal log output.
const FILTERED_MODULES: &[&str] = &["reqwest", "hyper", "hyper_util", "rustls", "h2", "tokio"];

/// How log lines are rendered on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct LogSettings {
    level: LevelFilter,
    filter_dependencies: bool,
    /// Interactive development runs skip timestamps.
    timestamps: bool,
    color: ColorChoice,
}

impl LogSettings {
    fn from_config(config: &Config) -> Self {
        let level = config.log_level_filter;
        Self {
            level,
            filter_dependencies: level != LevelFilter::Trace,
            timestamps: config.runtime_env() != RustEnv::Development,
            color: if config.is_production() {
                ColorChoice::Never
            } else {
                ColorChoice::Auto
            },
        }
    }

    fn log_config(&self) -> simplelog::Config {
        let mut builder = ConfigBuilder::new();
        if self.timestamps {
            builder.set_time_format_rfc3339();
        } else {
            builder.set_time_level(LevelFilter::Off);
        }
        // Module paths from Debug up.
        if self.level < LevelFilter::Debug {
            builder.set_target_level(LevelFilter::Off);
        }

        if self.filter_dependencies {
            for module in FILTERED_MODULES {
                builder.add_filter_ignore_str(module);
            }
        }

        builder.build()
    }
}

pub struct Logger {}

impl Logger {
    /// Initializes the global logger on stderr.
    ///
    /// When the log level is set to Trace, all logs including dependency logs
    /// are shown. Production runs log without colors, and any non-development
    /// run stamps each line with an RFC 3339 time.
    pub fn init_logger(config: &Config) {
        let settings = LogSettings::from_config(config);

        if let Err(e) = TermLogger::init(
            settings.level,
            settings.log_config(),
            TerminalMode::Stderr,
            settings.color,
        ) {
            // A logger is already installed; keep it.
            log::debug!("Logger already initialized: {e}");
        }
    }
}
