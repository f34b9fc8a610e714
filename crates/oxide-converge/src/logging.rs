//! Log verbosity and subscriber setup.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::FmtSubscriber;

/// How much the tool reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Verbosity {
    /// Nothing at all.
    Quiet,
    /// Warnings and errors.
    #[default]
    Normal,
    /// Task progress.
    Verbose,
    /// Every executed statement.
    Debug,
}

impl Verbosity {
    /// Maps the number of `-v` flags to a verbosity.
    #[must_use]
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Returns the maximum level that is logged.
    #[must_use]
    pub fn level_filter(self) -> LevelFilter {
        match self {
            Self::Quiet => LevelFilter::OFF,
            Self::Normal => LevelFilter::WARN,
            Self::Verbose => LevelFilter::INFO,
            Self::Debug => LevelFilter::DEBUG,
        }
    }
}

/// Installs the global subscriber writing to stderr.
pub fn init(verbosity: Verbosity) -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(verbosity.level_filter())
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}
