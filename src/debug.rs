use log::LevelFilter;

/// Verbosity of the loader's diagnostic output.
///
/// Levels are ordered: a loader set to [`DebugLevel::Warning`] also emits
/// errors, and [`DebugLevel::Info`] emits everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DebugLevel {
    /// No diagnostics.
    #[default]
    None,
    Error,
    Warning,
    /// Every step of loading, relocation and lookup.
    Info,
}

impl DebugLevel {
    /// Name used in diagnostic output.
    pub const fn as_str(self) -> &'static str {
        match self {
            DebugLevel::None => "n/a",
            DebugLevel::Error => "error",
            DebugLevel::Warning => "warning",
            DebugLevel::Info => "info",
        }
    }

    /// The `log` filter equivalent to this level.
    ///
    /// Handy for configuring a logger that only forwards what the loader emits.
    pub const fn to_level_filter(self) -> LevelFilter {
        match self {
            DebugLevel::None => LevelFilter::Off,
            DebugLevel::Error => LevelFilter::Error,
            DebugLevel::Warning => LevelFilter::Warn,
            DebugLevel::Info => LevelFilter::Info,
        }
    }
}
