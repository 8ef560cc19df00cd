/// Emit a diagnostic through `log` when the loader's debug level admits it.
///
/// ```ignore
/// diag!(self.level, Info, "copied {} bytes", len);
/// ```
macro_rules! diag {
    (@emit $level:expr, $min:ident, $log:ident, $($arg:tt)+) => {
        if $level >= $crate::DebugLevel::$min {
            log::log!(target: "mlink", log::Level::$log, $($arg)+);
        }
    };
    ($level:expr, Error, $($arg:tt)+) => {
        diag!(@emit $level, Error, Error, $($arg)+)
    };
    ($level:expr, Warning, $($arg:tt)+) => {
        diag!(@emit $level, Warning, Warn, $($arg)+)
    };
    ($level:expr, Info, $($arg:tt)+) => {
        diag!(@emit $level, Info, Info, $($arg)+)
    };
}
