use log::Level;

/// Tagged logger. The tag becomes the `log` target so `RUST_LOG=Render=debug` works.
#[derive(Clone, Copy)]
pub struct Logger {
    tag: &'static str,
}

impl Logger {
    pub const fn new(tag: &'static str) -> Self {
        Self { tag }
    }

    #[inline]
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    #[inline]
    pub fn info(&self, msg: impl AsRef<str>) {
        self.print(Level::Info, msg.as_ref());
    }

    #[inline]
    pub fn debug(&self, msg: impl AsRef<str>) {
        self.print(Level::Debug, msg.as_ref());
    }

    #[inline]
    pub fn warn(&self, msg: impl AsRef<str>) {
        self.print(Level::Warn, msg.as_ref());
    }

    #[inline]
    pub fn error(&self, msg: impl AsRef<str>) {
        self.print(Level::Error, msg.as_ref());
    }

    #[inline]
    pub fn enabled(&self, lvl: Level) -> bool {
        log::log_enabled!(target: self.tag, lvl)
    }

    fn print(&self, lvl: Level, msg: &str) {
        log::log!(target: self.tag, lvl, "{}", msg);
    }
}

/// Install the process logger. Safe to call more than once; later calls are ignored.
///
/// `RUST_LOG` wins over the default filter.
pub fn init(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
        .format_timestamp_millis()
        .try_init();
}
