//! Logger setup for the `log` facade
//!
//! On wasm32 records go to the worker's devtools console (`console.error`,
//! `console.warn`, `console.info`, `console.log` by level). Native hosts use `env_logger`.

use log::LevelFilter;

#[cfg(target_arch = "wasm32")]
mod console {
    use log::{Level, Log, Metadata, Record};

    pub(super) struct ConsoleLogger;

    pub(super) static LOGGER: ConsoleLogger = ConsoleLogger;

    impl Log for ConsoleLogger {
        fn enabled(&self, metadata: &Metadata) -> bool {
            metadata.level() <= log::max_level()
        }

        fn log(&self, record: &Record) {
            if !self.enabled(record.metadata()) {
                return;
            }
            let msg = wasm_bindgen::JsValue::from_str(&format!("[{}] {}", record.target(), record.args()));
            match record.level() {
                Level::Error => web_sys::console::error_1(&msg),
                Level::Warn => web_sys::console::warn_1(&msg),
                Level::Info => web_sys::console::info_1(&msg),
                Level::Debug | Level::Trace => web_sys::console::log_1(&msg),
            }
        }

        fn flush(&self) {}
    }
}

/// Install the logger. Safe to call more than once; only the first call wins.
#[cfg(target_arch = "wasm32")]
pub fn init_logging(level: LevelFilter) {
    if log::set_logger(&console::LOGGER).is_ok() {
        log::set_max_level(level);
    }
}

/// Install the logger. Safe to call more than once; only the first call wins.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_logging(level: LevelFilter) {
    let _ = env_logger::Builder::new().filter_level(level).try_init();
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(LevelFilter::Debug);
        init_logging(LevelFilter::Warn);
        log::debug!("logger installed");
    }
}
