//! Wall-clock stopwatch: `Date.now()` in the browser, `Instant` natively

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

pub(crate) struct PerfTimer {
    #[cfg(target_arch = "wasm32")]
    mark_ms: f64,
    #[cfg(not(target_arch = "wasm32"))]
    mark: Instant,
}

impl PerfTimer {
    pub(crate) fn start() -> Self {
        #[cfg(target_arch = "wasm32")]
        return PerfTimer { mark_ms: js_sys::Date::now() };
        #[cfg(not(target_arch = "wasm32"))]
        return PerfTimer { mark: Instant::now() };
    }

    /// Milliseconds since the last mark; moves the mark to now
    pub(crate) fn lap_ms(&mut self) -> f64 {
        #[cfg(target_arch = "wasm32")]
        {
            let now = js_sys::Date::now();
            let elapsed = now - self.mark_ms;
            self.mark_ms = now;
            elapsed
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            let now = Instant::now();
            let elapsed = now.duration_since(self.mark).as_secs_f64() * 1000.0;
            self.mark = now;
            elapsed
        }
    }
}
