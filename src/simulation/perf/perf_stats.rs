use wasm_bindgen::prelude::*;

/// Snapshot of the last `simulate` call
#[wasm_bindgen]
#[derive(Clone, Debug, Default)]
pub struct PerfStats {
    pub(super) step_ms: f64,
    pub(super) report_ms: f64,
    pub(super) sub_steps: u32,
    pub(super) rigid_bodies: u32,
    pub(super) soft_bodies: u32,
    pub(super) manifolds: u32,
    pub(super) reports_sent: u32,
}

impl PerfStats {
    pub(crate) fn reset(&mut self) {
        *self = PerfStats::default();
    }
}

#[wasm_bindgen]
impl PerfStats {
    /// Kernel stepping time
    #[wasm_bindgen(getter)]
    pub fn step_ms(&self) -> f64 { self.step_ms }
    /// Time spent encoding and sending all reports
    #[wasm_bindgen(getter)]
    pub fn report_ms(&self) -> f64 { self.report_ms }
    #[wasm_bindgen(getter)]
    pub fn sub_steps(&self) -> u32 { self.sub_steps }
    #[wasm_bindgen(getter)]
    pub fn rigid_bodies(&self) -> u32 { self.rigid_bodies }
    #[wasm_bindgen(getter)]
    pub fn soft_bodies(&self) -> u32 { self.soft_bodies }
    #[wasm_bindgen(getter)]
    pub fn manifolds(&self) -> u32 { self.manifolds }
    #[wasm_bindgen(getter)]
    pub fn reports_sent(&self) -> u32 { self.reports_sent }
}
