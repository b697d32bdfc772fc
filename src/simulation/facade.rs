use js_sys::{Float32Array, JSON};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

use crate::kernel::ReferenceKernel;
use crate::transport::PostMessageTransport;

use super::perf_stats::PerfStats;
use super::WorkerCore;

/// Worker entry point. The JS shim forwards every `onmessage` payload here.
#[wasm_bindgen]
pub struct PhysicsWorker {
    core: WorkerCore<ReferenceKernel, PostMessageTransport>,
}

#[wasm_bindgen]
impl PhysicsWorker {
    /// Bind to the worker scope; fails outside a dedicated worker
    #[wasm_bindgen(constructor)]
    pub fn new() -> Result<PhysicsWorker, JsValue> {
        let transport = PostMessageTransport::new()?;
        Ok(Self {
            core: WorkerCore::new(ReferenceKernel::new(), transport),
        })
    }

    /// A `Float32Array` is a returned report buffer; anything else is a `{ cmd, params }` message
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&mut self, data: JsValue) -> Result<(), JsValue> {
        if let Some(array) = data.dyn_ref::<Float32Array>() {
            self.core.reclaim_report(array.to_vec());
            return Ok(());
        }
        let text: String = JSON::stringify(&data)?.into();
        self.core.handle_json(&text);
        Ok(())
    }

    #[wasm_bindgen(getter)]
    pub fn frame(&self) -> u64 { self.core.frame() }

    #[wasm_bindgen(getter)]
    pub fn object_count(&self) -> usize { self.core.objects().len() }

    #[wasm_bindgen(getter)]
    pub fn world_ready(&self) -> bool { self.core.is_world_ready() }

    #[wasm_bindgen(getter)]
    pub fn supports_transfer(&self) -> bool {
        use crate::transport::Transport;
        self.core.transport().supports_transfer()
    }

    /// Enable or disable per-step perf metrics (adds timing overhead when enabled)
    pub fn enable_perf_metrics(&mut self, enabled: bool) {
        self.core.enable_perf_metrics(enabled);
    }

    /// Get last step perf snapshot (zeros when perf disabled)
    pub fn get_perf_stats(&self) -> PerfStats {
        self.core.get_perf_stats()
    }
}
