use js_sys::{Array, ArrayBuffer, Float32Array, Object, Reflect, JSON};
use log::warn;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::DedicatedWorkerGlobalScope;

use super::{Outbound, Transport};

/// `postMessage` on the worker's global scope
pub struct PostMessageTransport {
    scope: DedicatedWorkerGlobalScope,
    transfer: bool,
}

impl PostMessageTransport {
    /// Bind to the current worker scope and probe transfer support
    pub fn new() -> Result<Self, JsValue> {
        let scope: DedicatedWorkerGlobalScope = js_sys::global().dyn_into()?;
        let transfer = probe_transfer(&scope);
        Ok(Self { scope, transfer })
    }

    fn post(&self, value: &JsValue, transfer: Option<&JsValue>) {
        let result = match transfer {
            Some(t) => self.scope.post_message_with_transfer(value, &Array::of1(t)),
            None => self.scope.post_message(value),
        };
        if let Err(e) = result {
            warn!("postMessage failed: {:?}", e);
        }
    }
}

/// A transferred buffer is detached on the sending side
fn probe_transfer(scope: &DedicatedWorkerGlobalScope) -> bool {
    let probe = ArrayBuffer::new(1);
    if scope
        .post_message_with_transfer(&probe, &Array::of1(&probe))
        .is_err()
    {
        return false;
    }
    probe.byte_length() == 0
}

impl Transport for PostMessageTransport {
    fn supports_transfer(&self) -> bool {
        self.transfer
    }

    fn send(&mut self, message: Outbound) {
        match message {
            Outbound::Event { cmd, params } => {
                let msg = Object::new();
                let _ = Reflect::set(&msg, &"cmd".into(), &cmd.into());
                if let Some(params) = params {
                    let value = JSON::parse(&params.to_string()).unwrap_or(JsValue::NULL);
                    let _ = Reflect::set(&msg, &"params".into(), &value);
                }
                self.post(&msg, None);
            }
            Outbound::Report(buf) => {
                let buffer: JsValue = Float32Array::from(buf.as_slice()).buffer().into();
                self.post(&buffer, Some(&buffer));
            }
            Outbound::ReportCopy(data) => {
                let array = Float32Array::from(data.as_slice());
                self.post(&array, None);
            }
        }
    }
}
