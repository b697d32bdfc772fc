use serde::Deserialize;

use crate::core::Vec3;

/// Items added per growth step of the fixed-layout reports
pub const DEFAULT_REPORT_CHUNK: usize = 50;
/// Largest accepted growth step; larger requests are cut down to it
pub const MAX_REPORT_CHUNK: usize = 1 << 16;
/// Kernel sub-step when the controller does not pick one
pub const DEFAULT_FIXED_TIME_STEP: f32 = 1.0 / 60.0;

/// World settings carried by `makeWorld` / `init`
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldConfig {
    /// Report chunk size (in items)
    #[serde(default = "default_report_chunk", rename = "reportsize")]
    pub report_chunk: usize,
    #[serde(default = "default_fixed_time_step")]
    pub fixed_time_step: f32,
    /// Enables the soft/rigid world and the soft-body report
    #[serde(default)]
    pub softbody: bool,
    #[serde(default)]
    pub broadphase: BroadphaseConfig,
    #[serde(default)]
    pub gravity: Option<Vec3>,
    /// Send `commandFailed` events besides logging failures
    #[serde(default)]
    pub report_errors: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            report_chunk: DEFAULT_REPORT_CHUNK,
            fixed_time_step: DEFAULT_FIXED_TIME_STEP,
            softbody: false,
            broadphase: BroadphaseConfig::default(),
            gravity: None,
            report_errors: false,
        }
    }
}

impl WorldConfig {
    pub fn from_json(json: &str) -> Result<Self, String> {
        serde_json::from_str(json).map_err(|e| e.to_string())
    }

    /// Clamp values the kernel cannot work with
    pub(crate) fn sanitized(mut self) -> Self {
        if self.report_chunk == 0 {
            self.report_chunk = DEFAULT_REPORT_CHUNK;
        }
        self.report_chunk = self.report_chunk.min(MAX_REPORT_CHUNK);
        if !(self.fixed_time_step > 0.0) {
            self.fixed_time_step = DEFAULT_FIXED_TIME_STEP;
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BroadphaseConfig {
    /// Dynamic AABB tree
    Dynamic,
    /// Sweep-and-prune over a bounded region
    Sweepprune {
        #[serde(default = "default_aabb_min")]
        aabbmin: Vec3,
        #[serde(default = "default_aabb_max")]
        aabbmax: Vec3,
    },
}

impl Default for BroadphaseConfig {
    fn default() -> Self {
        BroadphaseConfig::Dynamic
    }
}

fn default_report_chunk() -> usize {
    DEFAULT_REPORT_CHUNK
}

fn default_fixed_time_step() -> f32 {
    DEFAULT_FIXED_TIME_STEP
}

fn default_aabb_min() -> Vec3 {
    Vec3::new(-50.0, -50.0, -50.0)
}

fn default_aabb_max() -> Vec3 {
    Vec3::new(50.0, 50.0, 50.0)
}
