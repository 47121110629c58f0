//! Tiled light culling: per-tile frustums built on the GPU and the light set
//! they are tested against.

mod dispatch;
mod frustum;
mod frustum_cs;
mod light;
mod projection;

pub use dispatch::{DispatchParameters, DispatchParamsUniform};
pub use frustum::{Frustum, Plane, PlaneSide, ScreenToView, ScreenToViewUniform};
pub use frustum_cs::{
    DISPATCH_PARAMS_SLOT, FRUSTUM_OUTPUT_SLOT, FrustumComputeShader, FrustumGeneration,
    SCREEN_TO_VIEW_SLOT,
};
pub use light::{GpuLight, Light, LightKind, LightList, LightListFull, MAX_LIGHTS};
pub use projection::{ProjectionTracker, ProjectionVersion, VersionedProjection, inverse_perspective};
