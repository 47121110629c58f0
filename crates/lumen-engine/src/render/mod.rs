//! Graphics passes and the per-frame orchestration around the frustum compute
//! pass.

mod depth_pass;
mod forward_plus;
mod light_shader;
mod uniforms;

pub use depth_pass::DepthPrePass;
pub use forward_plus::{ForwardPlusRenderer, FrameInputs, FrameReport};
pub use light_shader::{FRUSTUM_SLOT, LIGHT_SLOT, LightShader, LightShaderParams};
pub use uniforms::{MatrixUniform, ShadingUniform};
