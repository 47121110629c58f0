//! Typed GPU buffers built on the device seam.

mod constant_buffer;
mod mapped;
mod structured_buffer;

pub use constant_buffer::ConstantBuffer;
pub use mapped::MappedWrite;
pub use structured_buffer::StructuredBuffer;
