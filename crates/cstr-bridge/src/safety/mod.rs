//! Allocation bookkeeping for buffers that cross the native boundary.

mod registry;
mod state;

pub use registry::{AllocationMeta, PointerRegistry, RECENT_RELEASES, global_registry};
pub use state::BufferState;
