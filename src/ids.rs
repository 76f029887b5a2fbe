// Dense identifiers assigned by the Compositor (C4)
//
// Plain newtypes rather than an entity-component table - a monotonic
// dense u32 per surface/output is all that's needed here, simpler
// than an ECS-style table with its own id indirection.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutputId(pub u32);

/// Monotonic 32-bit counter used to correlate client/server
/// request-response pairs (configure/ack_configure, etc). Wrap-around
/// is not handled - consumers treat serials opaquely, per spec §4.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Serial(pub u32);
