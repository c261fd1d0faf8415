//! ID types for lifecycle resources.

use crate::define_id;

define_id!(
    /// Unique id of a cluster object.
    ClusterId,
    "cl"
);

define_id!(
    /// Unique id of a machine object.
    MachineId,
    "mach"
);

define_id!(
    /// Unique id of a recorded lifecycle event.
    EventId,
    "evt"
);
