//! Small, connection-independent building blocks shared by the rest of
//! the crate.

pub mod fd;
pub mod queue;
pub mod x11rb;
