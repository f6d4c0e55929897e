//! Host-facing components built per call around a [`CommandRunner`](crate::exec::CommandRunner)

mod zfs;
mod zone;

pub use zfs::{DatasetManager, DISK_QUOTA, DISK_RESERVATION};
pub use zone::Zone;
