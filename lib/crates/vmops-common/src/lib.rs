pub mod request;
pub mod types;

pub use request::{
    AdapterType, DiskType, ImageSpec, NetworkInterface, ProvisionRequest, DEFAULT_OS_TYPE,
};
pub use types::*;
