pub mod sampler;

pub use sampler::{build_session, sampler_task, FirmwareSession};
