//! Monitoring layer: periodic memory sampling of the cgroup
//!
//! The sampler owns the recorded series on its own thread and gives it up
//! exactly once, by value, when shut down.

pub mod clock;
pub mod sampler;
pub mod series;

pub use clock::{Clock, SystemClock};
pub use sampler::{Sampler, SamplerState};
pub use series::{Record, SeriesSnapshot};
