//! Invertible document steps, position mapping and the [`Transform`] builder.

/// Error types.
pub mod error;
/// Position maps.
pub mod map;
/// Mark transforms.
pub mod mark;
/// Step decoding by tag.
pub mod registry;
/// Best-fit replacement.
pub mod replace;
/// Atomic document changes.
pub mod step;
/// Structural queries and transforms.
pub mod structure;
mod transform;

pub use error::{RegistryError, Result, StepFailure, TransformError};
pub use map::{Bias, DelInfo, MapResult, Mappable, Mapping, StepMap};
pub use mark::MarkMatch;
pub use registry::{StepDecoder, StepRegistry};
pub use replace::replace_step;
pub use step::{Step, StepResult};
pub use structure::{
	Direction, can_join, can_split, drop_point, find_wrapping, insert_point, join_point, joinable, lift_target,
};
pub use transform::Transform;
