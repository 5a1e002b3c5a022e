// ABOUTME: Validated domain types shared across the build and deploy layers.
// ABOUTME: Phantom-typed runtime IDs, image references, and project names.

mod id;
mod image_ref;
mod project_name;

pub use id::{ContainerId, ImageId};
pub use image_ref::{ImageRef, ParseImageRefError};
pub use project_name::{ProjectName, ProjectNameError};
