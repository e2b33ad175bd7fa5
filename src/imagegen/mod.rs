pub mod generate;
pub mod grounding;

pub use generate::generate;
pub use grounding::{fetch_grounding, GROUNDING_REFERENCE_NAME};
