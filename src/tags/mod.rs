pub mod input;
pub mod normalize;
pub mod reconcile;
pub mod resolver;

pub use input::TagInput;
pub use resolver::{TagError, TagResolver};
