//! Processing traits shared by the capture side of the relay.

pub mod dyn_traits;
pub mod traits;

pub use dyn_traits::Pushable;
pub use traits::Node;
