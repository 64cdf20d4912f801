pub mod availability;
pub mod macros;
pub mod window;

pub use availability::*;
pub use window::*;
