pub mod types;
pub mod constants;
pub mod utils;

pub use types::*;
pub use constants::*;
