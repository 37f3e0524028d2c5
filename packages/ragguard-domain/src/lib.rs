pub mod access;
pub mod confidence;
pub mod evidence;
pub mod normalize;
pub mod roles;

mod error;

pub use error::{Error, Result};
