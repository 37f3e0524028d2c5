mod aggregate;
mod diversity;

pub use aggregate::aggregate;
pub use diversity::{DiversityPolicy, diversify};
