pub mod address;
pub mod area;
pub mod complex;
pub mod error;
pub mod value;

pub use address::*;
pub use area::*;
pub use complex::*;
pub use error::*;
pub use value::*;
