pub mod base;

pub use self::base::*;
