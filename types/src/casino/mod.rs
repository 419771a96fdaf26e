mod buff;
mod catalog;
mod constants;
mod symbol;

pub use buff::*;
pub use catalog::*;
pub use constants::*;
pub use symbol::*;
