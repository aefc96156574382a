pub mod health;
pub mod product;

pub use health::*;
pub use product::*;
