//! Safe SQL builder: identifiers quoted here, values as parameters.

mod builder;
mod columns;
pub mod params;
pub use builder::*;
pub use columns::TableColumns;
pub use params::*;
