pub mod types;
pub mod loader;
pub mod validator;
pub mod resolved;
pub mod resolver;

pub use types::*;
pub use validator::*;
pub use resolved::*;
pub use resolver::*;
