pub mod error;
pub mod error_utils;
pub mod session;
pub mod settings;
pub mod types;

pub use error::*;
pub use error_utils::*;
pub use session::*;
pub use settings::*;
pub use types::*;
