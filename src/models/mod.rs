// Re-export all model types
pub use self::catalog::*;
pub use self::enums::*;
pub use self::errors::*;
pub use self::order::*;
pub use self::response::*;
pub use self::validation::*;
pub use self::wallet::*;

mod catalog;
mod enums;
mod errors;
mod order;
mod response;
mod validation;
mod wallet;
