pub mod error;
pub mod identifiers;
pub mod logger;
pub mod money;
pub mod permissions;
