//! Database repository implementations

pub mod conversation_repository;
pub mod crm_config_repository;
pub mod email_repository;
pub mod lead_repository;
pub mod message_repository;
pub mod otp_repository;
pub mod post_repository;
pub mod property_repository;
pub mod session_repository;
pub mod user_repository;

// Re-export all repositories for convenience
pub use conversation_repository::*;
pub use crm_config_repository::*;
pub use email_repository::*;
pub use lead_repository::*;
pub use message_repository::*;
pub use otp_repository::*;
pub use post_repository::*;
pub use property_repository::*;
pub use session_repository::*;
pub use user_repository::*;
