//! Domain entities for the database layer

/// Declares a fieldless enum stored as lowercase text.
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Option<Self> {
                match value {
                    $($text => Some($name::$variant),)+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = crate::types::DatabaseError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                Self::parse(value).ok_or_else(|| {
                    crate::types::DatabaseError::InvalidValue(format!(
                        "'{}' is not a valid {}",
                        value,
                        stringify!($name)
                    ))
                })
            }
        }
    };
}

pub mod conversation;
pub mod crm_config;
pub mod email;
pub mod lead;
pub mod message;
pub mod otp;
pub mod post;
pub mod property;
pub mod session;
pub mod user;

pub use conversation::{Conversation, ConversationFilter, ConversationStatus};
pub use crm_config::{CrmConfig, UpdateCrmConfigRequest};
pub use email::{CreateEmailRequest, Email, EmailFilter, EmailKind, EmailStatus};
pub use lead::{CreateLeadRequest, Lead, LeadFilter, LeadSource, LeadStatus, UpdateLeadRequest};
pub use message::{Message, MessageSender, NewMessage};
pub use otp::OtpRecord;
pub use post::{CreatePostRequest, Post, PostFilter, PostStatus, UpdatePostRequest};
pub use property::{
    CreatePropertyRequest, ListingType, Property, PropertyFilter, PropertyStatus, PropertyType,
    UpdatePropertyRequest,
};
pub use session::AuthSession;
pub use user::{CreateUserRequest, User, UserRole, UserStatus};
