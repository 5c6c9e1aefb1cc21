//! Stored one-time verification codes

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub email: String,
    pub code: String,
    pub expires_at: String,
    pub attempts: i64,
    pub last_sent_at: String,
}
