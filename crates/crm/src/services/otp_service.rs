//! Email one-time passcodes.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rand::Rng;
use realty_auth::ttl_from_seconds;
use realty_config::{OtpConfig, MAX_OTP_CODE_LENGTH, MIN_OTP_CODE_LENGTH};
use realty_database::{format_timestamp, parse_timestamp, EmailStatus, OtpRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{CrmError, CrmResult};
use crate::otp_store::OtpStore;
use crate::services::lead_service::clean_email;
use crate::services::{CrmConfigService, EmailService};

/// Returned to the caller after a code went out. Never carries the code.
#[derive(Debug, Clone, Serialize)]
pub struct OtpIssued {
    pub email: String,
    pub expires_at: String,
    pub resend_after_seconds: u64,
}

fn check_code_length(length: u32) -> CrmResult<()> {
    if !(MIN_OTP_CODE_LENGTH..=MAX_OTP_CODE_LENGTH).contains(&length) {
        return Err(CrmError::validation(format!(
            "otp.code_length must be between {MIN_OTP_CODE_LENGTH} and {MAX_OTP_CODE_LENGTH}"
        )));
    }
    Ok(())
}

fn generate_code(length: u32) -> CrmResult<String> {
    check_code_length(length)?;
    let upper = 10u64.pow(length);
    let value = rand::thread_rng().gen_range(0..upper);
    Ok(format!("{value:0width$}", width = length as usize))
}

fn codes_match(expected: &str, given: &str) -> bool {
    // Compare every byte so timing does not reveal the matching prefix.
    expected.len() == given.len()
        && expected
            .bytes()
            .zip(given.bytes())
            .fold(0u8, |diff, (a, b)| diff | (a ^ b))
            == 0
}

#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    emails: EmailService,
    settings: CrmConfigService,
    config: OtpConfig,
    ttl: Duration,
    cooldown: Duration,
}

impl OtpService {
    pub fn new(
        store: Arc<dyn OtpStore>,
        emails: EmailService,
        settings: CrmConfigService,
        config: OtpConfig,
    ) -> CrmResult<Self> {
        let ttl = ttl_from_seconds("otp.ttl_seconds", config.ttl_seconds)?;
        let cooldown = ttl_from_seconds("otp.resend_cooldown_seconds", config.resend_cooldown_seconds)?;
        check_code_length(config.code_length)?;
        Ok(Self {
            store,
            emails,
            settings,
            config,
            ttl,
            cooldown,
        })
    }

    /// Generate, store and email a fresh code, replacing any pending one.
    pub async fn issue(&self, email: &str) -> CrmResult<OtpIssued> {
        let email = clean_email(email)?;
        let now = Utc::now();

        if let Some(pending) = self.store.get(&email).await? {
            let sent_at = parse_timestamp(&pending.last_sent_at)?;
            let elapsed = now - sent_at;
            if elapsed < self.cooldown {
                let remaining = (self.cooldown - elapsed).num_milliseconds();
                let retry_after_seconds = ((remaining + 999) / 1000).max(1) as u64;
                debug!(email = %email, retry_after_seconds, "code requested during cooldown");
                return Err(CrmError::TooManyRequests { retry_after_seconds });
            }
        }

        let code = generate_code(self.config.code_length)?;
        let expires_at = format_timestamp(now + self.ttl);
        self.store
            .put(OtpRecord {
                email: email.clone(),
                code: code.clone(),
                expires_at: expires_at.clone(),
                attempts: 0,
                last_sent_at: format_timestamp(now),
            })
            .await?;

        let agency = self.settings.get().await?.agency_name;
        let ttl_minutes = (self.config.ttl_seconds / 60).max(1);
        let sent = self.emails.send_otp(&email, &code, ttl_minutes, &agency).await?;
        if sent.status == EmailStatus::Failed {
            // An undelivered code must not hold the cooldown.
            self.store.remove(&email).await?;
            return Err(CrmError::Mail(sent.error.unwrap_or_default()));
        }

        info!(email = %email, expires_at = %expires_at, "issued verification code");
        Ok(OtpIssued {
            email,
            expires_at,
            resend_after_seconds: self.config.resend_cooldown_seconds,
        })
    }

    /// Check a code. A correct code is consumed exactly once.
    pub async fn verify(&self, email: &str, code: &str) -> CrmResult<()> {
        let email = clean_email(email)?;
        let code = code.trim();
        let now = Utc::now();
        let pending = self.store.get(&email).await?.ok_or(CrmError::OtpNotFound)?;

        if now >= parse_timestamp(&pending.expires_at)? {
            self.store.remove(&email).await?;
            return Err(CrmError::OtpExpired);
        }

        // Every guess spends an attempt before it is compared.
        let max_attempts = i64::from(self.config.max_attempts);
        let Some(attempts) = self.store.increment_attempts(&email, max_attempts).await? else {
            return Err(match self.store.get(&email).await? {
                Some(_) => CrmError::OtpAttemptsExceeded,
                None => CrmError::OtpNotFound,
            });
        };

        if codes_match(&pending.code, code) {
            if !self.store.consume(&email, code, &format_timestamp(now)).await? {
                debug!(email = %email, "code was consumed by another request");
                return Err(CrmError::OtpNotFound);
            }
            info!(email = %email, "verified email");
            return Ok(());
        }

        if attempts >= max_attempts {
            self.store.remove(&email).await?;
            warn!(email = %email, attempts, "verification code locked after too many attempts");
            return Err(CrmError::OtpAttemptsExceeded);
        }
        Err(CrmError::OtpInvalid)
    }

    pub async fn purge_expired(&self) -> CrmResult<u64> {
        self.store.purge_expired(&format_timestamp(Utc::now())).await
    }
}
