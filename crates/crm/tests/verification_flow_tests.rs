use std::sync::Arc;

use async_trait::async_trait;
use realty_assistant::ListingAssistant;
use realty_auth::{AuthError, LeadTokenIssuer};
use realty_config::{AppConfig, DatabaseConfig};
use realty_crm::{CrmError, CrmResult, CrmServices, Mailer, OutgoingEmail, SqlOtpStore};
use realty_database::{initialize_database, LeadSource, MessageSender, OtpRepository};
use sqlx::SqlitePool;
use tempfile::TempDir;
use tokio::sync::Mutex;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Default)]
struct Inbox {
    messages: Mutex<Vec<OutgoingEmail>>,
}

#[async_trait]
impl Mailer for Inbox {
    async fn deliver(&self, email: &OutgoingEmail) -> CrmResult<()> {
        self.messages.lock().await.push(email.clone());
        Ok(())
    }
}

struct TestContext {
    pool: SqlitePool,
    config: AppConfig,
    crm: CrmServices,
    inbox: Arc<Inbox>,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let pool = initialize_database(&DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("crm.sqlite").display()),
            max_connections: 5,
        })
        .await?;

        let mut config = AppConfig::default();
        config.otp.resend_cooldown_seconds = 0;

        let inbox = Arc::new(Inbox::default());
        let crm = CrmServices::new(
            pool.clone(),
            &config,
            inbox.clone(),
            Arc::new(SqlOtpStore::new(pool.clone())),
            Arc::new(ListingAssistant::new(&config.assistant)),
        )?;

        Ok(Self {
            pool,
            config,
            crm,
            inbox,
            _temp_dir: temp_dir,
        })
    }

    async fn pending_code(&self, email: &str) -> TestResult<String> {
        let record = OtpRepository::new(self.pool.clone())
            .get(email)
            .await?
            .ok_or("no pending code")?;
        Ok(record.code)
    }
}

#[tokio::test]
async fn verified_lead_gets_a_token_and_a_greeted_conversation() -> TestResult {
    let ctx = TestContext::new().await?;

    let issued = ctx
        .crm
        .verification
        .request_code(Some("Dana Reyes"), "Dana@Example.com")
        .await?;
    assert_eq!(issued.email, "dana@example.com");

    let code = ctx.pending_code("dana@example.com").await?;
    let mail = ctx.inbox.messages.lock().await.clone();
    assert_eq!(mail.len(), 1);
    assert!(mail[0].body.contains(&code));

    let verified = ctx
        .crm
        .verification
        .verify_code("dana@example.com", &code, Some("Dana Reyes"), None)
        .await?;
    assert_eq!(verified.lead.name, "Dana Reyes");
    assert_eq!(verified.lead.source, LeadSource::Chat);
    assert!(verified.lead.email_verified);
    assert_eq!(verified.conversation.lead_id, verified.lead.id);
    assert_eq!(verified.messages.len(), 1);
    assert_eq!(verified.messages[0].sender, MessageSender::Assistant);

    let claims = LeadTokenIssuer::from_config(&ctx.config.auth)?.verify(&verified.token.token)?;
    assert_eq!(claims.sub, verified.lead.public_id);
    assert_eq!(claims.conversation, verified.conversation.public_id);

    let (lead, conversation) = ctx.crm.verification.authenticate(&verified.token.token).await?;
    assert_eq!(lead.id, verified.lead.id);
    assert_eq!(conversation.id, verified.conversation.id);

    // The code was single use.
    assert!(ctx.pending_code("dana@example.com").await.is_err());
    Ok(())
}

#[tokio::test]
async fn returning_lead_resumes_the_same_conversation() -> TestResult {
    let ctx = TestContext::new().await?;

    ctx.crm.verification.request_code(None, "sam@example.com").await?;
    let code = ctx.pending_code("sam@example.com").await?;
    let first = ctx.crm.verification.verify_code("sam@example.com", &code, None, None).await?;

    ctx.crm
        .conversations
        .post_lead_message(&first.conversation.public_id, "Looking for a 2 bed flat")
        .await?;

    ctx.crm.verification.request_code(None, "sam@example.com").await?;
    let code = ctx.pending_code("sam@example.com").await?;
    let second = ctx.crm.verification.verify_code("sam@example.com", &code, None, None).await?;

    assert_eq!(second.lead.id, first.lead.id);
    assert_eq!(second.conversation.id, first.conversation.id);
    assert_eq!(second.messages.len(), 3);
    Ok(())
}

#[tokio::test]
async fn wrong_code_does_not_create_a_lead() -> TestResult {
    let ctx = TestContext::new().await?;

    ctx.crm.verification.request_code(None, "kim@example.com").await?;
    let code = ctx.pending_code("kim@example.com").await?;
    let wrong = if code.starts_with('9') { code.replacen('9', "1", 1) } else { format!("9{}", &code[1..]) };

    let result = ctx.crm.verification.verify_code("kim@example.com", &wrong, None, None).await;
    assert!(matches!(result, Err(CrmError::OtpInvalid)));

    let leads = ctx.crm.leads.list(Default::default()).await?;
    assert_eq!(leads.total, 0);
    Ok(())
}

#[tokio::test]
async fn tampered_tokens_are_rejected() -> TestResult {
    let ctx = TestContext::new().await?;

    let result = ctx.crm.verification.authenticate("not-a-token").await;
    assert!(matches!(result, Err(CrmError::Auth(AuthError::InvalidLeadToken))));

    // A well-formed token for a lead that does not exist.
    let token = LeadTokenIssuer::from_config(&ctx.config.auth)?.mint("ghost", "nowhere")?;
    let result = ctx.crm.verification.authenticate(&token.token).await;
    assert!(matches!(result, Err(CrmError::Auth(AuthError::InvalidLeadToken))));
    Ok(())
}
