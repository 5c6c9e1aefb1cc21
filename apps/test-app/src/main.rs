use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "api-test-app")]
#[command(about = "Smoke tests against a running Realty backend")]
#[command(version = "1.0")]
struct Cli {
    #[arg(long, default_value = "http://localhost:7070")]
    api_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the health endpoint
    Health,
    /// List public listings
    Properties {
        #[arg(long)]
        city: Option<String>,
    },
    /// Submit the public contact form
    Contact {
        #[arg(long, default_value = "Smoke Test")]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "Checking the contact form works.")]
        message: String,
    },
    /// Log in and fetch the dashboard overview
    Overview {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Run every public check, plus the overview when credentials are given
    RunAll {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct Property {
    slug: String,
    title: String,
    status: String,
    price: i64,
    currency: String,
    city: String,
}

#[derive(Debug, Deserialize)]
struct PropertyList {
    items: Vec<Property>,
    total: i64,
}

#[derive(Debug, Serialize)]
struct ContactForm<'a> {
    name: &'a str,
    email: &'a str,
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct ContactFormResponse {
    lead_id: String,
}

#[derive(Debug, Deserialize)]
struct User {
    display_name: String,
    role: String,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    token: String,
    user: User,
}

#[derive(Debug, Deserialize)]
struct StatusCount {
    status: String,
    count: i64,
}

#[derive(Debug, Deserialize)]
struct Overview {
    properties_by_status: Vec<StatusCount>,
    leads_by_status: Vec<StatusCount>,
    open_conversations: i64,
    published_posts: i64,
    queued_emails: i64,
    failed_emails: i64,
}

struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    fn new(base_url: String) -> Self {
        let client = Client::new();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn expect_ok<T: for<'de> Deserialize<'de>>(response: reqwest::Response, what: &str) -> Result<T> {
        if response.status() != StatusCode::OK {
            let status = response.status();
            let error = response.text().await?;
            return Err(anyhow::anyhow!("{what} failed with {status}: {error}"));
        }
        response
            .json()
            .await
            .with_context(|| format!("failed to parse {what} response"))
    }

    async fn health(&self) -> Result<HealthResponse> {
        println!("Checking health");

        let response = self
            .client
            .get(format!("{}/api/health", self.base_url))
            .send()
            .await
            .context("failed to reach the backend")?;
        let health: HealthResponse = Self::expect_ok(response, "health check").await?;

        println!("  status {} at {}", health.status.green(), health.timestamp);
        Ok(health)
    }

    async fn properties(&self, city: Option<&str>) -> Result<PropertyList> {
        println!("Fetching public listings");

        let mut request = self.client.get(format!("{}/api/properties", self.base_url));
        if let Some(city) = city {
            request = request.query(&[("city", city)]);
        }
        let response = request.send().await.context("failed to fetch listings")?;
        let list: PropertyList = Self::expect_ok(response, "listing search").await?;

        println!("  found {} listings", list.total.to_string().yellow());
        for property in &list.items {
            println!(
                "  {:<40} {:<10} {:>10} {} {}",
                property.title, property.status, property.price, property.currency, property.city
            );
            println!("    /{}", property.slug.dimmed());
        }
        Ok(list)
    }

    async fn contact(&self, form: ContactForm<'_>) -> Result<ContactFormResponse> {
        println!("Submitting contact form as {}", form.email);

        let response = self
            .client
            .post(format!("{}/api/leads", self.base_url))
            .json(&form)
            .send()
            .await
            .context("failed to submit contact form")?;
        let created: ContactFormResponse = Self::expect_ok(response, "contact form").await?;

        println!("  lead {} created", created.lead_id.green());
        Ok(created)
    }

    async fn login(&self, email: &str, password: &str) -> Result<SessionResponse> {
        println!("Logging in as {email}");

        let response = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("failed to log in")?;
        let session: SessionResponse = Self::expect_ok(response, "login").await?;

        println!("  signed in as {} ({})", session.user.display_name.green(), session.user.role);
        Ok(session)
    }

    async fn overview(&self, token: &str) -> Result<Overview> {
        println!("Fetching dashboard overview");

        let response = self
            .client
            .get(format!("{}/api/dashboard/overview", self.base_url))
            .bearer_auth(token)
            .send()
            .await
            .context("failed to fetch overview")?;
        let overview: Overview = Self::expect_ok(response, "overview").await?;

        let counts = |counts: &[StatusCount]| {
            counts
                .iter()
                .map(|c| format!("{}={}", c.status, c.count))
                .collect::<Vec<_>>()
                .join(" ")
        };
        println!("  listings:      {}", counts(&overview.properties_by_status));
        println!("  leads:         {}", counts(&overview.leads_by_status));
        println!("  conversations: {} open", overview.open_conversations);
        println!("  posts:         {} published", overview.published_posts);
        println!(
            "  emails:        {} queued, {} failed",
            overview.queued_emails,
            if overview.failed_emails > 0 {
                overview.failed_emails.to_string().red()
            } else {
                overview.failed_emails.to_string().normal()
            }
        );
        Ok(overview)
    }
}

async fn run_all(api: &ApiClient, email: Option<String>, password: Option<String>) -> Result<()> {
    api.health().await?;
    api.properties(None).await?;

    let visitor = format!("smoke+{}@example.com", std::process::id());
    api.contact(ContactForm {
        name: "Smoke Test",
        email: &visitor,
        message: "Automated smoke test, please ignore.",
    })
    .await?;

    match (email, password) {
        (Some(email), Some(password)) => {
            let session = api.login(&email, &password).await?;
            api.overview(&session.token).await?;
        }
        _ => println!("{}", "Skipping dashboard checks (no --email/--password)".dimmed()),
    }

    println!("{}", "All checks passed".green().bold());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let api = ApiClient::new(cli.api_url);

    match cli.command {
        Commands::Health => {
            api.health().await?;
        }
        Commands::Properties { city } => {
            api.properties(city.as_deref()).await?;
        }
        Commands::Contact { name, email, message } => {
            api.contact(ContactForm {
                name: &name,
                email: &email,
                message: &message,
            })
            .await?;
        }
        Commands::Overview { email, password } => {
            let session = api.login(&email, &password).await?;
            api.overview(&session.token).await?;
        }
        Commands::RunAll { email, password } => run_all(&api, email, password).await?,
    }

    Ok(())
}
