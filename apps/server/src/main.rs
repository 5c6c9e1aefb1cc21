use anyhow::Context;
use clap::{Parser, Subcommand};
use realty_auth::{AuthError, NewUser};
use realty_backend_runtime::{telemetry, BackendServices, MAINTENANCE_INTERVAL};
use realty_catalog::{NewPost, NewProperty, Visibility};
use realty_config::load as load_config;
use realty_database::{ListingType, PostFilter, PropertyStatus, PropertyType, UserRole};
use realty_gateway::create_router;
use sqlx::Row;
use tokio::net::TcpListener;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "realty-backend")]
#[command(about = "Realty agency backend (serves HTTP by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve,
    /// Seed the bootstrap administrator and demo listings and posts
    SeedData,
    /// Print users, listings, leads, conversations, posts and emails
    DumpData,
    /// Delete listings, leads, conversations, posts and emails
    ClearData,
    /// Create a back-office account
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "agent", value_parser = parse_role)]
        role: UserRole,
    },
}

fn parse_role(value: &str) -> Result<UserRole, String> {
    UserRole::parse(value).ok_or_else(|| {
        let known: Vec<&str> = UserRole::ALL.iter().map(|role| role.as_str()).collect();
        format!("expected one of {}", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::SeedData => seed_data().await,
        Commands::DumpData => dump_data().await,
        Commands::ClearData => clear_data().await,
        Commands::CreateUser {
            email,
            password,
            name,
            role,
        } => create_user(email, password, name, role).await,
    }
}

async fn services() -> anyhow::Result<BackendServices> {
    let config = load_config().context("failed to load configuration")?;
    BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting Realty backend");

    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let maintenance = services.spawn_maintenance(MAINTENANCE_INTERVAL);
    let app = create_router(services.gateway_state());

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(realty_backend_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    maintenance.abort();
    info!("backend shut down");
    Ok(())
}

async fn create_user(email: String, password: String, name: String, role: UserRole) -> anyhow::Result<()> {
    let services = services().await?;

    let user = services
        .authenticator
        .create_user(NewUser {
            email,
            password,
            display_name: name,
            role,
        })
        .await
        .context("failed to create user")?;

    println!("Created {} account {} ({})", user.role, user.email, user.public_id);
    Ok(())
}

fn demo_properties() -> Vec<NewProperty> {
    let listing = |title: &str, property_type, listing_type, price, bedrooms, bathrooms, city: &str| NewProperty {
        title: title.to_string(),
        slug: None,
        description: String::new(),
        property_type,
        listing_type,
        status: Some(PropertyStatus::Available),
        price,
        currency: None,
        bedrooms,
        bathrooms,
        area_sqm: None,
        address: None,
        city: city.to_string(),
        region: None,
        postal_code: None,
        country: None,
        latitude: None,
        longitude: None,
        features: Vec::new(),
        images: Vec::new(),
        featured: false,
        agent_id: None,
    };

    let mut harbour = listing(
        "Harbour View Apartment",
        PropertyType::Apartment,
        ListingType::Sale,
        485_000,
        2,
        2.0,
        "Lisbon",
    );
    harbour.description = "Bright corner apartment overlooking the river, five minutes from the ferry.".into();
    harbour.area_sqm = Some(92.0);
    harbour.features = vec!["balcony".into(), "elevator".into(), "river view".into()];
    harbour.featured = true;

    let mut garden = listing(
        "Family House with Garden",
        PropertyType::House,
        ListingType::Sale,
        720_000,
        4,
        3.0,
        "Cascais",
    );
    garden.description = "Detached house on a quiet street with a private garden and garage.".into();
    garden.area_sqm = Some(210.0);
    garden.features = vec!["garden".into(), "garage".into(), "fireplace".into()];

    let mut studio = listing(
        "Furnished Studio near the University",
        PropertyType::Condo,
        ListingType::Rent,
        950,
        1,
        1.0,
        "Lisbon",
    );
    studio.description = "Compact furnished studio, bills included, available from next month.".into();
    studio.area_sqm = Some(34.0);

    let mut townhouse = listing(
        "Renovated Townhouse",
        PropertyType::Townhouse,
        ListingType::Rent,
        2_400,
        3,
        2.5,
        "Porto",
    );
    townhouse.status = Some(PropertyStatus::Pending);
    townhouse.description = "Three storey townhouse with a roof terrace in the historic centre.".into();

    vec![harbour, garden, studio, townhouse]
}

fn demo_posts() -> Vec<NewPost> {
    vec![
        NewPost {
            title: "What to Check Before Your First Viewing".to_string(),
            slug: None,
            excerpt: None,
            content: "Bring a checklist. Look at water pressure, window seals and the condition of shared areas.\n\nAsk how long the property has been on the market and why the owners are moving.".to_string(),
            cover_image_url: None,
            tags: vec!["buying".to_string(), "guides".to_string()],
        },
        NewPost {
            title: "Renting in Lisbon: Deposits and Guarantors".to_string(),
            slug: None,
            excerpt: None,
            content: "Most landlords ask for two months of deposit and one month in advance.\n\nIf you lack a local guarantor, an insurance-backed guarantee is often accepted.".to_string(),
            cover_image_url: None,
            tags: vec!["renting".to_string()],
        },
    ]
}

async fn seed_data() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let mut admin_id = None;
    match &config.auth.bootstrap_admin {
        Some(admin) => match services.authenticator.ensure_admin(admin).await {
            Ok(Some(user)) => {
                println!("- administrator {} created", user.email);
                admin_id = Some(user.id);
            }
            Ok(None) => println!("- administrator already present"),
            Err(AuthError::UserExists) => warn!(email = %admin.email, "bootstrap admin email belongs to another account"),
            Err(error) => return Err(error).context("failed to create bootstrap administrator"),
        },
        None => println!("- no auth.bootstrap_admin configured; skipping administrator"),
    }

    let mut created_properties = 0;
    for property in demo_properties() {
        let slug = realty_catalog::slugify(&property.title);
        if services.properties.get_by_slug(&slug, Visibility::All).await.is_ok() {
            continue;
        }
        services
            .properties
            .create(property)
            .await
            .with_context(|| format!("failed to seed listing {slug}"))?;
        created_properties += 1;
    }

    let existing_posts = services
        .posts
        .list_all(PostFilter::default())
        .await
        .context("failed to count posts")?;
    let mut created_posts = 0;
    if existing_posts.total == 0 {
        for post in demo_posts() {
            let post = services
                .posts
                .create(post, admin_id)
                .await
                .context("failed to seed post")?;
            services
                .posts
                .publish(&post.public_id)
                .await
                .context("failed to publish seeded post")?;
            created_posts += 1;
        }
    }

    println!("Database seeded:");
    println!("- {created_properties} listings created");
    println!("- {created_posts} posts published");
    println!("Run 'dump-data' to see the inserted data");
    Ok(())
}

async fn dump_table(pool: &sqlx::SqlitePool, title: &str, sql: &str, columns: &[&str]) -> anyhow::Result<()> {
    let rows = sqlx::query(sql)
        .fetch_all(pool)
        .await
        .with_context(|| format!("failed to fetch {title}"))?;

    println!("\n=== {} ===", title.to_uppercase());
    if rows.is_empty() {
        println!("No {title} found in database");
        return Ok(());
    }

    println!("Found {} {title}:", rows.len());
    let header: Vec<String> = columns.iter().map(|c| format!("{c:<24}")).collect();
    println!("{}", header.join(" "));
    println!("{}", "-".repeat(25 * columns.len()));

    for row in rows {
        let cells: Vec<String> = (0..columns.len())
            .map(|index| {
                let value: Option<String> = row.try_get(index).ok().flatten();
                let value = value.unwrap_or_else(|| "NULL".to_string());
                let value = if value.chars().count() > 23 {
                    format!("{}...", value.chars().take(20).collect::<String>())
                } else {
                    value
                };
                format!("{value:<24}")
            })
            .collect();
        println!("{}", cells.join(" "));
    }
    Ok(())
}

async fn dump_data() -> anyhow::Result<()> {
    let services = services().await?;
    let pool = &services.db_pool;

    dump_table(
        pool,
        "users",
        "SELECT public_id, email, role, status, created_at FROM users ORDER BY id",
        &["Public ID", "Email", "Role", "Status", "Created At"],
    )
    .await?;
    dump_table(
        pool,
        "properties",
        "SELECT public_id, slug, status, CAST(price AS TEXT), city FROM properties ORDER BY id",
        &["Public ID", "Slug", "Status", "Price", "City"],
    )
    .await?;
    dump_table(
        pool,
        "leads",
        "SELECT public_id, name, email, source, status FROM leads ORDER BY status, board_position",
        &["Public ID", "Name", "Email", "Source", "Status"],
    )
    .await?;
    dump_table(
        pool,
        "conversations",
        "SELECT c.public_id, l.email, c.status, CAST(c.message_count AS TEXT), c.last_message_preview \
         FROM conversations c JOIN leads l ON l.id = c.lead_id ORDER BY c.id",
        &["Public ID", "Lead", "Status", "Messages", "Last Message"],
    )
    .await?;
    dump_table(
        pool,
        "posts",
        "SELECT public_id, slug, status, published_at FROM posts ORDER BY id",
        &["Public ID", "Slug", "Status", "Published At"],
    )
    .await?;
    dump_table(
        pool,
        "emails",
        "SELECT public_id, to_address, kind, status, subject FROM emails ORDER BY id",
        &["Public ID", "To", "Kind", "Status", "Subject"],
    )
    .await?;

    Ok(())
}

async fn clear_data() -> anyhow::Result<()> {
    info!("clearing agency data from database");
    let services = services().await?;

    let mut tx = services.db_pool.begin().await.context("failed to open transaction")?;
    let mut deleted = Vec::new();
    // Conversations and messages go with their leads.
    for table in ["emails", "leads", "posts", "properties", "otp_codes"] {
        let result = sqlx::query(&format!("DELETE FROM {table}"))
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to delete {table}"))?;
        deleted.push((table, result.rows_affected()));
    }
    tx.commit().await.context("failed to commit clear")?;

    println!("Database cleared:");
    for (table, rows) in deleted {
        println!("- {rows} {table} deleted");
    }
    Ok(())
}
