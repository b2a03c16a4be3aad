use clap::{Parser, Subcommand};
use gallery::{
    app::{
        accounts::{self, SignupRequest},
        categories,
        images::{self, SearchRequest},
    },
    config::{self, AppConfig},
    prelude::*,
};
use std::env;

#[derive(Parser)]
#[command(name = "gallery")]
#[command(about = "Image gallery administration CLI", long_about = None)]
pub struct Cli {
    #[arg(long, global = true, help = "Database URL (defaults to DATABASE_URL)")]
    pub database_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Creates the database if needed and applies the schema.
    Migrate,

    /// Seeds the default categories.
    Seed,

    /// Creates an account.
    CreateUser {
        #[arg(help = "Username")]
        username: String,

        #[arg(short, long, help = "Email address")]
        email: String,

        #[arg(short, long, help = "Password")]
        password: String,

        #[arg(long, help = "Also grant ROLE_ADMIN")]
        admin: bool,
    },

    /// Searches the image API and stores the hits.
    Import {
        #[arg(help = "Search query")]
        query: String,

        #[arg(long, help = "Image type (photo, illustration, vector, all)")]
        image_type: Option<String>,

        #[arg(long, help = "Orientation (all, horizontal, vertical)")]
        orientation: Option<String>,

        #[arg(long, help = "Category filter")]
        category: Option<String>,

        #[arg(long, default_value_t = 20, help = "Hits per page")]
        per_page: i64,

        #[arg(long, default_value_t = 1, help = "Page to fetch")]
        page: i64,
    },
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let database_url = cli
        .database_url
        .unwrap_or_else(|| env_or("DATABASE_URL", config::DEFAULT_DATABASE_URL));
    let db = Database::connect(&database_url).await?;

    match cli.command {
        Commands::Migrate => {
            println!("✅ Migrated {database_url}");
        }
        Commands::Seed => {
            let inserted = categories::initialize_defaults(&db).await?;
            println!("✅ Seeded {inserted} categories");
        }
        Commands::CreateUser {
            username,
            email,
            password,
            admin,
        } => {
            let cost = env_or("BCRYPT_COST", &config::DEFAULT_BCRYPT_COST.to_string()).parse()?;
            let roles = if admin {
                vec![Role::User, Role::Admin]
            } else {
                vec![Role::User]
            };

            let user = accounts::create_user(
                &db,
                cost,
                SignupRequest {
                    username,
                    email,
                    password,
                },
                &roles,
            )
            .await?;

            println!("✅ Created user:");
            println!("{} (id {}, roles {:?})", user.username, user.id, user.roles);
        }
        Commands::Import {
            query,
            image_type,
            orientation,
            category,
            per_page,
            page,
        } => {
            let config = AppConfig::from_env()?;
            let upstream = UpstreamClient::new(
                config.image_api_url.clone(),
                config.image_api_key.clone(),
                config.image_api_timeout,
            )?;

            let result = images::search_external(
                &db,
                &upstream,
                None,
                SearchRequest {
                    query: Some(query),
                    image_type,
                    orientation,
                    category,
                    per_page: Some(per_page),
                    page: Some(page),
                },
            )
            .await?;

            println!(
                "✅ Imported {} images ({} hits upstream)",
                result.total, result.total_hits
            );
            for image in result.data {
                println!("{}\t{}", image.id, image.webformat_url);
            }
        }
    }

    Ok(())
}
