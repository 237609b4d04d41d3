use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use rpm_user_service::auth::{PasswordHasher, expected_gateway_value};
use rpm_user_service::db::UserCreate;
use rpm_user_service::logging::env_filter;
use rpm_user_service::types::{Email, Username};
use rpm_user_service::{
    Argon2PasswordHasher, DatabaseConfig, Role, ServiceConfig, UserStore, build_app,
    open_user_store,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "rpm-user-service")]
#[command(about = "User management service with gateway-guarded token authentication")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// JSON configuration file (falls back to ./user-service.json, then RPM_* variables)
        #[arg(short, long, env = "RPM_USER_SERVICE_CONFIG")]
        config: Option<PathBuf>,
        /// Override the bind address, e.g. 0.0.0.0:8080
        #[arg(long)]
        bind: Option<String>,
        /// Override the database url
        #[arg(long)]
        db_url: Option<String>,
    },
    /// Print the gateway header value for a salt and secret
    GatewayHash {
        #[arg(long, env = "RPM_GATEWAY_SALT")]
        salt: String,
        #[arg(long, env = "RPM_GATEWAY_SECRET")]
        secret: String,
    },
    /// Create a user account, e.g. the first ADMIN
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "")]
        first_name: String,
        #[arg(long, default_value = "")]
        last_name: String,
        /// One of ADMIN, DEV, USER, CLIENT, LOCKED
        #[arg(long, default_value = "USER")]
        role: String,
        #[arg(long, env = "RPM_NEW_USER_PASSWORD")]
        password: String,
        #[arg(long, default_value = "memory")]
        db_url: String,
    },
    /// Initialize the database
    Init {
        #[arg(long, default_value = "memory")]
        db_url: String,
    },
}

fn parse_role(value: &str) -> Result<Role> {
    let role = Role::parse_lossy(value);
    if role.as_str() != value.trim().to_ascii_uppercase() {
        bail!("unknown role '{}'", value);
    }
    Ok(role)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            config,
            bind,
            db_url,
        } => {
            let mut service_config = ServiceConfig::load(config.as_deref())?;
            if let Some(bind) = bind {
                service_config.bind = bind;
            }
            if let Some(db_url) = db_url {
                service_config.database.url = db_url;
            }
            info!(
                "Using database url for user service: {}",
                service_config.database.url
            );

            let app = build_app(&service_config).await?;
            let listener = tokio::net::TcpListener::bind(&service_config.bind).await?;

            info!("User service listening on http://{}", service_config.bind);
            axum::serve(listener, app).await?;
        }
        Commands::GatewayHash { salt, secret } => {
            println!("{}", expected_gateway_value(&salt, &secret));
        }
        Commands::CreateUser {
            username,
            email,
            first_name,
            last_name,
            role,
            password,
            db_url,
        } => {
            let role = parse_role(&role)?;
            if password.is_empty() {
                bail!("password must not be empty");
            }

            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            let store = open_user_store(db_config).await?;

            let password_hash = Argon2PasswordHasher.hash(&password)?;
            let user = store
                .create(&UserCreate {
                    first_name,
                    last_name,
                    email: Email::new(email),
                    username: Username::new(username),
                    password_hash,
                    role,
                })
                .await?;

            println!("User created successfully!");
            println!();
            println!("  Id:       {}", user.id);
            println!("  Username: {}", user.username);
            println!("  Email:    {}", user.email);
            println!("  Role:     {}", user.role);
        }
        Commands::Init { db_url } => {
            let db_config = DatabaseConfig {
                url: db_url,
                ..Default::default()
            };
            info!("Using database url for initialization: {}", db_config.url);

            info!("Initializing database...");
            open_user_store(db_config).await?;
            info!("Database initialized successfully");
        }
    }

    Ok(())
}
