use clap::{Parser, Subcommand};
use rockfall_watch::{
    config::AppConfig,
    db,
    repositories::user_repository::SqliteUserRepository,
    services::{
        create_email_service,
        user_service::{CreateUserRequest, UpdatePasswordRequest, UserService},
        ApiTokenService, PasswordResetService,
    },
};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rockfall-cli")]
#[command(about = "CLI tool for managing Rockfall Watch accounts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// User management commands
    User {
        #[command(subcommand)]
        command: UserCommands,
    },

    /// Token maintenance commands
    Tokens {
        #[command(subcommand)]
        command: TokenCommands,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a new user
    Create {
        /// Display name
        #[arg(short, long)]
        name: String,

        /// Email address
        #[arg(short, long)]
        email: String,

        /// Password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// List all users
    List {
        /// Maximum number of users to display
        #[arg(short, long, default_value_t = 100)]
        limit: i64,

        /// Offset for pagination
        #[arg(short = 'o', long, default_value_t = 0)]
        offset: i64,
    },

    /// Delete a user
    Delete {
        /// Email address of the user to delete
        #[arg(short, long)]
        email: String,
    },

    /// Set a new password for a user
    SetPassword {
        /// Email address of the user
        #[arg(short, long)]
        email: String,

        /// New password (will prompt if not provided)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
enum TokenCommands {
    /// Remove expired password reset and API tokens
    Cleanup,
}

fn get_password(prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
    use std::io::{self, Write};
    print!("{}: ", prompt);
    io::stdout().flush()?;

    Ok(rpassword::read_password()?)
}

fn confirm_password(prompt: &str) -> Result<(String, String), Box<dyn std::error::Error>> {
    let password = get_password(prompt)?;
    let confirm = get_password("Confirm password")?;
    Ok((password, confirm))
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("❌ {}", message);
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;

    let user_repository = Arc::new(SqliteUserRepository::new(pool.clone()));
    let user_service = Arc::new(UserService::new(user_repository.clone()));

    match cli.command {
        Commands::User { command } => match command {
            UserCommands::Create {
                name,
                email,
                password,
            } => {
                let (password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("Password")?,
                };

                let request = CreateUserRequest {
                    name,
                    email,
                    password,
                    password_confirm: Some(password_confirm),
                };

                match user_service.create_user(request).await {
                    Ok(user) => {
                        println!("✅ User created successfully!");
                        println!("  ID: {}", user.id);
                        println!("  Name: {}", user.name);
                        println!("  Email: {}", user.email);
                    }
                    Err(err) => fail(format!("Failed to create user: {}", err)),
                }
            }

            UserCommands::List { limit, offset } => {
                let users = match user_service.list_users(Some(limit), Some(offset)).await {
                    Ok(users) => users,
                    Err(err) => fail(format!("Failed to list users: {}", err)),
                };

                if users.is_empty() {
                    println!("No users found.");
                } else {
                    println!("{:<5} {:<24} {:<36} {:<20}", "ID", "Name", "Email", "Created");
                    println!("{}", "-".repeat(85));
                    for user in users {
                        println!(
                            "{:<5} {:<24} {:<36} {:<20}",
                            user.id,
                            user.name,
                            user.email,
                            user.created_at.as_deref().unwrap_or("N/A")
                        );
                    }
                }
            }

            UserCommands::Delete { email } => match user_service.find_user_by_email(&email).await
            {
                Ok(Some(user)) => match user_service.delete_user(user.id).await {
                    Ok(()) => println!("✅ User '{}' deleted successfully!", email),
                    Err(err) => fail(format!("Failed to delete user: {}", err)),
                },
                Ok(None) => fail(format!("User '{}' not found", email)),
                Err(err) => fail(format!("Failed to find user: {}", err)),
            },

            UserCommands::SetPassword { email, password } => {
                let user = match user_service.find_user_by_email(&email).await {
                    Ok(Some(user)) => user,
                    Ok(None) => fail(format!("User '{}' not found", email)),
                    Err(err) => fail(format!("Failed to find user: {}", err)),
                };

                let (new_password, password_confirm) = match password {
                    Some(pw) => (pw.clone(), pw),
                    None => confirm_password("New password")?,
                };

                let request = UpdatePasswordRequest {
                    user_id: user.id,
                    new_password,
                    new_password_confirm: Some(password_confirm),
                };

                match user_service.update_password(request).await {
                    Ok(()) => println!("✅ Password updated successfully for '{}'!", email),
                    Err(err) => fail(format!("Failed to update password: {}", err)),
                }
            }
        },

        Commands::Tokens { command } => match command {
            TokenCommands::Cleanup => {
                let api_tokens = Arc::new(ApiTokenService::new(pool.clone(), config.api_token_ttl));
                let password_resets = PasswordResetService::new(
                    pool.clone(),
                    create_email_service(&config.base_url),
                    user_repository,
                    api_tokens.clone(),
                    config.reset_token_ttl,
                );

                let resets = match password_resets.cleanup_expired_tokens().await {
                    Ok(count) => count,
                    Err(err) => fail(format!("Failed to clean reset tokens: {}", err)),
                };
                let sessions = match api_tokens.cleanup_expired().await {
                    Ok(count) => count,
                    Err(err) => fail(format!("Failed to clean API tokens: {}", err)),
                };

                println!("✅ Removed {} reset tokens and {} API tokens", resets, sessions);
            }
        },
    }

    Ok(())
}
