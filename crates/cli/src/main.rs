use std::time::Duration;

use clap::{Parser, Subcommand};

use api_shared::{HealthService, TokenConfig, TokenService};
use clinic_core::constants::DEFAULT_TOKEN_TTL_SECS;
use clinic_core::password::hash_password;
use clinic_core::{Actor, ClinicUuid, Role, UserType};

#[derive(Parser)]
#[command(name = "clinic")]
#[command(about = "Clinic backend operator CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the service health payload
    Health,
    /// Hash a password for seeding a user record
    HashPassword {
        /// Plain-text password
        password: String,
    },
    /// Mint a development bearer token (reads CLINIC_JWT_SECRET)
    MintToken {
        /// User id the token is issued for
        user_id: String,
        /// Role claim: admin, support or basic
        #[arg(long, default_value = "basic")]
        role: String,
        /// User type claim: operator or patient
        #[arg(long, default_value = "operator")]
        user_type: String,
        /// Token lifetime in seconds
        #[arg(long, default_value_t = DEFAULT_TOKEN_TTL_SECS)]
        ttl_secs: u64,
    },
    /// Verify a bearer token and print the actor it names (reads CLINIC_JWT_SECRET)
    VerifyToken {
        /// Token, with or without the `Bearer ` prefix
        token: String,
    },
}

fn token_service(ttl: Duration) -> Result<TokenService, Box<dyn std::error::Error>> {
    let secret =
        std::env::var("CLINIC_JWT_SECRET").map_err(|_| "CLINIC_JWT_SECRET must be set")?;
    Ok(TokenService::new(&TokenConfig::new(secret, ttl)?))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Health) => {
            let health = HealthService::check_health();
            println!("{} (version {})", health.message, health.version);
        }
        Some(Commands::HashPassword { password }) => match hash_password(&password) {
            Ok(hash) => println!("{}", hash),
            Err(e) => eprintln!("Error hashing password: {}", e),
        },
        Some(Commands::MintToken {
            user_id,
            role,
            user_type,
            ttl_secs,
        }) => {
            let actor = Actor::new(
                ClinicUuid::parse(&user_id)?,
                role.parse::<Role>()?,
                user_type.parse::<UserType>()?,
            );
            let issued = token_service(Duration::from_secs(ttl_secs))?.mint(&actor)?;
            println!("{}", issued.token);
            eprintln!("Expires at {}", issued.expires_at.to_rfc3339());
        }
        Some(Commands::VerifyToken { token }) => {
            let tokens = token_service(Duration::from_secs(DEFAULT_TOKEN_TTL_SECS))?;
            let token = api_shared::auth::bearer_token(&token).unwrap_or(token.as_str());
            match tokens.verify(token) {
                Ok(actor) => println!(
                    "user {} role {} type {}",
                    actor.user_id, actor.role, actor.user_type
                ),
                Err(e) => eprintln!("Invalid token: {}", e),
            }
        }
        None => {
            println!("Use --help for available commands");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mint_token_defaults() {
        let cli = Cli::try_parse_from(["clinic", "mint-token", "abc"]).expect("parse should succeed");
        match cli.command {
            Some(Commands::MintToken {
                user_id,
                role,
                user_type,
                ttl_secs,
            }) => {
                assert_eq!(user_id, "abc");
                assert_eq!(role, "basic");
                assert_eq!(user_type, "operator");
                assert_eq!(ttl_secs, DEFAULT_TOKEN_TTL_SECS);
            }
            _ => panic!("expected mint-token"),
        }
    }

    #[test]
    fn test_hash_password_requires_argument() {
        assert!(Cli::try_parse_from(["clinic", "hash-password"]).is_err());
    }
}
