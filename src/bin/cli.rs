use clap::{Parser, Subcommand};
use csurf::{Secret, Tokens};

#[derive(Parser)]
#[command(name = "csurf-cli")]
#[command(about = "CLI tool for generating and checking CSRF secrets and tokens", long_about = None)]
struct Cli {
    /// Secret length in bytes
    #[arg(long, global = true, default_value_t = csurf::services::tokens::DEFAULT_SECRET_LENGTH)]
    secret_length: usize,

    /// Salt length in characters
    #[arg(long, global = true, default_value_t = csurf::services::tokens::DEFAULT_SALT_LENGTH)]
    salt_length: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new secret
    Secret,

    /// Derive tokens from a secret
    Token {
        /// Secret as stored in the cookie
        #[arg(short, long)]
        secret: String,

        /// Number of tokens to derive
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },

    /// Check a token against a secret
    Verify {
        /// Secret as stored in the cookie
        #[arg(short, long)]
        secret: String,

        /// Submitted token
        #[arg(short, long)]
        token: String,
    },
}

fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let tokens = Tokens::with_lengths(cli.secret_length, cli.salt_length);

    match cli.command {
        Commands::Secret => {
            println!("{}", tokens.generate_secret().expose());
        }
        Commands::Token { secret, count } => {
            let secret = Secret::new(secret);
            for _ in 0..count {
                println!("{}", tokens.create(&secret));
            }
        }
        Commands::Verify { secret, token } => {
            if tokens.verify(&Secret::new(secret), &token) {
                println!("✅ Token is valid");
            } else {
                eprintln!("❌ Token is invalid");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
