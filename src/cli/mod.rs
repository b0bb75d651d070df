pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "easyconnect-api")]
#[command(about = "EasyConnect API - business management backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve(commands::serve::ServeArgs),

    #[command(about = "Apply embedded database migrations and exit")]
    Migrate,

    #[command(about = "Print a signed bearer token for a user id and role")]
    Token(commands::token::TokenArgs),
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve(Default::default())) {
        Commands::Serve(args) => commands::serve::handle(args).await,
        Commands::Migrate => commands::migrate::handle().await,
        Commands::Token(args) => commands::token::handle(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_serve() {
        let cli = Cli::try_parse_from(["easyconnect-api"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn parses_token_arguments() {
        let cli = Cli::try_parse_from([
            "easyconnect-api",
            "token",
            "--user-id",
            "7",
            "--role",
            "6",
            "--hours",
            "2",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Token(args)) => {
                assert_eq!(args.user_id, 7);
                assert_eq!(args.role, 6);
                assert_eq!(args.hours, Some(2));
                assert!(args.name.is_none());
            }
            _ => panic!("expected token subcommand"),
        }
    }

    #[test]
    fn parses_serve_port() {
        let cli = Cli::try_parse_from(["easyconnect-api", "serve", "--port", "9100"]).unwrap();
        match cli.command {
            Some(Commands::Serve(args)) => assert_eq!(args.port, Some(9100)),
            _ => panic!("expected serve subcommand"),
        }
    }
}
