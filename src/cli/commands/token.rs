use anyhow::anyhow;
use clap::Args;

use crate::auth::{generate_jwt, Claims, Role};

#[derive(Args, Debug)]
pub struct TokenArgs {
    #[arg(long, help = "users.id the token identifies")]
    pub user_id: i64,

    #[arg(long, help = "Role code: 1 Admin, 2 Commercial, 3 Comptable, 4 RH, 5 Technicien, 6 Patron")]
    pub role: i16,

    #[arg(long, help = "Display name carried in the token")]
    pub name: Option<String>,

    #[arg(long, help = "Validity in hours (defaults to SECURITY_JWT_EXPIRY_HOURS)")]
    pub hours: Option<u64>,
}

pub fn handle(args: TokenArgs) -> anyhow::Result<()> {
    let role = Role::from_code(args.role).ok_or_else(|| anyhow!("unknown role code {}", args.role))?;
    let name = args.name.unwrap_or_else(|| format!("user-{}", args.user_id));
    let claims = Claims::new(args.user_id, role, name, args.hours);
    println!("{}", generate_jwt(&claims)?);
    Ok(())
}
