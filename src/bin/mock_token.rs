use std::{fs, path::PathBuf};

use clap::Parser;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Map, Value, json};

/// Sign an RS256 access token for local testing against `OIDC_PUBLIC_KEY`.
///
/// Roles are placed under `resource_access.<client>.roles`, which is where the
/// API reads them from. Prints `Bearer <token>` ready for an Authorization header.
#[derive(Parser, Debug)]
#[command(name = "mock-token", version, about)]
struct Args {
    /// RSA private key in PEM (PKCS#1 or PKCS#8)
    #[arg(long, value_name = "FILE")]
    private_key: PathBuf,

    /// Subject (`sub`)
    #[arg(long, default_value = "test-user-123")]
    sub: String,

    /// Client id the roles are scoped to (OIDC_CLIENT_ID)
    #[arg(long, default_value = "product-api")]
    client: String,

    /// Role to grant; repeat for several
    #[arg(long = "role")]
    roles: Vec<String>,

    /// Issuer (`iss`); omitted when not given
    #[arg(long)]
    issuer: Option<String>,

    /// Audience (`aud`). Default: the client id.
    #[arg(long)]
    audience: Option<String>,

    /// Key id written to the header (`kid`)
    #[arg(long)]
    kid: Option<String>,

    /// Lifetime in seconds
    #[arg(long, default_value_t = 24 * 60 * 60)]
    ttl_seconds: i64,

    /// Print only the token (no `Bearer ` prefix)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn claims(args: &Args, now: i64) -> Value {
    let mut claims = Map::new();
    claims.insert("sub".into(), json!(args.sub));
    claims.insert(
        "aud".into(),
        json!(args.audience.as_deref().unwrap_or(&args.client)),
    );
    claims.insert("iat".into(), json!(now));
    claims.insert("exp".into(), json!(now + args.ttl_seconds));
    claims.insert("preferred_username".into(), json!(args.sub));
    claims.insert(
        "resource_access".into(),
        json!({ (args.client.as_str()): { "roles": args.roles } }),
    );
    if let Some(issuer) = &args.issuer {
        claims.insert("iss".into(), json!(issuer));
    }
    Value::Object(claims)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let pem = fs::read(&args.private_key)?;
    let key = EncodingKey::from_rsa_pem(&pem)?;

    let mut header = Header::new(Algorithm::RS256);
    header.kid = args.kid.clone();

    let now = chrono::Utc::now().timestamp();
    let token = jsonwebtoken::encode(&header, &claims(&args, now), &key)?;

    if args.quiet {
        println!("{token}");
    } else {
        println!("Bearer {token}");
    }

    Ok(())
}
