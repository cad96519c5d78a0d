use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub media_dir: String,
    /// Externally reachable base URL, embedded into signed media links.
    pub public_url: String,
    pub signing_secret: String,
    pub signed_url_expiry_secs: i64,
    pub auth: AuthSettings,
}

/// Identity-provider endpoints and the token claims to enforce.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub jwks_uri: String,
    pub audience: String,
    pub issuer: String,
    pub user_info_uri: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Art gallery API server")]
pub struct Args {
    /// Host to bind to (overrides GALLERY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GALLERY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides GALLERY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory where media payloads are stored (overrides GALLERY_MEDIA_DIR)
    #[arg(long)]
    pub media_dir: Option<String>,

    /// Externally reachable base URL (overrides GALLERY_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("GALLERY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("GALLERY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing GALLERY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading GALLERY_PORT"),
        };
        let env_db = env::var("GALLERY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/gallery.db".into());
        let env_media = env::var("GALLERY_MEDIA_DIR").unwrap_or_else(|_| "./data/media".into());
        let env_public =
            env::var("GALLERY_PUBLIC_URL").unwrap_or_else(|_| "http://localhost:3000".into());
        let signing_secret =
            env::var("GALLERY_SIGNING_SECRET").unwrap_or_else(|_| "local-dev-secret".into());
        let signed_url_expiry_secs = match env::var("GALLERY_SIGNED_URL_EXP") {
            Ok(value) => value
                .parse::<i64>()
                .with_context(|| format!("parsing GALLERY_SIGNED_URL_EXP value `{}`", value))?,
            Err(env::VarError::NotPresent) => 300,
            Err(err) => return Err(err).context("reading GALLERY_SIGNED_URL_EXP"),
        };

        let auth = AuthSettings {
            jwks_uri: env::var("AUTH0_JWKS_URI").unwrap_or_else(|_| {
                "https://dev-gallery.us.auth0.com/.well-known/jwks.json".into()
            }),
            audience: env::var("AUTH0_AUDIENCE").unwrap_or_else(|_| "https://gallery-api".into()),
            issuer: env::var("AUTH0_ISSUER")
                .unwrap_or_else(|_| "https://dev-gallery.us.auth0.com/".into()),
            user_info_uri: env::var("AUTH0_USER_INFO_URI")
                .unwrap_or_else(|_| "https://dev-gallery.us.auth0.com/userinfo".into()),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            media_dir: args.media_dir.unwrap_or(env_media),
            public_url: args.public_url.unwrap_or(env_public),
            signing_secret,
            signed_url_expiry_secs,
            auth,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Base URL under which signed media links are served.
    pub fn media_base_url(&self) -> String {
        format!("{}/media", self.public_url.trim_end_matches('/'))
    }
}
