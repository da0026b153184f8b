use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tourguide-cache")]
#[command(about = "Inspect and invalidate the tourguide cache")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the TOML config file
    #[arg(short, long, global = true, env = "TOURGUIDE_CONFIG")]
    pub config: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Probe the cache backend
    Health,
    /// Show cache statistics
    Stats,
    /// Print the cached value for a key
    Get(KeyArgs),
    /// Delete a single key
    Delete(KeyArgs),
    /// Run an invalidation helper
    Invalidate(InvalidateArgs),
    /// Clear the in-memory store and flush the backend
    Flush(FlushArgs),
}

#[derive(clap::Args)]
pub struct KeyArgs {
    /// Cache key (e.g. student:42:profile)
    pub key: String,
}

#[derive(clap::Args)]
pub struct InvalidateArgs {
    /// What changed
    #[arg(value_enum)]
    pub entity: Entity,

    /// Identifier of the changed entity (required for per-entity scopes)
    pub id: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum Entity {
    Student,
    Tourist,
    Request,
    Match,
    Verification,
    Students,
    Dashboards,
    Analytics,
}

impl Entity {
    pub fn needs_id(self) -> bool {
        matches!(
            self,
            Entity::Student
                | Entity::Tourist
                | Entity::Request
                | Entity::Match
                | Entity::Verification
        )
    }
}

#[derive(clap::Args)]
pub struct FlushArgs {
    /// Actually flush the shared backend; without it only local memory is cleared
    #[arg(long)]
    pub confirm: bool,
}
