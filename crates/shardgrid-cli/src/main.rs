use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "shardgrid",
    about = "shardgrid — explain why a shard copy is (or is not) allocated",
    version,
    propagate_version = true,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explain the allocation of one shard copy in a cluster snapshot.
    ///
    /// Unassigned copies get an allocate explanation; assigned copies get
    /// a move explanation (can it stay, should it be rebalanced).
    Explain {
        /// Cluster snapshot (.json or .toml)
        #[arg(short, long)]
        snapshot: String,
        /// Index name
        #[arg(short, long)]
        index: String,
        /// Shard number within the index
        #[arg(long, default_value_t = 0)]
        shard: u32,
        /// Explain a replica instead of the primary
        #[arg(long)]
        replica: bool,
        /// Allocation settings (shardgrid.toml); defaults apply when omitted
        #[arg(short, long)]
        config: Option<String>,
        /// Output format: text, json or wire (hex encoded frame)
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Also list deciders that said YES
        #[arg(long)]
        include_yes_decisions: bool,
    },
    /// Decode a hex encoded explain frame produced by `explain --format wire`
    Decode {
        /// Hex encoded frame
        #[arg(long)]
        hex: String,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
        /// Also list deciders that said YES
        #[arg(long)]
        include_yes_decisions: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("shardgrid=info".parse()?)
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Explain {
            snapshot,
            index,
            shard,
            replica,
            config,
            format,
            include_yes_decisions,
        } => commands::explain::explain(&commands::explain::ExplainArgs {
            snapshot: &snapshot,
            index: &index,
            shard,
            primary: !replica,
            config: config.as_deref(),
            format: &format,
            include_yes_decisions,
        }),
        Commands::Decode {
            hex,
            format,
            include_yes_decisions,
        } => commands::decode::decode(&hex, &format, include_yes_decisions),
    }
}
