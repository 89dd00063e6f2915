use clap::Parser;

/// One executable, one pipeline, no subcommands. Flags override whatever
/// `--config` supplied.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester", about = "E-commerce catalog harvester")]
pub struct Cli {
    /// Path to the TOML site configuration (host, exclusion prefixes,
    /// selector lists, ...).
    #[arg(long, default_value = "config/default.toml")]
    pub config: String,

    /// Worker-pool width per stage.
    #[arg(long, default_value_t = 8)]
    pub max_workers: usize,

    /// Max retry attempts per request.
    #[arg(long, default_value_t = 2)]
    pub retries: u32,

    /// Base inter-request sleep, in seconds.
    #[arg(long, default_value_t = 0.7)]
    pub throttle: f64,

    /// Main result file. Defaults to an auto-timestamped CSV in the
    /// current directory when omitted.
    #[arg(long)]
    pub output: Option<String>,

    /// Enable the HTTP-level persistent content cache.
    #[arg(long)]
    pub cache: bool,

    /// Also emit the QC errors bucket alongside the main output.
    #[arg(long)]
    pub review_export: bool,

    /// Hard wall-clock deadline for the whole run, in seconds. Unset means
    /// no deadline: the run proceeds until the pipeline finishes or is
    /// cancelled.
    #[arg(long)]
    pub deadline_seconds: Option<u64>,
}
