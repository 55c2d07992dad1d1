use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Discover candidate names from Wikipedia categories.
    Crawl(CrawlArgs),
    /// Enrich candidate names and write the records to a sink.
    Enrich(EnrichArgs),
    /// Replay a record snapshot into a sink.
    Persist(PersistArgs),
    /// Print one stored record by slug (`<name>-birth-<YYYY-MM-DD>`).
    Show(ShowArgs),
    /// Print the zodiac sign for a date.
    Zodiac(ZodiacArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WriteMode {
    /// Skip records whose (name, date of birth) already exists.
    Insert,
    /// Overwrite existing records; skip records that do not exist.
    Update,
    /// Insert missing records and overwrite existing ones.
    Upsert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SinkKind {
    Json,
    Sqlite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum SnapshotFormat {
    /// Pretty-printed JSON array.
    #[default]
    Json,
    /// One JSON record per line.
    Jsonl,
}

#[derive(Debug, Clone, Args)]
pub struct WikiArgs {
    /// Base URL of the Wikipedia REST API.
    #[arg(long, default_value = "https://en.wikipedia.org/api/rest_v1")]
    pub rest_base: String,

    /// URL of the MediaWiki action API.
    #[arg(long, default_value = "https://en.wikipedia.org/w/api.php")]
    pub api_base: String,

    /// Per-request timeout.
    #[arg(long, default_value_t = 30)]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[arg(long, default_value = "zodiac-enrich/0.1")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Args)]
pub struct SinkArgs {
    /// Sink location (JSON snapshot file or SQLite database file).
    #[arg(long)]
    pub sink: String,

    #[arg(long, value_enum, default_value_t = SinkKind::Json)]
    pub sink_kind: SinkKind,

    /// Snapshot layout for the JSON sink.
    #[arg(long, value_enum, default_value_t = SnapshotFormat::Json)]
    pub format: SnapshotFormat,
}

#[derive(Debug, Args)]
pub struct CrawlArgs {
    /// Category to list (repeatable).
    #[arg(long = "category", default_values_t = vec!["Category:Lists of actors by nationality".to_owned()])]
    pub categories: Vec<String>,

    /// Output file for the candidate name list (JSON array).
    #[arg(long)]
    pub out: String,

    /// Treat category members as candidates instead of expanding their page links.
    #[arg(long)]
    pub direct: bool,

    /// Maximum listing requests per category or page.
    #[arg(long, default_value_t = 10)]
    pub max_pages: usize,

    /// Items requested per listing page.
    #[arg(long, default_value_t = 500)]
    pub page_size: usize,

    /// Delay between listing requests (politeness).
    #[arg(long, default_value_t = 100)]
    pub delay_ms: u64,

    #[command(flatten)]
    pub wiki: WikiArgs,
}

#[derive(Debug, Args)]
pub struct EnrichArgs {
    /// Candidate names (JSON array of strings).
    #[arg(long)]
    pub names: String,

    #[command(flatten)]
    pub sink: SinkArgs,

    #[arg(long, value_enum, default_value_t = WriteMode::Upsert)]
    pub mode: WriteMode,

    /// Names enriched concurrently before each sink write.
    #[arg(long, default_value_t = 1)]
    pub batch_size: usize,

    /// Delay between batches (politeness).
    #[arg(long, default_value_t = 100)]
    pub delay_ms: u64,

    /// Skip names already present (case-insensitive) in this record snapshot.
    #[arg(long)]
    pub skip_existing: Option<String>,

    /// Content length that maps to a popularity score of 100.
    #[arg(long, default_value_t = crate::enrich::DEFAULT_POPULARITY_SCALE)]
    pub popularity_scale: u64,

    /// Image URL used when the summary has no thumbnail.
    #[arg(long, default_value = crate::enrich::DEFAULT_PLACEHOLDER_IMAGE)]
    pub placeholder_image: String,

    #[command(flatten)]
    pub wiki: WikiArgs,
}

#[derive(Debug, Args)]
pub struct PersistArgs {
    /// Record snapshot to read (JSON array or JSON lines).
    #[arg(long)]
    pub records: String,

    #[command(flatten)]
    pub sink: SinkArgs,

    #[arg(long, value_enum, default_value_t = WriteMode::Upsert)]
    pub mode: WriteMode,

    /// Records written per chunk.
    #[arg(long, default_value_t = 50)]
    pub chunk_size: usize,

    /// Delay between chunks.
    #[arg(long, default_value_t = 0)]
    pub delay_ms: u64,
}

#[derive(Debug, Args)]
pub struct ShowArgs {
    #[command(flatten)]
    pub sink: SinkArgs,

    #[arg(long)]
    pub slug: String,
}

#[derive(Debug, Args)]
pub struct ZodiacArgs {
    /// Calendar date (`YYYY-MM-DD`).
    #[arg(long)]
    pub date: String,
}
