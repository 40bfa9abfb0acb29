//! Chronicle CLI - command line access to a campaign's memory snapshot
//!
//! Usage:
//!   chronicle -s campaign.json add '{"action": "spared the thief"}' -u alice
//!   chronicle -s campaign.json recall "thief" --user alice
//!   chronicle -s campaign.json forget --threshold 0.1
//!   chronicle -s campaign.json profile alice
//!   chronicle -s campaign.json stats
//!   chronicle -s campaign.json context --user alice --max-tokens 800

use anyhow::Context as _;
use chronicle::{
    content_from_value, ContextWindow, Emotion, LayeredMemory, MemoryConfig, MemoryLayer,
    MemorySnapshot, MemoryType, NewMemory, RecallHit, RecallQuery,
};
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "chronicle")]
#[command(about = "Chronicle - layered narrative memory for interactive stories")]
#[command(version)]
struct Cli {
    /// Snapshot file holding the campaign state
    #[arg(short, long, default_value = "./chronicle.json")]
    snapshot: PathBuf,

    /// Campaign id used when the snapshot file does not exist yet
    #[arg(short, long)]
    campaign: Option<String>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a memory
    Add {
        /// Memory content: a JSON object, or plain text stored under "text"
        content: String,

        /// Owning user
        #[arg(short, long)]
        user: String,

        /// Session the memory was recorded in
        #[arg(long, default_value = "default")]
        session: String,

        /// Memory type (event, decision, emotion, relationship, ...)
        #[arg(short = 't', long = "type", default_value = "event")]
        memory_type: MemoryType,

        /// Layer (short_term, mid_term, long_term)
        #[arg(short, long, default_value = "mid_term")]
        layer: MemoryLayer,

        /// Emotional weight (0.0-1.0)
        #[arg(short, long, default_value = "0.5")]
        weight: f64,

        /// Emotions felt (repeatable)
        #[arg(short, long)]
        emotion: Vec<Emotion>,

        /// Thematic tags (repeatable)
        #[arg(long)]
        theme: Vec<String>,

        /// Explicit triggers instead of derived keywords (repeatable)
        #[arg(long)]
        trigger: Vec<String>,
    },

    /// Recall memories, reinforcing the top results
    Recall {
        #[command(flatten)]
        filters: RecallArgs,
    },

    /// Forget weak mid- and long-term memories
    Forget {
        /// Significance threshold (0.0-1.0), defaults to 0.1
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Show a user's emotional and thematic profile
    Profile {
        /// User id
        user: String,
    },

    /// Show store statistics
    Stats,

    /// Render recalled memories as generator context
    Context {
        #[command(flatten)]
        filters: RecallArgs,

        /// Approximate token budget
        #[arg(long, default_value = "1500")]
        max_tokens: usize,
    },
}

#[derive(Args)]
struct RecallArgs {
    /// Free-text query
    query: Option<String>,

    /// Only memories carrying this emotion
    #[arg(short, long)]
    emotion: Option<Emotion>,

    /// Only memories sharing one of these themes (repeatable)
    #[arg(long)]
    theme: Vec<String>,

    /// Only this user's memories
    #[arg(short, long)]
    user: Option<String>,

    /// Only this layer
    #[arg(short, long)]
    layer: Option<MemoryLayer>,

    /// Minimum significance
    #[arg(short, long, default_value = "0.0")]
    min_significance: f64,

    /// Maximum results
    #[arg(short = 'n', long, default_value = "10")]
    limit: usize,
}

impl RecallArgs {
    fn to_query(&self) -> RecallQuery {
        let mut query = RecallQuery::new()
            .themes(self.theme.iter().cloned())
            .min_significance(self.min_significance)
            .limit(self.limit);
        if let Some(text) = &self.query {
            query = query.text(text.clone());
        }
        if let Some(emotion) = self.emotion {
            query = query.emotion(emotion);
        }
        if let Some(user) = &self.user {
            query = query.user(user.clone());
        }
        if let Some(layer) = self.layer {
            query = query.layer(layer);
        }
        query
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let memory = load(&cli.snapshot, cli.campaign.as_deref())?;

    let mutated = match cli.command {
        Commands::Add {
            content,
            user,
            session,
            memory_type,
            layer,
            weight,
            emotion,
            theme,
            trigger,
        } => {
            let mut input = NewMemory::new(parse_content(&content)?, memory_type, layer, user, session)
                .with_emotional_weight(weight)
                .with_emotions(emotion)
                .with_themes(theme);
            if !trigger.is_empty() {
                input = input.with_triggers(trigger);
            }
            cmd_add(&memory, input)?;
            true
        }
        Commands::Recall { filters } => {
            cmd_recall(&memory, &filters.to_query());
            true
        }
        Commands::Forget { threshold } => {
            cmd_forget(&memory, threshold)?;
            true
        }
        Commands::Profile { user } => {
            cmd_profile(&memory, &user);
            false
        }
        Commands::Stats => {
            cmd_stats(&memory);
            false
        }
        Commands::Context {
            filters,
            max_tokens,
        } => {
            cmd_context(&memory, &filters, max_tokens);
            true
        }
    };

    if mutated {
        save(&memory, &cli.snapshot)?;
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(path: &Path, campaign: Option<&str>) -> anyhow::Result<LayeredMemory> {
    if !path.exists() {
        let campaign = campaign.unwrap_or("default");
        return Ok(LayeredMemory::new(campaign));
    }

    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let snapshot = MemorySnapshot::from_json_str(&data)
        .with_context(|| format!("invalid snapshot {}", path.display()))?;

    if let Some(campaign) = campaign {
        if campaign != snapshot.campaign_id {
            anyhow::bail!(
                "snapshot {} belongs to campaign '{}', not '{}'",
                path.display(),
                snapshot.campaign_id,
                campaign
            );
        }
    }

    Ok(LayeredMemory::from_snapshot(snapshot, MemoryConfig::default())?)
}

/// Write the snapshot beside its target and rename it into place, so an
/// interrupted save leaves the previous file intact
fn save(memory: &LayeredMemory, path: &Path) -> anyhow::Result<()> {
    let data = memory.to_snapshot().to_json_string()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create temp file in {}", dir.display()))?;
    file.write_all(data.as_bytes())?;
    file.as_file().sync_all()?;
    file.persist(path)
        .with_context(|| format!("failed to write snapshot {}", path.display()))?;
    Ok(())
}

fn parse_content(raw: &str) -> anyhow::Result<chronicle::Content> {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(value @ serde_json::Value::Object(_)) => Ok(content_from_value(value)?),
        _ => {
            let mut content = chronicle::Content::new();
            content.insert("text".to_string(), serde_json::Value::String(raw.to_string()));
            Ok(content)
        }
    }
}

fn cmd_add(memory: &LayeredMemory, input: NewMemory) -> anyhow::Result<()> {
    let layer = input.layer;
    let memory_type = input.memory_type;
    let id = memory.add_memory(input)?;

    println!("{}", "Memory added".green().bold());
    println!("  ID:    {}", id.cyan());
    println!("  Type:  {}", memory_type);
    println!("  Layer: {}", layer);
    Ok(())
}

fn print_hits(hits: &[RecallHit]) {
    for hit in hits {
        let score = format!("{:.3}", hit.significance);
        let score = if hit.significance >= 0.7 {
            score.green()
        } else if hit.significance >= 0.3 {
            score.yellow()
        } else {
            score.red()
        };

        println!(
            "{}. {} {} {} | {}",
            hit.rank,
            hit.node.id.chars().take(8).collect::<String>().dimmed(),
            format!("[{} / {}]", hit.node.memory_type, hit.node.layer).cyan(),
            score,
            hit.node.serialized_content().chars().take(60).collect::<String>()
        );
    }
}

fn cmd_recall(memory: &LayeredMemory, query: &RecallQuery) {
    let hits = memory.recall(query);
    if hits.is_empty() {
        println!("{}", "No memories found".yellow());
        return;
    }

    println!("{}", format!("Recalled {} memories:", hits.len()).bold().green());
    println!();
    print_hits(&hits);
}

fn cmd_forget(memory: &LayeredMemory, threshold: Option<f64>) -> anyhow::Result<()> {
    let report = match threshold {
        Some(threshold) => memory.forget(threshold)?,
        None => memory.forget_default()?,
    };

    println!("{}", "Forgetting complete".green());
    println!("  Threshold: {:.2}", report.threshold);
    println!("  Checked:   {}", report.checked);
    println!("  Forgotten: {}", report.forgotten_count());
    for id in &report.forgotten {
        println!("    - {}", id.dimmed());
    }
    Ok(())
}

fn cmd_profile(memory: &LayeredMemory, user: &str) {
    let Some(profile) = memory.get_user_profile(user) else {
        println!("{}", format!("No profile for {}", user).yellow());
        return;
    };

    println!("{}", format!("Profile: {}", user).bold().underline());
    println!("  Memories recorded: {}", profile.memory_count);
    println!();
    println!("{}", "Emotions:".bold());
    for (emotion, count) in profile.top_emotions(profile.emotions.len()) {
        println!("  {:<14} {}", emotion.as_str(), count);
    }
    println!("{}", "Themes:".bold());
    for (theme, count) in profile.top_themes(profile.themes.len()) {
        println!("  {:<14} {}", theme, count);
    }
}

fn cmd_stats(memory: &LayeredMemory) {
    let stats = memory.stats_summary();

    println!("{}", "Chronicle Statistics".bold().underline());
    println!("  Campaign:    {}", memory.campaign_id().cyan());
    println!("  Short-term:  {}", stats.short_term);
    println!("  Mid-term:    {}", stats.mid_term);
    println!("  Long-term:   {}", stats.long_term);
    println!("  Users:       {}", stats.users);
    println!();
    println!("  Created:     {}", stats.created);
    println!("  Reinforced:  {}", stats.reinforced);
    println!("  Evicted:     {}", stats.evicted);
    println!("  Forgotten:   {}", stats.forgotten);
}

fn cmd_context(memory: &LayeredMemory, filters: &RecallArgs, max_tokens: usize) {
    let hits = memory.recall(&filters.to_query());
    let profile = filters
        .user
        .as_deref()
        .and_then(|user| memory.get_user_profile(user));

    let window = ContextWindow::new(max_tokens);
    let context = window.build(&hits, profile.as_ref());
    if context.is_empty() {
        println!("{}", "Nothing to render".yellow());
    } else {
        print!("{}", context);
    }
}
