//! ReplyMate: review reply assistant for small restaurant owners.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use replymate_core::{ReplyMateConfig, Sentiment, Tone};
use replymate_data::{DataStore, ReviewPeriod};
use replymate_llm::{create_embedder, LLMConfig};
use replymate_pipeline::{KnowledgeBase, PipelineState, ReplyRequest, Services};
use replymate_store::SqliteStore;

mod args;

use args::{sentiment_filter, Cli, Command, ReplyArgs};

fn print_reply(state: &PipelineState) {
    println!(
        "[{} / {} / menu: {}]",
        state.sentiment.map_or("-", |s| s.as_str()),
        state.category.map_or("-", |c| c.as_str()),
        state.extracted_menu.as_deref().unwrap_or("-")
    );
    println!();
    println!("{}", state.final_reply.as_deref().unwrap_or_default());
}

/// Knowledge base over the local store, without a completion provider.
fn open_knowledge(config: &ReplyMateConfig) -> anyhow::Result<KnowledgeBase> {
    let llm_config = LLMConfig::load(&config.data_paths.llm_config_file);
    let store = SqliteStore::open(&config.data_paths.vectordb, config.embedding_dim)
        .map_err(|e| anyhow::anyhow!("Failed to open store: {}", e))?;
    let embedder = create_embedder(&llm_config, config.embedding_dim);
    Ok(KnowledgeBase::new(Arc::new(store), embedder))
}

fn open_data(config: &ReplyMateConfig) -> DataStore {
    DataStore::new(&config.data_paths, config.pipeline.default_store_name.clone())
}

async fn services(config: &ReplyMateConfig) -> anyhow::Result<Services> {
    let services = Services::from_config(config).context("Failed to initialise services")?;
    if services.knowledge.ensure_ready(&services.data).await? {
        info!("Search index built on first use");
    }
    Ok(services)
}

async fn reply(config: &ReplyMateConfig, parsed: ReplyArgs, rewrite: bool) -> anyhow::Result<()> {
    let request = parsed.to_request().map_err(anyhow::Error::msg)?;
    let services = services(config).await?;
    let pipeline = services.pipeline();

    let state = if rewrite || parsed.feedback.is_some() {
        pipeline.rewrite(request, parsed.feedback.as_deref()).await?
    } else {
        pipeline.run(request).await?
    };
    print_reply(&state);

    if parsed.save {
        let record = state
            .to_completed_review(uuid::Uuid::new_v4().to_string())
            .context("No reply to save")?;
        services.data.upsert_completed_review(record)?;
        info!("Saved reply to {}", config.data_paths.saved_reviews_file.display());
    }
    Ok(())
}

fn read_requests(path: &Path) -> anyhow::Result<Vec<ReplyRequest>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Malformed request file {}", path.display()))
}

async fn batch(
    config: &ReplyMateConfig,
    file: Option<PathBuf>,
    tone: Option<Tone>,
) -> anyhow::Result<bool> {
    let services = services(config).await?;
    let runner = services.batch();

    let outcomes = match file {
        Some(path) => runner.run(read_requests(&path)?).await,
        None => {
            runner
                .generate_drafts(&services.data, tone.unwrap_or_default(), None)
                .await?
        }
    };

    for outcome in &outcomes {
        match &outcome.result {
            Ok(state) => {
                println!("=== {} ===", outcome.id);
                print_reply(state);
                println!();
            }
            Err(message) => println!("=== {} === FAILED: {}", outcome.id, message),
        }
    }
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    println!("{} processed, {} failed", outcomes.len(), failed);
    Ok(failed == 0)
}

async fn learn(config: &ReplyMateConfig, words: &[String]) -> anyhow::Result<()> {
    let text = words.join(" ");
    let services = services(config).await?;
    let template = services.trainer().learn(&text).await?;
    println!(
        "Learned ({} / {}): {}",
        template.metadata.sentiment, template.metadata.category, template.content
    );
    Ok(())
}

async fn reset(config: &ReplyMateConfig) -> anyhow::Result<()> {
    let services = services(config).await?;
    let removed = services.trainer().reset().await?;
    println!("Removed {} learned replies. Saved reviews cleared.", removed);
    Ok(())
}

async fn reindex(config: &ReplyMateConfig) -> anyhow::Result<()> {
    let knowledge = open_knowledge(config)?;
    let count = knowledge.rebuild_from(&open_data(config)).await?;
    println!("Indexed {} documents", count);
    Ok(())
}

fn stats(
    config: &ReplyMateConfig,
    period: ReviewPeriod,
    sentiment: Option<Sentiment>,
) -> anyhow::Result<()> {
    let stats = open_data(config).review_stats(period, sentiment_filter(sentiment));
    println!("Reviews:        {}", stats.count);
    println!("Positive ratio: {:.1}%", stats.positive_ratio);
    println!(
        "Latest:         {}",
        stats
            .latest
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".into())
    );
    Ok(())
}

fn status(config: &ReplyMateConfig) -> anyhow::Result<()> {
    let summary = LLMConfig::load(&config.data_paths.llm_config_file).summary();
    let knowledge = open_knowledge(config)?;
    let store_stats = knowledge.store().get_stats()?;
    let data = open_data(config);

    println!("=== ReplyMate Status ===");
    println!();
    println!("Data directory:   {}", config.data_paths.root.display());
    println!("Store name:       {}", data.store_profile().store_name);
    println!(
        "Completion:       {}",
        summary.active_model.as_deref().unwrap_or("not configured")
    );
    println!(
        "Embeddings:       {}",
        summary.embedding_model.as_deref().unwrap_or("none (metadata order)")
    );
    println!(
        "Sentiment:        {}",
        config.pipeline.sentiment_api_url.as_deref().unwrap_or("language model")
    );
    println!("Templates:        {}", data.load_templates().len());
    println!("Menu items:       {}", data.load_menu().len());
    println!("Indexed docs:     {}", knowledge.document_count()?);
    println!("Stored vectors:   {}", store_stats.embeddings_stored);
    println!("Database size:    {:.2} MB", store_stats.db_size_mb);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Data directory: {}", cli.data_dir.display());
    let config = ReplyMateConfig::from_env(&cli.data_dir)?;

    match cli.command {
        Command::Reply(args) => reply(&config, args, false).await?,
        Command::Rewrite(args) => reply(&config, args, true).await?,
        Command::Batch { file, tone } => {
            if !batch(&config, file, tone).await? {
                std::process::exit(1);
            }
        }
        Command::Learn { text } => learn(&config, &text).await?,
        Command::Reset => reset(&config).await?,
        Command::Reindex => reindex(&config).await?,
        Command::Stats { period, sentiment } => stats(&config, period, sentiment)?,
        Command::Status => status(&config)?,
    }
    Ok(())
}
