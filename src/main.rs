use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Args, Parser, Subcommand, ValueEnum};

use doc_indexer::embed::{
    embed_workspace, Embedder, HashEmbedder, HttpEmbedder, DEFAULT_BATCH_SIZE, DEFAULT_MODEL,
};
use doc_indexer::error::Result as CoreResult;
use doc_indexer::index::build_index;
use doc_indexer::parser::classify::ClassifierConfig;
use doc_indexer::parser::extract::{RawDocument, TEXT_BLOCK};
use doc_indexer::parser::process_document;
use doc_indexer::retriever::{Retriever, SearchResult, DEFAULT_K};
use doc_indexer::workspace::Workspace;

#[derive(Parser)]
#[command(name = "doc_indexer", about = "Segment paginated documents into blocks and search them semantically")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct EmbedArgs {
    /// Embedding model identifier (must match between index and search)
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,
    /// OpenAI-compatible embeddings endpoint base URL
    #[arg(long, default_value = "http://localhost:8080/v1")]
    embed_url: String,
    /// Use deterministic hash embeddings instead of the HTTP endpoint
    #[arg(long)]
    offline: bool,
    /// Vector dimension for --offline hash embeddings
    #[arg(long, default_value_t = 384)]
    dimension: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum KindFilter {
    Table,
    Image,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse page geometry, classify blocks, embed, and build the index
    Index {
        /// Page geometry JSON dump
        geometry: PathBuf,
        /// Document identifier (default: geometry file stem)
        #[arg(long)]
        doc_id: Option<String>,
        #[arg(long, default_value = "data/workspace.json")]
        workspace: PathBuf,
        #[arg(long, default_value = "data/blocks.index")]
        index: PathBuf,
        /// Texts per embedding request
        #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,
        #[command(flatten)]
        embed: EmbedArgs,
    },
    /// Search the persisted index
    Search {
        query: String,
        /// Max results to return
        #[arg(short = 'k', long, default_value_t = DEFAULT_K)]
        k: usize,
        /// Restrict results to one structural type
        #[arg(long)]
        kind: Option<KindFilter>,
        #[arg(long, default_value = "data/workspace.json")]
        workspace: PathBuf,
        #[arg(long, default_value = "data/blocks.index")]
        index: PathBuf,
        #[command(flatten)]
        embed: EmbedArgs,
    },
    /// Show workspace statistics
    Stats {
        #[arg(long, default_value = "data/workspace.json")]
        workspace: PathBuf,
    },
    /// Font size/name/flags distributions from a geometry dump
    Fonts {
        geometry: PathBuf,
        /// Max pages to sample
        #[arg(short = 'n', long, default_value_t = 10)]
        pages: usize,
    },
}

/// CLI-selected embedding backend.
enum AnyEmbedder {
    Http(HttpEmbedder),
    Hash(HashEmbedder),
}

impl Embedder for AnyEmbedder {
    fn model_id(&self) -> &str {
        match self {
            AnyEmbedder::Http(e) => e.model_id(),
            AnyEmbedder::Hash(e) => e.model_id(),
        }
    }

    async fn encode(&self, texts: &[String]) -> CoreResult<Vec<Vec<f32>>> {
        match self {
            AnyEmbedder::Http(e) => e.encode(texts).await,
            AnyEmbedder::Hash(e) => e.encode(texts).await,
        }
    }
}

fn make_embedder(args: &EmbedArgs) -> anyhow::Result<AnyEmbedder> {
    if args.offline {
        return Ok(AnyEmbedder::Hash(HashEmbedder::new(args.dimension)));
    }
    let api_key = std::env::var("EMBEDDING_API_KEY").ok();
    Ok(AnyEmbedder::Http(HttpEmbedder::new(
        &args.embed_url,
        &args.model,
        api_key,
    )?))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Index {
            geometry,
            doc_id,
            workspace,
            index,
            batch_size,
            embed,
        } => {
            let raw = RawDocument::load(&geometry)?;
            let doc_id = doc_id.unwrap_or_else(|| {
                geometry
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string())
            });

            let mut ws = process_document(&raw, &doc_id, &ClassifierConfig::default());
            let stats = ws.stats();
            println!(
                "Parsed {} pages into {} blocks ({} headings, {} body, {} skip)",
                ws.num_pages,
                stats.total,
                stats.h1 + stats.h2 + stats.h3,
                stats.body,
                stats.skip
            );

            let embedder = make_embedder(&embed)?;
            println!("Embedding with {}...", embedder.model_id());
            let embedded = embed_workspace(&mut ws, &embedder, batch_size, true).await?;

            let (flat, indexed) = build_index(&ws)?;
            ensure_parent(&index)?;
            ensure_parent(&workspace)?;
            flat.save(&index)?;
            ws.save(&workspace)?;

            println!(
                "Embedded {} blocks, indexed {} vectors (dim {}).",
                embedded,
                indexed.len(),
                flat.dimension()
            );
            println!(
                "Workspace: {} | Index: {}",
                workspace.display(),
                index.display()
            );
            Ok(())
        }
        Commands::Search {
            query,
            k,
            kind,
            workspace,
            index,
            embed,
        } => {
            let embedder = make_embedder(&embed)?;
            let retriever = Retriever::from_files(&index, &workspace, embedder)?;

            let results = match kind {
                Some(KindFilter::Table) => retriever.search_tables(&query, k).await?,
                Some(KindFilter::Image) => retriever.search_images(&query, k).await?,
                None => retriever.search_text(&query, k).await?,
            };

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            print_results(&results);
            Ok(())
        }
        Commands::Stats { workspace } => {
            let s = Workspace::load(&workspace)?.stats();
            println!("Document:  {}", s.doc_id);
            println!("Pages:     {}", s.num_pages);
            println!("Blocks:    {}", s.total);
            println!("  h1:      {}", s.h1);
            println!("  h2:      {}", s.h2);
            println!("  h3:      {}", s.h3);
            println!("  body:    {}", s.body);
            println!("  skip:    {}", s.skip);
            println!("  table:   {}", s.table);
            println!("  image:   {}", s.image);
            println!("Embedded:  {}", s.embedded);
            Ok(())
        }
        Commands::Fonts { geometry, pages } => {
            let raw = RawDocument::load(&geometry)?;
            print_font_report(&raw, pages);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_results(results: &[SearchResult]) {
    println!(
        "{:>3} | {:>5} | {:>4} | {:<30} | {}",
        "#", "sim", "page", "Section", "Content"
    );
    println!("{}", "-".repeat(110));

    for (i, r) in results.iter().enumerate() {
        let content = truncate(&r.content.replace('\n', " "), 56);
        println!(
            "{:>3} | {:>5.3} | {:>4} | {:<30} | {}",
            i + 1,
            r.similarity,
            r.page,
            truncate(&r.section_path, 30),
            content
        );
    }

    println!("\n{} results | unit id: block_<page>_<idx>", results.len());
}

fn print_font_report(raw: &RawDocument, pages: usize) {
    let mut sizes: HashMap<String, usize> = HashMap::new();
    let mut fonts: HashMap<String, usize> = HashMap::new();
    let mut flags: HashMap<u32, usize> = HashMap::new();
    let mut spans = 0usize;

    for page in raw.pages.iter().take(pages) {
        for block in &page.blocks {
            if block.kind != TEXT_BLOCK {
                continue;
            }
            for line in &block.lines {
                for span in &line.spans {
                    spans += 1;
                    *sizes.entry(format!("{:.2}", span.size)).or_default() += 1;
                    *fonts.entry(span.font.clone()).or_default() += 1;
                    *flags.entry(span.flags).or_default() += 1;
                }
            }
        }
    }

    println!(
        "Sampled {} spans from the first {} page(s)\n",
        spans,
        pages.min(raw.pages.len())
    );

    println!("Font sizes:");
    for (size, count) in sorted_counts(sizes) {
        println!("  {:>8}pt: {:>6} spans", size, count);
    }

    println!("\nFont names:");
    for (font, count) in sorted_counts(fonts) {
        println!("  {:<32} {:>6} spans", font, count);
    }

    println!("\nSpan flags:");
    let mut flag_rows: Vec<(u32, usize)> = flags.into_iter().collect();
    flag_rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (flag, count) in flag_rows {
        let bold = flag & 16 != 0;
        let italic = flag & 2 != 0;
        println!(
            "  {:>5}: {:>6} spans (bold={}, italic={})",
            flag, count, bold, italic
        );
    }
}

fn sorted_counts(counts: HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut rows: Vec<(String, usize)> = counts.into_iter().collect();
    rows.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    rows
}

fn ensure_parent(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
