use crate::config::{Config, FileConfig};
use crate::documents::{find_documents, find_image_assets, root_id, DocumentFile};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use imgref_core::store::{FileSystemStore, NamespacedStore, Store};
use imgref_core::{extract_image_keys, image_key_for_target, ImageIndexer};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[clap(version, about)]
pub struct Opts {
    /// Directory the index is persisted in.
    #[clap(long, env = "IMGREF_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Keep a separate index per user or profile within the data directory.
    #[clap(long, env = "IMGREF_NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// TOML config file (defaults to ./imgref.toml when present).
    #[clap(long, env = "IMGREF_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    #[clap(long, short, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub subcmd: ImgrefSubcommand,
}

#[derive(Subcommand)]
pub enum ImgrefSubcommand {
    /// Index every markdown document under a directory. Documents are keyed by
    /// their canonical path, so several roots can share one index.
    Index {
        root: PathBuf,

        /// Keep entries for documents under ROOT that no longer exist.
        #[clap(long)]
        no_prune: bool,
    },

    /// Re-index one document, or drop it if the file is gone.
    Update { root: PathBuf, file: PathBuf },

    /// Drop a document from the index by id.
    Remove { document_id: String },

    /// List every document and line that embeds an image.
    Query {
        /// Image name or path; only the file name is used.
        image: String,

        #[clap(long)]
        json: bool,
    },

    /// List images in a directory that no document references.
    Unused { assets_dir: PathBuf },

    /// Print the images a single file references without touching the index.
    Scan { file: PathBuf },

    /// Empty the index.
    Clear,
}

pub fn open_store(config: &Config) -> Result<Arc<dyn Store>> {
    let store = FileSystemStore::new(&config.data_dir).with_context(|| {
        format!("Failed to open data directory {}", config.data_dir.display())
    })?;
    let store: Arc<dyn Store> = match &config.namespace {
        Some(namespace) => Arc::new(NamespacedStore::new(namespace.clone(), store)),
        None => Arc::new(store),
    };
    Ok(store)
}

pub fn run(opts: Opts) -> Result<()> {
    let file_config = FileConfig::load(opts.config.as_deref())?;
    let config = Config::resolve(file_config, opts.data_dir, opts.namespace);
    tracing::debug!("Resolved config: {:?}", config);

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let open_indexer = || -> Result<ImageIndexer> { Ok(ImageIndexer::new(open_store(&config)?)) };

    match opts.subcmd {
        ImgrefSubcommand::Index { root, no_prune } => {
            let mut indexer = open_indexer()?;
            index_tree(&mut indexer, &root, &config.include, !no_prune, &mut out)
        }
        ImgrefSubcommand::Update { root, file } => {
            update_file(&mut open_indexer()?, &root, &file, &mut out)
        }
        ImgrefSubcommand::Remove { document_id } => {
            open_indexer()?.remove(&document_id);
            writeln!(out, "Removed {}", document_id)?;
            Ok(())
        }
        ImgrefSubcommand::Query { image, json } => query(&open_indexer()?, &image, json, &mut out),
        ImgrefSubcommand::Unused { assets_dir } => unused(&open_indexer()?, &assets_dir, &mut out),
        ImgrefSubcommand::Scan { file } => scan(&file, &mut out),
        ImgrefSubcommand::Clear => {
            open_indexer()?.clear();
            writeln!(out, "Index cleared")?;
            Ok(())
        }
    }
}

/// Index every matching document under `root`. With `prune`, documents
/// previously indexed under `root` that are no longer on disk are removed;
/// documents from other roots are left alone.
pub fn index_tree(
    indexer: &mut ImageIndexer,
    root: &Path,
    include: &[String],
    prune: bool,
    out: &mut impl Write,
) -> Result<()> {
    let documents = find_documents(root, include)?;
    let mut seen: BTreeSet<String> = BTreeSet::new();

    for document in &documents {
        let text = document.read_text()?;
        indexer.update(&document.id, &document.name, &text, document.modified());
        seen.insert(document.id.clone());
    }

    let mut pruned = 0;
    if prune {
        let prefix = format!("{}/", root_id(root)?);
        let stale: Vec<String> = indexer
            .index()
            .document_ids()
            .into_iter()
            .filter(|id| id.starts_with(&prefix) && !seen.contains(*id))
            .map(str::to_string)
            .collect();
        for id in &stale {
            indexer.remove(id);
        }
        pruned = stale.len();
    }

    writeln!(
        out,
        "Indexed {} document(s), {} image(s) referenced, {} stale document(s) removed",
        documents.len(),
        indexer.len(),
        pruned
    )?;
    Ok(())
}

pub fn update_file(
    indexer: &mut ImageIndexer,
    root: &Path,
    file: &Path,
    out: &mut impl Write,
) -> Result<()> {
    let path = if file.is_absolute() {
        file.to_path_buf()
    } else {
        root.join(file)
    };
    let document = DocumentFile::from_path(root, &root_id(root)?, &path)?;

    if path.is_file() {
        let text = document.read_text()?;
        indexer.update(&document.id, &document.name, &text, document.modified());
        writeln!(out, "Updated {}", document.id)?;
    } else {
        indexer.remove(&document.id);
        writeln!(out, "Removed {} (file no longer exists)", document.id)?;
    }
    Ok(())
}

pub fn query(indexer: &ImageIndexer, image: &str, json: bool, out: &mut impl Write) -> Result<()> {
    let key = image_key_for_target(image).unwrap_or(image);
    let entries = indexer.query(key);

    if json {
        serde_json::to_writer_pretty(&mut *out, entries)?;
        writeln!(out)?;
        return Ok(());
    }

    if entries.is_empty() {
        writeln!(out, "No documents reference {}", key)?;
        return Ok(());
    }

    writeln!(out, "{} is referenced by {} document(s):", key.bold(), entries.len())?;
    for entry in entries {
        writeln!(out, "\n{} ({})", entry.document_name.bold(), entry.document_id.dimmed())?;
        for position in &entry.positions {
            writeln!(
                out,
                "  {:>5}: {}",
                (position.line_number + 1).to_string().cyan(),
                position.context.trim()
            )?;
        }
    }
    Ok(())
}

pub fn unused(indexer: &ImageIndexer, assets_dir: &Path, out: &mut impl Write) -> Result<()> {
    let assets = find_image_assets(assets_dir)?;
    let unreferenced = indexer.unreferenced(assets.iter().map(String::as_str));

    if unreferenced.is_empty() {
        writeln!(out, "All {} image(s) are referenced", assets.len())?;
        return Ok(());
    }

    for name in &unreferenced {
        writeln!(out, "{}", name)?;
    }
    writeln!(
        out,
        "{} of {} image(s) unreferenced",
        unreferenced.len().to_string().yellow(),
        assets.len()
    )?;
    Ok(())
}

pub fn scan(file: &Path, out: &mut impl Write) -> Result<()> {
    let bytes = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    for key in extract_image_keys(&String::from_utf8_lossy(&bytes)) {
        writeln!(out, "{}", key)?;
    }
    Ok(())
}
