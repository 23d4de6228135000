//! Main entry point for the cbload CLI application.
//!
//! Loads a comic book archive from a local path or an HTTP URL, reporting
//! progress while the book loads and extracts, then lists or writes out the
//! resulting pages.

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing_subscriber::EnvFilter;

use cbload::{Book, BookEvent, Cli, HttpByteSource, LocalFileSource, PageKind};

/// Application entry point.
///
/// Parses command-line arguments, loads the book from the appropriate source
/// kind, and dispatches to the listing/writing handlers.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut book = Book::with_origin(cli.book_name(), cli.file.clone());

    if !cli.quiet {
        book.subscribe(|_, event| match event {
            BookEvent::Progress {
                loading,
                unarchiving,
            } => {
                eprint!(
                    "\rloading {:5.1}%  extracting {:5.1}%",
                    loading * 100.0,
                    unarchiving * 100.0
                );
            }
            BookEvent::PagesDropped { count } => {
                eprintln!("\nwarning: {count} entries could not become pages");
            }
            BookEvent::ExtractionComplete { page_count } => {
                eprintln!("\rloading 100.0%  extracting 100.0%  ({page_count} pages)");
            }
            _ => {}
        });
    }

    if cli.is_http_url() {
        // Remote book: stream it down, then report network statistics
        let mut source = HttpByteSource::open(cli.file.clone()).await?;
        book.load_from_byte_source(&mut source, None).await?;

        if !cli.quiet {
            eprintln!(
                "Total bytes transferred: {}",
                format_size(source.transferred_bytes())
            );
        }
    } else {
        // Local book
        let source = LocalFileSource::open(Path::new(&cli.file)).await?;
        book.load_from_byte_source(source, None).await?;
    }

    if cli.list || cli.verbose {
        list_pages(&book, cli.verbose);
    }

    if let Some(ref dir) = cli.out_dir {
        write_pages(&book, dir, cli.quiet).await?;
    }

    if !cli.list && !cli.verbose && cli.out_dir.is_none() && !cli.quiet {
        let total: usize = book.pages().iter().map(|p| p.data.len()).sum();
        eprintln!(
            "{}: {} pages, {}",
            book.name(),
            book.page_count(),
            format_size(total as u64)
        );
    }

    Ok(())
}

/// List pages of the loaded book.
///
/// Supports two output formats:
/// - Simple format (`-l`): just page names, one per line
/// - Verbose format (`-v`): table with sequence, size, and image kind
fn list_pages(book: &Book, verbose: bool) {
    if verbose {
        println!("{:>4}  {:>10}  {:>5}  Name", "Seq", "Size", "Kind");
        println!("{}", "-".repeat(50));
    }

    let mut total_bytes = 0u64;
    for (index, page) in book.pages().iter().enumerate() {
        if verbose {
            println!(
                "{:>4}  {:>10}  {:>5}  {}",
                index + 1,
                page.data.len(),
                kind_label(page.kind),
                page.file_name
            );
            total_bytes += page.data.len() as u64;
        } else {
            println!("{}", page.file_name);
        }
    }

    if verbose {
        println!("{}", "-".repeat(50));
        println!(
            "{:>4}  {:>10}  {:>5}  {} pages",
            "",
            total_bytes,
            "",
            book.page_count()
        );
    }
}

/// Write every page into the output directory, preserving archive paths.
async fn write_pages(book: &Book, dir: &str, quiet: bool) -> Result<()> {
    for page in book.pages() {
        let output_path = PathBuf::from(dir).join(&page.file_name);

        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        if !quiet {
            println!("  writing: {}", page.file_name);
        }

        let mut file = fs::File::create(&output_path).await?;
        file.write_all(&page.data).await?;
    }

    Ok(())
}

fn kind_label(kind: PageKind) -> &'static str {
    match kind {
        PageKind::Jpeg => "jpeg",
        PageKind::Png => "png",
        PageKind::Gif => "gif",
        PageKind::Webp => "webp",
    }
}

/// Format a byte size into a human-readable string.
///
/// Automatically selects the appropriate unit (bytes, KB, MB, GB)
/// based on the size magnitude.
fn format_size(size: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if size >= GB {
        format!("{:.2} GB", size as f64 / GB as f64)
    } else if size >= MB {
        format!("{:.2} MB", size as f64 / MB as f64)
    } else if size >= KB {
        format!("{:.2} KB", size as f64 / KB as f64)
    } else {
        format!("{} bytes", size)
    }
}
