//! Command-line download example
//!
//! Downloads one HLS stream into `./downloads`:
//! - Lists the available variants with their size estimates
//! - Picks the variant given by index (default: the best one)
//! - Prints progress events until the file is written
//! - Cancels cleanly on Ctrl+C
//!
//! ```bash
//! RUST_LOG=hls_dl=debug cargo run --example download -- <playlist-url> [title] [variant-index]
//! ```

use hls_dl::{Config, DownloadRequest, Event, HlsDownloader, download_with_shutdown};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let Some(url) = args.next() else {
        eprintln!("usage: download <playlist-url> [title] [variant-index]");
        std::process::exit(2);
    };
    let title = args.next();
    let choice: Option<usize> = args.next().map(|s| s.parse()).transpose()?;

    let mut config = Config::default();
    config.output.output_dir = "downloads".into();
    let downloader = HlsDownloader::new(config)?;

    let options = downloader.variant_options(&url).await?;
    for (i, option) in options.iter().enumerate() {
        println!("[{i}] {}", option.label);
    }

    let mut request = DownloadRequest::new(&url);
    if let Some(title) = title {
        request = request.with_title(title);
    }
    if let Some(option) = choice.and_then(|i| options.get(i)) {
        request = request.with_variant(option.variant.clone());
    }

    let mut events = downloader.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                Event::Started {
                    id, segments, path, ..
                } => {
                    println!("▶ Download #{id}: {segments} segments -> {}", path.display());
                }
                Event::Progress {
                    id,
                    percent,
                    done,
                    total,
                    ..
                } => {
                    println!("⬇ Download #{id}: {percent:.1}% ({done}/{total})");
                }
                Event::Paused { id } => println!("⏸ Download #{id} paused"),
                Event::Resumed { id } => println!("▶ Download #{id} resumed"),
                Event::Completed { id, bytes, .. } => {
                    println!("✓ Download #{id} complete: {bytes} bytes");
                }
                Event::Failed {
                    id,
                    category,
                    error,
                } => {
                    println!("✗ Download #{id} failed ({category}): {error}");
                }
                Event::Cancelled { id } => println!("✗ Download #{id} cancelled"),
                _ => {}
            }
        }
    });

    let handle = downloader.start(request).await?;
    let outcome = download_with_shutdown(handle).await?;
    println!("Saved {}", outcome.path.display());

    Ok(())
}
