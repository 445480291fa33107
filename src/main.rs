use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Result;
use clap::Parser;
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use tracing_subscriber::EnvFilter;
use vidup::config::{init_config, DEFAULT_CONFIG_FILE};
use vidup::utils::format_file_size;
use vidup::{
    validate_video_file,
    Autosaver,
    DraftStore,
    FileDescriptor,
    FileStorage,
    UploadLifecycle,
    UploadSnapshot,
    UploadStatus,
    VideoMetadata,
};

/// Simulated video upload with draft autosave.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// File size in bytes
    #[arg(long, default_value_t = 2_000_000_000)]
    size: u64,

    /// MIME type of the file
    #[arg(long, default_value = "video/mp4")]
    mime: String,

    /// Title written to the draft
    #[arg(long, default_value = "Untitled upload")]
    title: String,

    /// Config file
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Inject a failure this many milliseconds in, then retry once
    #[arg(long)]
    fail_after_ms: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = init_config(&args.config)?;

    let file = FileDescriptor::new(args.title.clone(), args.size, args.mime.clone());
    validate_video_file(&file, config.validation.max_file_size)?;
    tracing::info!(size = %format_file_size(file.size), mime = %file.mime_type, "file accepted");

    let store = DraftStore::new(FileStorage::new(&config.draft.storage_dir), config.draft.key.clone());
    if store.has_draft().await {
        if let Ok(Some(draft)) = store.load_draft::<VideoMetadata>().await {
            tracing::info!(title = %draft.record.title, saved_at = %draft.saved_at, "found saved draft");
        }
    }

    let autosaver = Autosaver::for_metadata(store.clone(), config.draft.autosave_debounce());
    autosaver.update(VideoMetadata {
        title: args.title.clone(),
        ..Default::default()
    });

    let handle = UploadLifecycle::new(config.lifecycle.clone());
    let lifecycle = handle.lifecycle.clone();
    let mut rx = lifecycle.watch();
    lifecycle.start_upload(file).await?;

    let injector = args.fail_after_ms.map(|millis| {
        let lifecycle = lifecycle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            let _ = lifecycle.fail("Injected failure").await;
        })
    });

    let mut stdout = io::stdout();
    let mut retried = false;
    let outcome = loop {
        rx.changed().await?;
        let snapshot = rx.borrow_and_update().clone();
        render(&mut stdout, &snapshot)?;

        match snapshot.status {
            UploadStatus::Ready => break snapshot,
            UploadStatus::Error if !retried => {
                retried = true;
                lifecycle.retry_upload().await?;
            }
            UploadStatus::Error => break snapshot,
            _ => {}
        }
    };
    writeln!(stdout)?;

    if let Some(injector) = injector {
        injector.abort();
    }
    drop(lifecycle);
    handle.shutdown().await?;
    autosaver.shutdown().await;

    if outcome.can_publish() {
        store.clear_draft().await?;
        if let Some(video_id) = outcome.video_id {
            println!("Published {}", video_id);
        }
    } else {
        println!(
            "Upload failed: {}. Draft kept under `{}`.",
            outcome.error_message.as_deref().unwrap_or("unknown error"),
            store.key()
        );
    }

    Ok(())
}

fn render(out: &mut impl Write, snapshot: &UploadSnapshot) -> io::Result<()> {
    const WIDTH: usize = 30;
    let filled = ((snapshot.progress / 100.0) * WIDTH as f64) as usize;

    execute!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
    write!(
        out,
        "[{}{}] {:>5.1}% {}",
        "#".repeat(filled.min(WIDTH)),
        "-".repeat(WIDTH - filled.min(WIDTH)),
        snapshot.progress,
        snapshot.status
    )?;
    out.flush()
}
