use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use travelsketch::bitmap::{BitmapCache, BitmapError, HttpImageFetcher};
use travelsketch::classify::NoReceipts;
use travelsketch::config::{ConfigError, ExportConfig, FetchTimeouts, PlacementConfig, SketchConfig};
use travelsketch::layout::TextStyle;
use travelsketch::source::FsMediaSource;
use travelsketch::store::firebase::{FirebaseBoxStore, FirebaseMediaStore};
use travelsketch::store::memory::{InMemoryBoxStore, InMemoryMediaStore};
use travelsketch::store::{BoxStore, MediaStore, StoreError};
use travelsketch::{CanvasBox, CanvasSession, SessionDeps, SessionError};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("bitmap error: {0}")]
    Bitmap(#[from] BitmapError),
    #[error("{0}")]
    Session(#[from] SessionError),
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("canvas is read-only or nothing was placed")]
    NothingPlaced,
    #[error("no box selected")]
    NothingSelected,
    #[error("export failed; see log")]
    ExportFailed,
}

#[derive(Parser, Debug)]
#[command(name = "travelsketch", about = "Travel canvas CLI")]
struct Cli {
    #[arg(long, env = "TRAVELSKETCH_CANVAS")]
    canvas: String,

    #[arg(long, default_value_t = false, help = "Use in-process stores instead of Firebase")]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    List,
    AddText {
        text: String,
        #[arg(long, default_value_t = 0.0)]
        x: f32,
        #[arg(long, default_value_t = 0.0)]
        y: f32,
    },
    AddImage {
        source: String,
        #[arg(long, default_value_t = 0.0)]
        x: f32,
        #[arg(long, default_value_t = 0.0)]
        y: f32,
    },
    AddVideo {
        source: String,
        #[arg(long, default_value_t = 0.0)]
        x: f32,
        #[arg(long, default_value_t = 0.0)]
        y: f32,
    },
    Move {
        box_id: String,
        x: i32,
        y: i32,
    },
    Delete {
        box_id: String,
    },
    SaveAll,
    Export {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

struct Wiring {
    boxes: Arc<dyn BoxStore>,
    media: Arc<dyn MediaStore>,
    fetch: FetchTimeouts,
    placement: PlacementConfig,
    export: ExportConfig,
}

fn wiring(offline: bool) -> Result<Wiring, CliError> {
    if offline {
        return Ok(Wiring {
            boxes: Arc::new(InMemoryBoxStore::new()),
            media: Arc::new(InMemoryMediaStore::default()),
            fetch: FetchTimeouts::default(),
            placement: PlacementConfig::default(),
            export: ExportConfig::default(),
        });
    }
    let config = SketchConfig::from_env()?;
    Ok(Wiring {
        boxes: Arc::new(FirebaseBoxStore::new(&config.firebase)?),
        media: Arc::new(FirebaseMediaStore::new(&config.firebase)?),
        fetch: config.fetch,
        placement: config.placement,
        export: config.export,
    })
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let wiring = wiring(cli.offline)?;
    let deps = SessionDeps {
        boxes: wiring.boxes,
        media: wiring.media,
        source: Arc::new(FsMediaSource),
        classifier: Arc::new(NoReceipts),
        bitmaps: Arc::new(BitmapCache::new(Arc::new(HttpImageFetcher::new(wiring.fetch)?))),
        text: Arc::new(TextStyle { size: wiring.placement.text_size }),
        placement: wiring.placement,
    };

    let session = CanvasSession::open(deps, &cli.canvas).await;
    let result = run(&session, cli.command, &wiring.export).await;
    session.settle().await;
    session.close();
    result
}

async fn run(session: &CanvasSession, command: Command, export: &ExportConfig) -> Result<(), CliError> {
    match command {
        Command::List => {
            for canvas_box in session.render_state().await {
                print_box(&canvas_box)?;
            }
        }
        Command::AddText { text, x, y } => {
            session.start_text_placement(&text).await;
            place(session, x, y).await?;
        }
        Command::AddImage { source, x, y } => {
            session.start_image_placement(&source).await;
            place(session, x, y).await?;
        }
        Command::AddVideo { source, x, y } => {
            session.start_video_placement(&source).await;
            place(session, x, y).await?;
        }
        Command::Move { box_id, x, y } => {
            session.select(&box_id).await?;
            let moved = session
                .update_box_position(x, y)
                .await?
                .ok_or(CliError::NothingSelected)?;
            print_box(&moved)?;
        }
        Command::Delete { box_id } => {
            session.select(&box_id).await?;
            let removed = session.delete().await?.ok_or(CliError::NothingSelected)?;
            print_box(&removed)?;
        }
        Command::SaveAll => {
            let saved = session.save_all().await;
            println!("{saved}");
        }
        Command::Export { dir } => {
            session.reload_all_images().await;
            session.settle().await;
            let path = session
                .export_pdf(&dir, export)
                .await
                .ok_or(CliError::ExportFailed)?;
            println!("{}", path.display());
        }
    }
    Ok(())
}

async fn place(session: &CanvasSession, x: f32, y: f32) -> Result<(), CliError> {
    let placed = session.create_box(x, y).await?.ok_or(CliError::NothingPlaced)?;
    print_box(&placed)
}

fn print_box(canvas_box: &CanvasBox) -> Result<(), CliError> {
    let line = serde_json::json!({ "id": canvas_box.id, "box": canvas_box });
    println!("{}", serde_json::to_string(&line)?);
    Ok(())
}
