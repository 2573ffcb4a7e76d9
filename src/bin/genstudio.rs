//! CLI for genstudio - generate, edit, and discuss images.

use clap::{Args, Parser, Subcommand, ValueEnum};
use genstudio::gallery::{GalleryItem, GalleryView};
use genstudio::{
    AspectRatio, Command, FileStore, GalleryStore, GeminiProvider, KeyValueStore, MemoryStore,
    Outcome, PrimingOutcome, Studio, StudioConfig, Tab, TurnOutcome, UploadedImage,
};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "genstudio")]
#[command(about = "Generate, edit, and chat about images via the Gemini API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Gallery directory (defaults to $GENSTUDIO_GALLERY_DIR or the user data dir)
    #[arg(long, global = true)]
    gallery_dir: Option<PathBuf>,

    /// Keep the gallery in memory only
    #[arg(long, global = true)]
    ephemeral: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate images from a text prompt
    Generate(GenerateArgs),

    /// Edit an image with a text instruction
    Edit(EditArgs),

    /// Chat about an image
    Analyze(AnalyzeArgs),

    /// Browse the gallery
    #[command(subcommand)]
    Gallery(GalleryCommand),
}

#[derive(Args)]
struct GenerateArgs {
    /// The text prompt describing the image
    prompt: String,

    /// Things the image should not contain
    #[arg(short, long)]
    negative: Option<String>,

    /// Number of images (1-4)
    #[arg(short = 'n', long)]
    count: Option<u32>,

    /// Aspect ratio
    #[arg(long, value_enum)]
    aspect_ratio: Option<AspectRatioArg>,

    /// Also write the images into this directory
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Retries on transient failures
    #[arg(long, default_value_t = 0)]
    retries: u32,
}

#[derive(Args)]
struct EditArgs {
    /// Image to edit
    image: PathBuf,

    /// What to change
    instruction: String,

    /// Also write the edited image to this path
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Image to discuss
    image: PathBuf,
}

#[derive(Subcommand)]
enum GalleryCommand {
    /// List gallery items, newest first
    List,
    /// Show one item
    Show {
        /// Item id
        id: u64,
        /// Write the image to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Print only the prompt, for piping (overrides --json)
        #[arg(long)]
        prompt_only: bool,
    },
    /// Delete one item
    Delete {
        /// Item id
        id: u64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum AspectRatioArg {
    #[value(name = "1:1")]
    Square,
    #[value(name = "16:9")]
    Landscape,
    #[value(name = "9:16")]
    Portrait,
    #[value(name = "4:3")]
    Standard,
    #[value(name = "3:4")]
    StandardPortrait,
}

impl From<AspectRatioArg> for AspectRatio {
    fn from(arg: AspectRatioArg) -> Self {
        match arg {
            AspectRatioArg::Square => AspectRatio::Square,
            AspectRatioArg::Landscape => AspectRatio::Landscape,
            AspectRatioArg::Portrait => AspectRatio::Portrait,
            AspectRatioArg::Standard => AspectRatio::Standard,
            AspectRatioArg::StandardPortrait => AspectRatio::StandardPortrait,
        }
    }
}

type CliStudio = Studio<GeminiProvider, GeminiProvider, GeminiProvider, Arc<dyn KeyValueStore>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = StudioConfig::from_env();
    if let Some(dir) = cli.gallery_dir.clone() {
        config = config.with_gallery_dir(dir);
    }
    let store: Arc<dyn KeyValueStore> = if cli.ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(&config.gallery_dir))
    };
    let gallery = GalleryStore::load(store);

    match cli.command {
        Commands::Generate(args) => {
            let mut studio = build_studio(gallery)?;
            generate(&mut studio, &config, args, cli.json).await?;
        }
        Commands::Edit(args) => {
            let mut studio = build_studio(gallery)?;
            edit(&mut studio, args, cli.json).await?;
        }
        Commands::Analyze(args) => {
            let mut studio = build_studio(gallery)?;
            analyze(&mut studio, args, cli.json).await?;
        }
        // Browsing the gallery needs no API key.
        Commands::Gallery(command) => run_gallery(command, gallery, cli.json)?,
    }

    Ok(())
}

fn build_studio(gallery: GalleryStore<Arc<dyn KeyValueStore>>) -> anyhow::Result<CliStudio> {
    let gemini = Arc::new(GeminiProvider::builder().build()?);
    Ok(Studio::new(
        Arc::clone(&gemini),
        Arc::clone(&gemini),
        gemini,
        gallery,
    ))
}

async fn generate(
    studio: &mut CliStudio,
    config: &StudioConfig,
    args: GenerateArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut request = config.generation_request(&args.prompt);
    if let Some(negative) = args.negative {
        request = request.with_negative_prompt(negative);
    }
    if let Some(count) = args.count {
        request = request.with_count(count);
    }
    if let Some(ar) = args.aspect_ratio {
        request = request.with_aspect_ratio(ar.into());
    }
    let extension = request.format.extension();

    studio.set_retries(args.retries);
    match studio.dispatch(Command::Generate(request)).await? {
        Outcome::Generated(items) => {
            let mut written = Vec::new();
            if let Some(dir) = &args.output_dir {
                std::fs::create_dir_all(dir)?;
                for item in &items {
                    let path = dir.join(format!("generated-{}.{}", item.id, extension));
                    write_artifact(item, &path)?;
                    written.push(path);
                }
            }
            report_items(&items, &written, json_output)?;
        }
        other => report_failure(other, json_output)?,
    }
    Ok(())
}

async fn edit(studio: &mut CliStudio, args: EditArgs, json_output: bool) -> anyhow::Result<()> {
    let image = UploadedImage::from_path(&args.image)?;
    studio.dispatch(Command::SelectTab(Tab::Edit)).await?;
    studio.dispatch(Command::UploadEditImage(image)).await?;

    match studio
        .dispatch(Command::Edit {
            instruction: args.instruction,
        })
        .await?
    {
        Outcome::Edited(item) => {
            let mut written = Vec::new();
            if let Some(path) = &args.output {
                write_artifact(&item, path)?;
                written.push(path.clone());
            }
            report_items(std::slice::from_ref(&item), &written, json_output)?;
        }
        other => report_failure(other, json_output)?,
    }
    Ok(())
}

async fn analyze(
    studio: &mut CliStudio,
    args: AnalyzeArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let image = UploadedImage::from_path(&args.image)?;
    studio.dispatch(Command::SelectTab(Tab::Analyze)).await?;

    eprintln!("Preparing analysis of {}...", args.image.display());
    prime(studio, image.clone()).await?;
    eprintln!("Ask about the image. ':reset' starts over, ':quit' exits.");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        eprint!("> ");
        std::io::stderr().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        match line.trim() {
            ":quit" | ":q" => break,
            ":reset" => {
                prime(studio, image.clone()).await?;
                eprintln!("Started a new session.");
                continue;
            }
            _ => {}
        }

        let reply = match studio.dispatch(Command::SubmitTurn(line)).await? {
            Outcome::Turn(TurnOutcome::Replied(text)) => Some(text),
            Outcome::Turn(TurnOutcome::Failed(message)) => {
                eprintln!("{message}");
                None
            }
            _ => None,
        };
        if let Some(text) = reply {
            if json_output {
                let result = serde_json::json!({ "role": "model", "text": text });
                println!("{}", serde_json::to_string(&result)?);
            } else {
                println!("{text}");
            }
        }
    }

    if json_output {
        let view = studio.analyze().snapshot();
        let turns: Vec<_> = view
            .turns
            .iter()
            .map(|t| serde_json::json!({ "speaker": format!("{:?}", t.speaker), "text": t.text }))
            .collect();
        println!("{}", serde_json::to_string_pretty(&turns)?);
    }
    studio.analyze().reset();
    Ok(())
}

async fn prime(studio: &mut CliStudio, image: UploadedImage) -> anyhow::Result<()> {
    match studio.dispatch(Command::UploadAnalyzeImage(image)).await? {
        Outcome::Session(PrimingOutcome::Ready) => Ok(()),
        Outcome::Session(PrimingOutcome::Failed { message }) => anyhow::bail!(message),
        other => anyhow::bail!("unexpected outcome: {other:?}"),
    }
}

fn run_gallery(
    command: GalleryCommand,
    mut gallery: GalleryStore<Arc<dyn KeyValueStore>>,
    json_output: bool,
) -> anyhow::Result<()> {
    match command {
        GalleryCommand::List => match gallery.view() {
            GalleryView::Empty if !json_output => {
                println!("Empty Gallery");
                println!("Generated and edited images will appear here.");
            }
            GalleryView::Empty => println!("[]"),
            GalleryView::Items(items) => report_items(&items, &[], json_output)?,
        },
        GalleryCommand::Show {
            id,
            output,
            prompt_only,
        } => {
            let Some(item) = gallery.find_by_id(id) else {
                anyhow::bail!("no gallery item with id {id}");
            };
            let mut written = Vec::new();
            if let Some(path) = output {
                write_artifact(item, &path)?;
                written.push(path);
            }
            if prompt_only {
                println!("{}", item.prompt);
            } else {
                report_items(std::slice::from_ref(item), &written, json_output)?;
            }
        }
        GalleryCommand::Delete { id } => {
            gallery.delete_by_id(id)?;
            if json_output {
                println!("{}", serde_json::json!({ "deleted": id, "success": true }));
            } else {
                println!("Deleted {id} ({} item(s) left)", gallery.len());
            }
        }
    }
    Ok(())
}

fn write_artifact(item: &GalleryItem, path: &std::path::Path) -> anyhow::Result<()> {
    let (_, data) = genstudio::image::decode_data_url(&item.artifact)?;
    std::fs::write(path, data)?;
    Ok(())
}

fn report_items(
    items: &[GalleryItem],
    written: &[PathBuf],
    json_output: bool,
) -> anyhow::Result<()> {
    if json_output {
        let result: Vec<_> = items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                serde_json::json!({
                    "id": item.id,
                    "type": item.kind.to_string(),
                    "prompt": item.prompt,
                    "size_bytes": item.artifact.len(),
                    "has_original": item.source_image.is_some(),
                    "output": written.get(i).map(|p| p.display().to_string()),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        for (i, item) in items.iter().enumerate() {
            println!("{}  [{}]  {}", item.id, item.kind, item.prompt);
            if let Some(path) = written.get(i) {
                println!("    saved to {}", path.display());
            }
        }
    }
    Ok(())
}

fn report_failure(outcome: Outcome, json_output: bool) -> anyhow::Result<()> {
    let message = match outcome {
        Outcome::Notice(message) | Outcome::Failed(message) => message,
        other => format!("unexpected outcome: {other:?}"),
    };
    if json_output {
        let result = serde_json::json!({ "success": false, "error": message });
        println!("{}", serde_json::to_string_pretty(&result)?);
        std::process::exit(1);
    }
    anyhow::bail!(message)
}
