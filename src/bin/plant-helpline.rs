//! CLI for Plant Helpline - identify plants from photos.

use clap::{Args, Parser, Subcommand};
use plant_helpline::relay::{self, RelayConfig, RelayState};
use plant_helpline::{
    is_unidentified, parse_response, render_summary, FakeVisionModel, IdentificationClient,
    ImageNormalizer, PlantInfo, VisionModel,
};
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "plant-helpline")]
#[command(about = "Identify plants from photos via a Gemini-backed relay")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the identification relay
    Serve(ServeArgs),

    /// Identify the plant in an image file
    Identify(IdentifyArgs),

    /// Parse a saved model response
    Parse(ParseArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Listen address (overrides PLANT_HELPLINE_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Gemini model (overrides PLANT_HELPLINE_MODEL)
    #[arg(long)]
    model: Option<String>,

    /// Answer every request with the contents of this file instead of
    /// calling Gemini
    #[arg(long, value_name = "PATH")]
    fake_reply: Option<PathBuf>,
}

#[derive(Args)]
struct IdentifyArgs {
    /// Image to identify (JPEG, PNG, WebP, GIF, HEIC)
    path: PathBuf,

    /// Relay root URL
    #[arg(long, env = "PLANT_HELPLINE_RELAY_URL", default_value = plant_helpline::client::DEFAULT_RELAY_URL)]
    relay: String,

    /// Compress images larger than this many bytes before sending
    #[arg(long, value_name = "BYTES")]
    max_size: Option<usize>,
}

#[derive(Args)]
struct ParseArgs {
    /// File holding the raw model text, or `-` for stdin
    path: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => {
            serve(args).await?;
        }
        Commands::Identify(args) => {
            identify(args, cli.json).await?;
        }
        Commands::Parse(args) => {
            parse(args, cli.json)?;
        }
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = RelayConfig::from_env()?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(model) = args.model {
        config.model = model;
    }

    let model: Arc<dyn VisionModel> = match args.fake_reply {
        Some(path) => {
            let reply = std::fs::read_to_string(&path)?;
            tracing::warn!(path = %path.display(), "serving canned replies, Gemini is not called");
            Arc::new(FakeVisionModel::with_reply(reply))
        }
        None => Arc::new(config.gemini_model()?),
    };

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    let state = Arc::new(RelayState::from_config(model, &config));
    relay::serve(listener, state).await?;
    Ok(())
}

async fn identify(args: IdentifyArgs, json_output: bool) -> anyhow::Result<()> {
    let mut normalizer = ImageNormalizer::new();
    if let Some(bytes) = args.max_size {
        normalizer = normalizer.with_max_size(bytes);
    }

    let client = IdentificationClient::builder()
        .base_url(&args.relay)
        .normalizer(normalizer)
        .build()?;

    let info = match client.identify_path(&args.path).await {
        Ok(info) => info,
        Err(e) => {
            tracing::error!(path = %args.path.display(), error = %e, "identification failed");
            anyhow::bail!(e.user_message());
        }
    };

    print_result(&info, json_output)
}

fn parse(args: ParseArgs, json_output: bool) -> anyhow::Result<()> {
    let raw = if args.path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(&args.path)?
    };

    let info = parse_response(&raw)?;
    print_result(&info, json_output)
}

fn print_result(info: &PlantInfo, json_output: bool) -> anyhow::Result<()> {
    if json_output {
        let result = serde_json::json!({
            "identified": !is_unidentified(info),
            "plant": info,
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print!("{}", render_summary(info));
    }

    Ok(())
}
