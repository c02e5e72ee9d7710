use clap::Parser;
use sensing_garden_client::{ClientConfig, NewVideo, SensingGardenClient};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Device that recorded the video
    #[arg(short, long)]
    device_id: String,

    /// Path to the video file
    #[arg(short, long)]
    file: PathBuf,

    /// Recording timestamp (ISO-8601); defaults to now
    #[arg(short, long)]
    timestamp: Option<String>,

    /// Content type; guessed from the file extension when omitted
    #[arg(short, long)]
    content_type: Option<String>,

    /// Optional TOML config file; the environment is used otherwise
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if args.debug { "debug" } else { "info" })
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::from_env()?,
    };
    let client = SensingGardenClient::new(config)?;

    let timestamp = args
        .timestamp
        .unwrap_or_else(|| jiff::Timestamp::now().to_string());
    let mut video = NewVideo::new(args.device_id, timestamp, args.file.clone());
    if let Some(content_type) = args.content_type {
        video = video.content_type(content_type);
    }

    println!("Uploading video {:?}...", args.file);
    match client.videos().upload_video(video).await {
        Ok(done) => {
            println!("Uploaded {} at {}", done.video_key, done.timestamp);
            println!("{}", serde_json::to_string_pretty(done.response.raw())?);
        }
        Err(e) => {
            eprintln!("Upload failed: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}
