use clap::{Parser, ValueEnum};
use sensing_garden_client::{ClientConfig, FetchParams, Page, SensingGardenClient};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Resource {
    Models,
    Detections,
    Classifications,
    Environment,
    Videos,
    Devices,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Record type to list
    #[arg(value_enum)]
    resource: Resource,

    #[arg(short, long)]
    device_id: Option<String>,

    #[arg(short, long)]
    model_id: Option<String>,

    /// Page size
    #[arg(short, long, default_value_t = 10)]
    limit: u32,

    /// Newest first
    #[arg(long)]
    desc: bool,

    /// Follow next_token through at most this many pages
    #[arg(long, default_value_t = 1)]
    pages: usize,

    /// Print the count instead of the records
    #[arg(long)]
    count: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let client = SensingGardenClient::new(ClientConfig::from_env()?)?;

    let mut params = FetchParams::new()
        .limit(args.limit)
        .sort_by("timestamp")
        .sort_desc(args.desc);
    if let Some(device_id) = &args.device_id {
        params = params.device_id(device_id);
    }
    if let Some(model_id) = &args.model_id {
        params = params.model_id(model_id);
    }

    if args.count {
        let count = match args.resource {
            Resource::Models => client.models().count(&params).await?,
            Resource::Detections => client.detections().count(&params).await?,
            Resource::Classifications => client.classifications().count(&params).await?,
            Resource::Environment => client.environment().count(&params).await?,
            Resource::Videos => client.videos().count(&params).await?,
            Resource::Devices => return Err("devices have no count endpoint".into()),
        };
        println!("{count}");
        return Ok(());
    }

    for page_number in 1..=args.pages {
        let page: Page = match args.resource {
            Resource::Models => client.models().fetch(&params).await?,
            Resource::Detections => client.detections().fetch(&params).await?,
            Resource::Classifications => client.classifications().fetch(&params).await?,
            Resource::Environment => client.environment().fetch(&params).await?,
            Resource::Videos => client.videos().fetch(&params).await?,
            Resource::Devices => {
                let mut filter = sensing_garden_client::DeviceFilter::default().limit(args.limit);
                if let Some(token) = &params.next_token {
                    filter = filter.next_token(token.clone());
                }
                client.devices().list(&filter).await?
            }
        };

        println!("Page {page_number}: {} records", page.items.len());
        for item in &page.items {
            println!("{}", serde_json::to_string(item)?);
        }

        match page.next_token {
            Some(token) => params = params.next_token(token),
            None => break,
        }
    }

    Ok(())
}
