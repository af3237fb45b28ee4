use std::sync::Arc;

use argh::FromArgs;
use toolsight::{AppState, Config, OpenAiVision, bind_with_retry};

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Toolsight analyzes uploaded photos of tools and projects.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    env_logger::init();
    let args: ServerArgs = argh::from_env();

    let config = Config::from_env()?;
    let model = OpenAiVision::new(&config)?;

    let state = Arc::new(AppState {
        model: Arc::new(model),
        upload_dir: config.upload_dir.clone(),
    });

    let app = toolsight::app(state);

    let listener = bind_with_retry(&args.host, args.port).await?;

    log::info!("🚀 Starting the server");
    log::info!("🔧 Using model: {}", config.model);
    log::info!("🔥 Listening on: {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}
