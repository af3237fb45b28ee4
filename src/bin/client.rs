use std::path::{Path, PathBuf};

use argh::FromArgs;
use reqwest::multipart::{Form, Part};
use toolsight::MAX_IMAGES;

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 3000;

#[derive(FromArgs)]
/// Toolsight client for submitting images and printing their descriptions
struct ClientArgs {
    /// the host to connect to
    #[argh(option, short = 'h', default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to connect to
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,

    /// optional system prompt overriding the server default
    #[argh(option, short = 's')]
    prompt: Option<String>,

    /// paths of the images to analyze (up to 4)
    #[argh(positional)]
    images: Vec<PathBuf>,
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: ClientArgs = argh::from_env();

    if args.images.is_empty() || args.images.len() > MAX_IMAGES {
        return Err(format!("expected between 1 and {MAX_IMAGES} image paths").into());
    }

    let client = reqwest::Client::new();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let mut form = Form::new();
    if let Some(prompt) = &args.prompt {
        form = form.text("prompt", prompt.clone());
    }
    for path in &args.images {
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("image")
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        let part = Part::bytes(bytes)
            .file_name(filename)
            .mime_str(mime_for(path))?;
        form = form.part("images", part);
    }

    let response = client
        .post(format!("http://{}/upload", addr))
        .multipart(form)
        .send()
        .await?;

    let result = response.json::<serde_json::Value>().await?;
    println!("Result: {}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
