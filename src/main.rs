use std::net::SocketAddr;
use std::sync::Arc;

use gallery_preload_backend::api::{self, AppState};
use gallery_preload_backend::services::preload::{
    HttpImageLoader, ImageCache, ImageLoader, PreloadConfig,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    // Load environment variables
    dotenv::dotenv().ok();

    // Load preload configuration (file + environment overrides)
    let config = PreloadConfig::load(None).await?;

    // Initialize image cache
    let loader: Arc<dyn ImageLoader> = Arc::new(HttpImageLoader::new(
        config.decode_concurrency,
        config.max_image_bytes,
    )?);
    let image_cache = ImageCache::from_config(loader, &config);

    let app = api::router(AppState {
        image_cache,
        config: Arc::new(config),
    });

    // Run the server - 从环境变量读取监听地址
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("🚀 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
