//! Globe Tile Cache - tile cache server for 3D globe renderers.
//!
//! This binary starts the HTTP server and configures all components.

use clap::Parser;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use globe_tile_cache::{
    config::{CheckConfig, Cli, Command, ServeConfig},
    create_s3_client, decode_tile_image,
    server::{create_router, ProviderFactory, ProviderUpdate, RouterConfig},
    ConfigError, S3TileFetcher, TileCache, TileFetcher, TileProvider,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Check(config) => run_check(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Globe Tile Cache v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  S3 bucket: {}", config.s3_bucket);
    if let Some(ref prefix) = config.s3_prefix {
        info!("  S3 prefix: {}", prefix);
    }
    if let Some(ref endpoint) = config.s3_endpoint {
        info!("  S3 endpoint: {}", endpoint);
    }
    info!("  S3 region: {}", config.s3_region);
    info!("  Tile template: {}", config.tile_template);
    info!("  Max zoom: {}", config.max_zoom);
    match config.tile_capacity() {
        Some(capacity) => info!("  Cache: {} tiles", capacity),
        None => info!("  Cache: unbounded"),
    }

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;

    let provider = match config.s3_provider(s3_client.clone(), None, None, None) {
        Ok(provider) => provider,
        Err(e) => {
            error!("Failed to create tile provider: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let provider: Arc<dyn TileProvider> = Arc::new(provider);
    let cache = match config.tile_capacity() {
        Some(capacity) => TileCache::with_capacity(provider, capacity),
        None => TileCache::new(provider),
    };
    cache.set_on_tile_ready(|tile| {
        debug!(tile = %tile.key(), request_time = tile.request_time(), "Tile ready");
    });

    let router_config = build_router_config(&config, build_provider_factory(&config, s3_client));
    let router = create_router(cache, router_config);

    let addr = config.bind_address();

    info!("");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl http://{}/stats", addr);
    info!("    curl http://{}/tiles/0/0/0.png", addr);
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "globe_tile_cache=debug,tower_http=debug"
    } else {
        "globe_tile_cache=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Provider factory for `PUT /provider`, reusing the server's bucket and client.
fn build_provider_factory(config: &ServeConfig, client: aws_sdk_s3::Client) -> ProviderFactory {
    let config = config.clone();

    Arc::new(
        move |update: ProviderUpdate| -> Result<Arc<dyn TileProvider>, ConfigError> {
            let provider = config.s3_provider(
                client.clone(),
                update.prefix.as_deref(),
                update.template.as_deref(),
                update.max_zoom,
            )?;
            Ok(Arc::new(provider))
        },
    )
}

/// Build RouterConfig from the application ServeConfig.
fn build_router_config(config: &ServeConfig, factory: ProviderFactory) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_ready_timeout(config.ready_timeout())
        .with_tracing(!config.no_tracing)
        .with_provider_factory(factory);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}

// =============================================================================
// Check Command
// =============================================================================

async fn run_check(config: CheckConfig) -> ExitCode {
    if config.verbose {
        init_logging(true);
    }

    println!("Globe Tile Cache Configuration Check");
    println!("════════════════════════════════════");
    println!();

    let template = match config.template() {
        Ok(template) => {
            println!("✓ Template: {}", template.template());
            template
        }
        Err(e) => {
            println!("✗ Template: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let test_tile = match config.test_tile_key() {
        Ok(key) => key,
        Err(e) => {
            println!("✗ Test tile: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("✓ Bucket: {}", config.s3_bucket);
    if let Some(prefix) = template.prefix() {
        println!("✓ Prefix: {}", prefix);
    }
    if let Some(ref endpoint) = config.s3_endpoint {
        println!("✓ Endpoint: {}", endpoint);
    }
    println!("✓ Region: {}", config.s3_region);
    println!();

    print!("Testing S3 connection... ");

    let s3_client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;

    let mut request = s3_client
        .list_objects_v2()
        .bucket(&config.s3_bucket)
        .max_keys(1);
    if let Some(prefix) = template.prefix() {
        request = request.prefix(format!("{}/", prefix));
    }

    match request.send().await {
        Ok(result) => {
            println!("✓ success");
            if result.contents().is_empty() {
                println!("  (no objects found under this prefix)");
            }
        }
        Err(e) => {
            println!("✗ failed");
            println!();
            println!("Error: {}", e);
            println!();
            println!("Please check:");
            println!("  - Your AWS credentials are configured correctly");
            println!(
                "  - The bucket '{}' exists and is accessible",
                config.s3_bucket
            );
            if config.s3_endpoint.is_some() {
                println!("  - The S3 endpoint is correct and reachable");
            }
            return ExitCode::FAILURE;
        }
    }

    if let Some(key) = test_tile {
        let object_key = template.render(&key);
        println!();
        print!("Testing tile {} ({})... ", key, object_key);

        let fetcher = S3TileFetcher::new(s3_client, config.s3_bucket.clone());
        let result = match fetcher.fetch(&object_key).await {
            Ok(data) => decode_tile_image(data),
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(image) => {
                println!("✓ ok");
                println!("  Size: {}x{} px", image.width, image.height);
                println!("  Content-Type: {}", image.content_type);
                println!("  Bytes: {}", image.data.len());
            }
            Err(e) => {
                println!("✗ failed");
                println!();
                println!("  {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    println!();
    println!("════════════════════════════════════");
    println!("✓ All checks passed!");

    ExitCode::SUCCESS
}
