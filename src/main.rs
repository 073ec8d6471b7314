mod cli;

use hlsgate::{config, server, tools};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use hlsgate_media::decode_adts;

async fn start_server(
    host: Option<String>,
    port: Option<u16>,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config::validate_config(&config)?;

    tracing::info!("Starting hlsgate");
    tracing::info!(
        "Serving {} stream(s) on {}:{}",
        config.streams.len(),
        config.server.host,
        config.server.port
    );

    server::start_server(config).await
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "hlsgate=trace,hlsgate_media=trace,tower_http=debug".to_string()
        } else {
            "hlsgate=info,hlsgate_media=info,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Serve { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::ProbeAdts { file } => probe_adts(&file),
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hlsgate {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn probe_adts(file: &std::path::Path) -> Result<()> {
    if !file.exists() {
        anyhow::bail!("File does not exist: {:?}", file);
    }

    let data = std::fs::read(file)?;
    let packets = decode_adts(&data)?;

    println!("File: {}", file.display());
    println!("Frames: {}", packets.len());

    if let Some(first) = packets.first() {
        let samples = packets.len() as u64 * 1024;
        let secs = samples as f64 / first.sample_rate as f64;
        let bytes: usize = packets.iter().map(|p| p.au.len()).sum();

        println!("Profile: {:?} (mp4a.40.{})", first.profile, first.profile.object_type());
        println!("Sample rate: {} Hz", first.sample_rate);
        println!("Channels: {}", first.channel_count);
        println!("Duration: {:.3}s", secs);
        if secs > 0.0 {
            println!("Average bitrate: {:.1} kbit/s", bytes as f64 * 8.0 / secs / 1000.0);
        }

        let changes = packets
            .windows(2)
            .filter(|w| {
                w[0].sample_rate != w[1].sample_rate
                    || w[0].channel_count != w[1].channel_count
                    || w[0].profile != w[1].profile
            })
            .count();
        if changes > 0 {
            println!("Warning: {} parameter change(s) within the stream", changes);
        }
    }

    Ok(())
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    println!("Checking external tools...\n");

    let config = config::load_config_or_default(config_path)?;
    let tools = tools::check_tools(config.snapshot.ffmpeg_path.as_deref());
    let mut all_ok = true;

    for tool in &tools {
        let status = if tool.available {
            "✓"
        } else {
            all_ok = false;
            "✗"
        };

        print!("{} {}", status, tool.name);

        if let Some(ref version) = tool.version {
            print!(" ({})", version.lines().next().unwrap_or(""));
        }

        if let Some(ref path) = tool.path {
            print!(" - {}", path.display());
        }

        println!();
    }

    println!();
    if all_ok {
        println!("All required tools are available!");
    } else {
        println!("Some tools are missing. Snapshots need ffmpeg.");
    }

    Ok(())
}

fn validate_config(path: Option<&std::path::Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!(
                "  HLS: {} segments of {}s",
                config.hls.segment_count, config.hls.segment_duration_secs
            );
            println!("  Snapshots enabled: {}", config.snapshot.enabled);
            println!("  Streams: {}", config.streams.len());
            for stream in &config.streams {
                println!(
                    "    {} (video: {}, audio: {})",
                    stream.name,
                    stream.video.is_some(),
                    stream.audio.is_some()
                );
            }
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
