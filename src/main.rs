use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use atlas_exporter::config::StaticConfig;
use atlas_exporter::runtime::modes::run_server;
use atlas_exporter::system::init_logging;

/// Prometheus exporter for a host application's operational metrics
#[derive(Debug, Parser)]
#[command(name = "atlas-exporter", version, about)]
struct Args {
    /// Path of the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Print a sample configuration with every default and exit
    #[arg(long)]
    generate_config: bool,
}

#[actix_web::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    if args.generate_config {
        println!("{}", StaticConfig::generate_sample_config());
        return ExitCode::SUCCESS;
    }

    // 配置加载失败时日志尚未初始化，直接彩色输出到 stderr
    let config = match StaticConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e.format_colored());
            return ExitCode::FAILURE;
        }
    };

    let _guard = match init_logging(&config.logging) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    match run_server(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("Exporter exited with error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
