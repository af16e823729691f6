//! `pagewire-ssr`: runs the render server, or renders one page to stdout.

use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use pagewire_core::Page;
use pagewire_ssr::{Renderer, ShellRenderer, SsrConfig, SsrError, SsrServer};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pagewire-ssr")]
#[command(about = "Server-side rendering for pagewire pages", long_about = None)]
#[command(version)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	/// Configuration file (TOML)
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	/// Interface to bind
	#[arg(long, global = true)]
	host: Option<String>,

	/// Port to bind
	#[arg(short, long, global = true)]
	port: Option<u16>,

	/// Verbosity level (can be repeated for more output)
	#[arg(short, long, action = clap::ArgAction::Count, global = true)]
	verbosity: u8,
}

#[derive(Subcommand)]
enum Commands {
	/// Serve render requests over HTTP (the default)
	Serve,
	/// Render a single page descriptor and print the result as JSON
	Render {
		/// Page descriptor as JSON
		page: String,
	},
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	init_tracing(cli.verbosity);

	if let Err(error) = run(cli).await {
		eprintln!("error: {error}");
		process::exit(1);
	}
}

async fn run(cli: Cli) -> Result<(), SsrError> {
	let config = SsrConfig::load(cli.config.as_deref())?.with_overrides(cli.host, cli.port);
	let renderer = ShellRenderer::new(&config.root_id);

	match cli.command.unwrap_or(Commands::Serve) {
		Commands::Serve => {
			let server = SsrServer::new(Arc::new(renderer));
			server.listen(config.addr()?).await
		}
		Commands::Render { page } => {
			let page = Page::from_json(&page)?;
			let rendered = renderer.render(&page).await?;
			println!("{}", serde_json::to_string(&rendered)?);
			Ok(())
		}
	}
}

fn init_tracing(verbosity: u8) {
	let level = match verbosity {
		0 => "info",
		1 => "debug",
		_ => "trace",
	};
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.init();
}
