use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

use filexchange::client::{DirectoryWriterFactory, FileExchangeClient};
use filexchange::config::Config;
use filexchange::logging::*;
use filexchange::server::FileServer;
use filexchange::utils::{cancel_on_signal, shutdown_signal};
use filexchange::validation::Validator;

fn cli() -> Command {
	Command::new("filexchange")
		.version(env!("CARGO_PKG_VERSION"))
		.about("Streaming file download server and client")
		.subcommand_required(true)
		.arg(
			Arg::new("config")
				.short('c')
				.long("config")
				.value_name("FILE")
				.value_parser(value_parser!(PathBuf))
				.help("Config file (TOML, or JSON5 with a .json/.json5 extension)"),
		)
		.arg(
			Arg::new("verbose")
				.short('v')
				.long("verbose")
				.action(ArgAction::Count)
				.help("More logging (-v debug, -vv trace); RUST_LOG overrides"),
		)
		.subcommand(
			Command::new("serve")
				.about("Serve the files of a directory")
				.arg(Arg::new("root").value_parser(value_parser!(PathBuf)).help("Served directory"))
				.arg(
					Arg::new("listen")
						.short('l')
						.long("listen")
						.value_name("ADDR")
						.help("Listen address (host:port)"),
				),
		)
		.subcommand(
			Command::new("download")
				.about("Download a file or directory")
				.arg(Arg::new("name").required(true).help("File or directory name on the server"))
				.arg(
					Arg::new("server")
						.short('s')
						.long("server")
						.value_name("ADDR")
						.help("Server address (host:port)"),
				)
				.arg(
					Arg::new("dest")
						.short('d')
						.long("dest")
						.value_name("DIR")
						.value_parser(value_parser!(PathBuf))
						.help("Destination directory"),
				)
				.arg(
					Arg::new("chunk-size")
						.long("chunk-size")
						.value_name("BYTES")
						.value_parser(value_parser!(u64))
						.help("Requested chunk size, 0 for the server default"),
				),
		)
}

async fn serve(mut config: Config, matches: &ArgMatches) -> Result<ExitCode, Box<dyn Error>> {
	if let Some(root) = matches.get_one::<PathBuf>("root") {
		config.server.root = root.clone();
	}
	if let Some(listen) = matches.get_one::<String>("listen") {
		config.server.listen_addr = listen.clone();
	}
	config.server.validate()?;

	let server = FileServer::new(config.server)?.start().await?;
	server.run_until(shutdown_signal()).await;
	Ok(ExitCode::SUCCESS)
}

async fn download(mut config: Config, matches: &ArgMatches) -> Result<ExitCode, Box<dyn Error>> {
	let name = matches.get_one::<String>("name").ok_or("download: name argument required")?;
	if let Some(server) = matches.get_one::<String>("server") {
		config.client.server_addr = server.clone();
	}
	if let Some(dest) = matches.get_one::<PathBuf>("dest") {
		config.client.download_dir = dest.clone();
	}
	if let Some(chunk_size) = matches.get_one::<u64>("chunk-size") {
		config.client.chunk_size = *chunk_size;
	}
	config.client.validate()?;

	let factory = DirectoryWriterFactory::new(&config.client.download_dir)?;
	let client = FileExchangeClient::from_config(&config.client);
	let cancel = CancellationToken::new();
	cancel_on_signal(cancel.clone());

	let outcome = client.download_with_cancel(name, &factory, cancel.clone()).await;
	cancel.cancel();
	let outcome = outcome?;

	if outcome.is_ok() {
		println!(
			"{}: {} bytes in {} file(s) written to {}",
			outcome.status,
			outcome.bytes_received,
			outcome.files.len(),
			factory.dir().display()
		);
		Ok(ExitCode::SUCCESS)
	} else {
		eprintln!("{}", outcome.status);
		Ok(ExitCode::FAILURE)
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	let matches = cli().get_matches();
	init_tracing(level_for_verbosity(matches.get_count("verbose")));

	let config = match Config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path)) {
		Ok(config) => config,
		Err(e) => {
			error!("{}", e);
			return ExitCode::FAILURE;
		}
	};

	let result = match matches.subcommand() {
		Some(("serve", sub)) => serve(config, sub).await,
		Some(("download", sub)) => download(config, sub).await,
		_ => Err("unknown subcommand".into()),
	};

	match result {
		Ok(code) => code,
		Err(e) => {
			error!("{}", e);
			ExitCode::FAILURE
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_cli_definition() {
		cli().debug_assert();
	}

	#[test]
	fn test_download_arguments() {
		let matches = cli()
			.try_get_matches_from(["filexchange", "download", "docs", "-s", "host:1", "--chunk-size", "64"])
			.unwrap();
		let (name, sub) = matches.subcommand().unwrap();
		assert_eq!(name, "download");
		assert_eq!(sub.get_one::<String>("name").unwrap(), "docs");
		assert_eq!(sub.get_one::<u64>("chunk-size"), Some(&64));
		assert!(sub.get_one::<PathBuf>("dest").is_none());
	}
}

// vim: ts=4
