// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `quill`: inspect and change the local config, issue and verify tokens,
//! and read or write cached JSON files.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use quill_config::{ConfigError, CredentialUpdate, SubsystemOptions};
use quill_file_cache::{CacheConfig, CacheStore};
use quill_token::{ttl_from_secs, TokenIssuer};
use tracing::{debug, error};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "quill", version, about, long_about = None)]
struct Args {
	/// Data directory (overrides QUILL_DATA_DIR)
	#[arg(long, global = true)]
	data_dir: Option<PathBuf>,

	/// Emit logs as JSON
	#[arg(long, global = true)]
	log_json: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Application config and provider credentials
	Config {
		#[command(subcommand)]
		command: ConfigCommand,
	},
	/// Signed bearer tokens
	Token {
		#[command(subcommand)]
		command: TokenCommand,
	},
	/// Cached JSON files
	Cache {
		#[command(subcommand)]
		command: CacheCommand,
	},
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
	/// Print the config with credentials redacted
	Show,
	/// Set the LLM provider and its credentials
	SetCredentials {
		/// Provider name (openai, anthropic, google, ...)
		#[arg(long, short)]
		provider: String,
		/// API key, or '-' to read it from stdin
		#[arg(long)]
		api_key: Option<String>,
		/// Secondary secret for providers that need one
		#[arg(long)]
		secret_key: Option<String>,
		#[arg(long, short)]
		model: Option<String>,
		/// Custom endpoint URL
		#[arg(long)]
		endpoint: Option<String>,
		/// Extra setting (repeatable: -f KEY=VALUE)
		#[arg(long, short = 'f', value_name = "KEY=VALUE")]
		field: Vec<String>,
	},
	/// Remove all stored credentials
	ClearCredentials,
}

#[derive(Subcommand, Debug)]
enum TokenCommand {
	/// Issue a token for a principal
	Issue {
		principal: String,
		/// Lifetime in seconds (default: QUILL_TOKEN_TTL_SECS or 86400)
		#[arg(long)]
		ttl_secs: Option<i64>,
	},
	/// Verify a token and print its claims
	Verify { token: String },
}

#[derive(Subcommand, Debug)]
enum CacheCommand {
	/// Read a JSON file through the cache
	Get { path: PathBuf },
	/// Write a JSON value to a file through the cache
	Put {
		path: PathBuf,
		/// JSON document
		value: String,
	},
}

fn init_tracing(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	if json {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init();
	} else {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt::layer().with_writer(std::io::stderr))
			.init();
	}
}

fn options(args: &Args) -> Result<SubsystemOptions> {
	let mut options = SubsystemOptions::from_env().context("invalid environment")?;
	if let Some(dir) = &args.data_dir {
		options.data_dir = dir.clone();
	}
	Ok(options)
}

/// Parse `KEY=VALUE`.
fn parse_field(raw: &str) -> Result<(String, String)> {
	let (key, value) = raw
		.split_once('=')
		.ok_or_else(|| anyhow!("expected KEY=VALUE, got '{raw}'"))?;
	if key.trim().is_empty() {
		bail!("empty key in '{raw}'");
	}
	Ok((key.trim().to_string(), value.to_string()))
}

fn read_stdin_secret() -> Result<String> {
	let mut buf = String::new();
	std::io::stdin()
		.read_to_string(&mut buf)
		.context("failed to read secret from stdin")?;
	Ok(buf.trim_end_matches(&['\r', '\n'][..]).to_string())
}

async fn run_config(options: &SubsystemOptions, command: ConfigCommand) -> Result<()> {
	let store = quill_config::init(options)
		.await
		.context("failed to initialize config store")?;

	match command {
		ConfigCommand::Show => {
			let current = store.current().await?;
			println!("{}", serde_json::to_string_pretty(&current.redacted())?);
		}
		ConfigCommand::SetCredentials {
			provider,
			api_key,
			secret_key,
			model,
			endpoint,
			field,
		} => {
			let fields = field
				.iter()
				.map(|raw| parse_field(raw))
				.collect::<Result<Vec<_>>>()?;
			let mut update = CredentialUpdate::from_fields(fields);

			if let Some(api_key) = api_key {
				let api_key = if api_key == "-" { read_stdin_secret()? } else { api_key };
				update = update.api_key(api_key);
			}
			if let Some(secret_key) = secret_key {
				update = update.secret_key(secret_key);
			}
			if let Some(model) = model {
				update = update.model(model);
			}
			if let Some(endpoint) = endpoint {
				update = update.endpoint(endpoint);
			}

			store.update_credentials(&provider, update).await?;
			eprintln!("saved credentials for {provider} to {}", store.path().display());
		}
		ConfigCommand::ClearCredentials => {
			store.clear_credentials().await?;
			eprintln!("cleared credentials in {}", store.path().display());
		}
	}
	Ok(())
}

/// One issuer per invocation, keyed and timed from `options`.
fn issuer(options: &SubsystemOptions) -> Result<TokenIssuer> {
	let secret = options.token_secret.clone().ok_or_else(|| {
		anyhow!("token secret not configured: set QUILL_TOKEN_SECRET or QUILL_TOKEN_SECRET_FILE")
	})?;
	let ttl = ttl_from_secs(options.token_ttl_secs).context("QUILL_TOKEN_TTL_SECS")?;
	Ok(TokenIssuer::new(secret)?.with_default_ttl(ttl))
}

fn run_token(options: &SubsystemOptions, command: TokenCommand) -> Result<()> {
	let issuer = issuer(options)?;

	match command {
		TokenCommand::Issue { principal, ttl_secs } => {
			let ttl = match ttl_secs {
				Some(secs) => ttl_from_secs(secs).context("--ttl-secs")?,
				None => issuer.default_ttl(),
			};
			println!("{}", issuer.issue(&principal, ttl)?);
		}
		TokenCommand::Verify { token } => match issuer.verify(&token) {
			Ok(verified) => {
				let claims = serde_json::json!({
					"principal": verified.principal,
					"issued_at": verified.issued_at.to_rfc3339(),
					"expires_at": verified.expires_at.to_rfc3339(),
				});
				println!("{}", serde_json::to_string_pretty(&claims)?);
			}
			Err(e) if e.is_authentication_failure() => {
				debug!(kind = e.kind(), "token verification failed");
				bail!("unauthenticated");
			}
			Err(e) => return Err(e.into()),
		},
	}
	Ok(())
}

async fn run_cache(options: &SubsystemOptions, command: CacheCommand) -> Result<()> {
	let cache = CacheStore::new(CacheConfig::new(options.cache_max_size, options.cache_expiration));

	match command {
		CacheCommand::Get { path } => {
			let value: serde_json::Value = cache.read(&path).await?;
			println!("{}", serde_json::to_string_pretty(&value)?);
		}
		CacheCommand::Put { path, value } => {
			let value: serde_json::Value =
				serde_json::from_str(&value).context("value is not valid JSON")?;
			cache.write(&path, &value).await?;
		}
	}

	debug!(stats = ?cache.stats().await, "cache stats");
	Ok(())
}

async fn run(args: Args) -> Result<()> {
	let options = options(&args)?;

	match args.command {
		Command::Config { command } => run_config(&options, command).await,
		Command::Token { command } => run_token(&options, command),
		Command::Cache { command } => run_cache(&options, command).await,
	}
}

/// Key misconfiguration stops the process with a distinct exit code.
fn is_fatal(err: &anyhow::Error) -> bool {
	err.chain()
		.any(|cause| cause.downcast_ref::<ConfigError>().is_some_and(ConfigError::is_fatal))
}

#[tokio::main]
async fn main() -> ExitCode {
	let args = Args::parse();
	init_tracing(args.log_json);

	match run(args).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			let fatal = is_fatal(&e);
			error!(error = %format!("{e:#}"), fatal, "quill failed");
			eprintln!("error: {e:#}");
			if fatal {
				ExitCode::from(2)
			} else {
				ExitCode::FAILURE
			}
		}
	}
}
