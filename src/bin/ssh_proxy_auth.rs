// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! ssh-proxy-auth binary - operator tooling for the SSH proxy authenticator
//!
//! This binary validates configuration, renders a template, and runs single
//! authentication attempts against live backends.

use std::fs;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use russh::keys::ssh_key::PublicKey;
use ssh_proxy_auth::server::auth::CompositeAuthenticator;
use ssh_proxy_auth::server::config::{generate_config_template, load_config, ProxyAuthConfig};
use ssh_proxy_auth::shared::{ConnectionMetadata, Credential};
use ssh_proxy_auth::utils::logging;

/// SSH proxy authenticator - realm-based authentication and target resolution
#[derive(Parser, Debug)]
#[command(name = "ssh-proxy-auth")]
#[command(version)]
#[command(about = "SSH proxy authenticator - realm-based authentication and target resolution", long_about = None)]
struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Check configuration for errors
    CheckConfig,

    /// Generate a configuration file template
    GenConfig {
        /// Output path (stdout if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Run one authentication attempt and print the resulting permissions
    Authenticate {
        /// SSH username, e.g. `cf:<app-guid>/<index>`
        #[arg(short, long)]
        user: String,

        /// Password or one-time code
        #[arg(long, conflicts_with_all = ["password_stdin", "public_key"])]
        password: Option<String>,

        /// Read the password from the first line of stdin
        #[arg(long, conflicts_with = "public_key")]
        password_stdin: bool,

        /// OpenSSH public key file to offer
        #[arg(long, value_name = "FILE")]
        public_key: Option<PathBuf>,

        /// Remote address recorded in the audit message
        #[arg(long, default_value = "127.0.0.1:0", value_name = "ADDR")]
        remote: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging_console_only(cli.verbose);

    match cli.command {
        Commands::CheckConfig => check_config(cli.config.as_deref()),
        Commands::GenConfig { output } => gen_config(output),
        Commands::Authenticate {
            user,
            password,
            password_stdin,
            public_key,
            remote,
        } => {
            let credential = read_credential(password, password_stdin, public_key.as_deref())?;
            authenticate(cli.config.as_deref(), user, credential, remote).await
        }
    }
}

fn load(config_path: Option<&Path>) -> Result<ProxyAuthConfig> {
    match config_path {
        Some(path) => load_config(Some(path))
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => load_config(None).context("Failed to load configuration"),
    }
}

/// Check configuration for errors
fn check_config(config_path: Option<&Path>) -> Result<()> {
    let config = load(config_path)?;

    println!("✓ Configuration is valid\n");
    println!("Scheduler:");
    println!("  Address: {}", config.scheduler.address);
    println!("  Request timeout: {}s", config.scheduler.request_timeout_secs);

    println!("\nHTTP:");
    println!(
        "  Communication timeout: {}s",
        config.http.communication_timeout_secs
    );
    println!("  Skip certificate verification: {}", config.http.skip_cert_verify);

    let auth = &config.auth;
    println!("\nAuthentication:");
    if auth.shared_secret.enabled {
        println!("  Shared secret: realm '{}'", auth.shared_secret.realm);
    }
    if auth.platform.enabled {
        println!("  Platform: realm '{}'", auth.platform.realm);
        if let Some(url) = &auth.platform.control_plane_url {
            println!("    Control plane: {url}");
        }
        if let Some(url) = &auth.platform.token_url {
            println!("    Token endpoint: {url}");
        }
    }
    if auth.publickey.enabled() {
        println!("  Public key: enabled");
    }

    Ok(())
}

/// Generate a configuration file template
fn gen_config(output: Option<PathBuf>) -> Result<()> {
    let template = generate_config_template();

    if let Some(path) = output {
        #[cfg(unix)]
        {
            use std::fs::OpenOptions;
            use std::os::unix::fs::OpenOptionsExt;

            // Secrets may be added to this file
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)
                .context("Failed to create configuration file")?;

            file.write_all(template.as_bytes())
                .context("Failed to write configuration file")?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&path, &template).context("Failed to write configuration file")?;
        }

        println!("Configuration template written to {}", path.display());
    } else {
        io::stdout()
            .write_all(template.as_bytes())
            .context("Failed to write configuration template")?;
    }

    Ok(())
}

fn read_credential(
    password: Option<String>,
    password_stdin: bool,
    public_key: Option<&Path>,
) -> Result<Credential> {
    if let Some(path) = public_key {
        let line = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let key = PublicKey::from_openssh(line.trim())
            .with_context(|| format!("Invalid public key in {}", path.display()))?;
        return Ok(Credential::PublicKey(key));
    }

    if password_stdin {
        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .context("Failed to read password from stdin")?;
        return Ok(Credential::password(line.trim_end_matches(['\r', '\n'])));
    }

    match password {
        Some(password) => Ok(Credential::password(password)),
        None => anyhow::bail!("One of --password, --password-stdin or --public-key is required"),
    }
}

/// Run one authentication attempt
async fn authenticate(
    config_path: Option<&Path>,
    user: String,
    credential: Credential,
    remote: SocketAddr,
) -> Result<()> {
    let config = load(config_path)?;
    let authenticator = CompositeAuthenticator::from_config(&config)?;
    let metadata = ConnectionMetadata::new(user, remote);

    tracing::info!(
        user = %metadata.user(),
        method = credential.kind(),
        "Running authentication attempt"
    );

    let permissions = authenticator
        .authenticate(&metadata, &credential)
        .await
        .context("Authentication failed")?;

    let options = permissions
        .critical_options()
        .context("Failed to encode permissions")?;
    println!("{}", serde_json::to_string_pretty(&options)?);

    if !permissions.is_routable() {
        eprintln!("Authenticated, but the instance has no routable target yet");
    }

    Ok(())
}
