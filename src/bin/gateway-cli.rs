use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use service_gateway::client::AuthClient;
use service_gateway::config::{load_client_config, ClientConfig};
use service_gateway::observability::logging;

/// Trust store location relative to `--root`.
const TRUST_STORE_IN_ROOT: &str = "security/client.pem";

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Send an admin command to a (secured) gateway", long_about = None)]
struct Cli {
    /// TOML file with client settings; flags override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(short, long)]
    port: Option<u16>,

    /// Root directory of the store; the trust store is `<root>/security/client.pem`.
    #[arg(long)]
    root: Option<PathBuf>,

    /// Explicit trust store (PEM), overrides `--root`.
    #[arg(long)]
    trust_store: Option<PathBuf>,

    #[arg(short, long)]
    user: Option<String>,

    /// Password. Without one the CLI uses plain HTTP and skips login.
    #[arg(long)]
    password: Option<String>,

    /// Path the command is posted to.
    #[arg(long)]
    command_path: Option<String>,

    /// Command name sent as `{"command": "<name>"}`.
    #[arg(default_value = "show")]
    command: String,
}

impl Cli {
    fn into_config(self) -> Result<(ClientConfig, String), Box<dyn std::error::Error>> {
        let mut config = match &self.config {
            Some(path) => load_client_config(path)?,
            None => ClientConfig::default(),
        };
        if let Some(host) = self.host {
            config.host = host;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(root) = self.root {
            config.trust_store = root.join(TRUST_STORE_IN_ROOT);
        }
        if let Some(trust_store) = self.trust_store {
            config.trust_store = trust_store;
        }
        if let Some(user) = self.user {
            config.user = user;
        }
        if self.password.is_some() {
            config.password = self.password;
        }
        if let Some(command_path) = self.command_path {
            config.command_path = command_path;
        }
        Ok((config, self.command))
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    logging::init("warn");

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (config, command) = cli.into_config()?;
    let mut client = AuthClient::new(config)?;

    client.login().await?;
    let output = client.send_command(&command).await?;

    if !output.status.is_success() {
        eprintln!("Error: gateway returned status {}", output.status);
    }
    println!("{}", output.body);
    Ok(())
}
