//! Command line surface.

use crate::cipher::Nip04Cipher;
use crate::config::{EmperorConfig, load_relay_endpoints};
use crate::identity::{get_or_create_identity, parse_public_key};
use crate::payload::{Payload, Pulled};
use crate::publish::publish;
use crate::retry::until_cancelled;
use crate::subscribe::{parse_publish_id, pull};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use nostr::Keys;
use nostr_client::{RelayPool, TlsPolicy};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "emperor")]
#[command(version)]
#[command(about = "Send encrypted messages and files through Nostr relays")]
pub struct Cli {
    /// Config file (default: <config dir>/emperor/config.toml)
    #[arg(long, global = true, env = "EMPEROR_CONFIG")]
    pub config: Option<PathBuf>,

    /// JSON array of relay URLs, replacing the configured relays
    #[arg(long, global = true)]
    pub relays_file: Option<PathBuf>,

    /// Relay URL; repeat or comma-separate for several. Overrides all other relay settings.
    #[arg(long = "relay", global = true, value_delimiter = ',')]
    pub relays: Vec<String>,

    /// Accept any TLS certificate from relays
    #[arg(long, global = true)]
    pub insecure: bool,

    /// Key file (default: <data dir>/keychain.key)
    #[arg(long, global = true)]
    pub keyfile: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Encrypt a payload for a recipient and publish it
    Push {
        /// Recipient public key (npub or hex)
        #[arg(long)]
        to: String,

        #[command(flatten)]
        payload: PayloadArgs,
    },

    /// Fetch and decrypt a payload by publish id
    Pull {
        /// Publish id printed by `push`
        #[arg(long)]
        id: String,

        /// Sender public key (npub or hex)
        #[arg(long)]
        from: String,

        /// Directory for received files
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Show the local identity
    Whoami,
}

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct PayloadArgs {
    /// Text message
    #[arg(long)]
    pub message: Option<String>,

    /// Arbitrary JSON value
    #[arg(long)]
    pub json: Option<String>,

    /// File to send
    #[arg(long)]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    pub fn into_payload(self) -> Result<Payload> {
        if let Some(text) = self.message {
            return Ok(Payload::text(text));
        }
        if let Some(json) = self.json {
            let value = serde_json::from_str(&json).context("--json is not valid JSON")?;
            return Ok(Payload::Message(value));
        }
        if let Some(path) = self.file {
            let bytes = std::fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            return Ok(Payload::File(bytes));
        }
        anyhow::bail!("one of --message, --json or --file is required")
    }
}

struct Resolved {
    config: EmperorConfig,
    keys: Keys,
    relays: Vec<String>,
}

impl Cli {
    fn load(&self) -> Result<Resolved> {
        let mut config =
            EmperorConfig::load(self.config.as_deref()).context("Failed to load config")?;
        if self.insecure {
            config.tls = TlsPolicy::Insecure;
        }

        let keyfile = match &self.keyfile {
            Some(path) => path.clone(),
            None => config.keyfile_path()?,
        };
        let keys = get_or_create_identity(&keyfile)
            .with_context(|| format!("Failed to load identity from {}", keyfile.display()))?;

        let relays = load_relay_endpoints(&config, self.relays_file.as_deref(), &self.relays)?;

        Ok(Resolved {
            config,
            keys,
            relays,
        })
    }
}

/// Connect to the configured relays. Cancellation drops the half-open pool,
/// which aborts its pending connections.
async fn open_session(ctx: &Resolved, cancel: &CancellationToken) -> Result<RelayPool> {
    let session = until_cancelled(cancel, RelayPool::open(&ctx.relays, ctx.config.relay_config()))
        .await
        .context("Interrupted while connecting to relays")?;
    Ok(session)
}

/// Execute the parsed command. Output goes to stdout; logs go to stderr.
pub async fn run(cli: Cli, cancel: CancellationToken) -> Result<()> {
    let ctx = cli.load()?;

    match cli.command {
        Command::Push { to, payload } => {
            let recipient = parse_public_key(&to)?;
            let payload = payload.into_payload()?;

            let session = open_session(&ctx, &cancel).await?;
            let receipt = publish(
                &session,
                &ctx.keys,
                &Nip04Cipher,
                &recipient,
                &payload,
                &ctx.config.publish_options(),
                &cancel,
            )
            .await
            .context("Publish failed")?;

            println!("publish id: {}", receipt.publish_id);
            println!("from: {}", ctx.keys.npub()?);
        }
        Command::Pull { id, from, out } => {
            let sender = parse_public_key(&from)?;
            let id = parse_publish_id(&id)?;

            let session = open_session(&ctx, &cancel).await?;
            let pulled = pull(
                &session,
                &ctx.keys,
                &Nip04Cipher,
                &sender,
                Some(&id),
                &ctx.config.pull_options(out),
                &cancel,
            )
            .await
            .context("Pull failed")?;

            match pulled {
                Pulled::Message { text, .. } => println!("{}", text),
                Pulled::File { path, size, .. } => {
                    println!("saved {} bytes to {}", size, path.display())
                }
            }
        }
        Command::Whoami => {
            println!("npub: {}", ctx.keys.npub()?);
            println!("hex: {}", ctx.keys.public_key_hex());
        }
    }

    Ok(())
}
