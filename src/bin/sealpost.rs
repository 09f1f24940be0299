//! sealpost: command-line tool for encrypted-envelope operations.
//!
//! Generates and stores keypairs, publishes them to a key registry, and
//! seals/opens envelope-shaped post bodies. Posting the produced text to a
//! feed is left to the posting client.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use sealpost::{
    can_attempt_decrypt, seal, unseal, wire, HttpKeyRegistry, KeyRegistry, KeyStore, Keypair,
    SealpostError, StoredKeypair, WireLimits,
};

#[derive(Parser)]
#[command(name = "sealpost")]
#[command(author, version, about = "Encrypted direct-message envelopes for public feeds")]
#[command(propagate_version = true)]
struct Cli {
    /// Keystore directory
    #[arg(long, default_value = ".sealpost", global = true)]
    store: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate and store a keypair for an identity
    Keygen {
        /// Local handle (e.g. alice.bsky.social)
        identity: String,

        /// Passphrase protecting the private key (min 12 characters)
        #[arg(short, long)]
        passphrase: String,
    },

    /// Publish an identity's public key to the registry
    Publish {
        /// Local handle
        identity: String,

        /// Registry base URL
        #[arg(short, long)]
        registry: String,
    },

    /// Look up a handle's published key
    Lookup {
        /// Handle to query
        handle: String,

        /// Registry base URL
        #[arg(short, long)]
        registry: String,
    },

    /// Seal a message and print the postable wire body
    Seal {
        /// Sender identity (must have a stored keypair)
        identity: String,

        /// Recipient handle
        #[arg(short, long)]
        to: String,

        /// Message plaintext
        #[arg(short, long)]
        message: String,

        /// Passphrase for the sender's private key
        #[arg(short, long)]
        passphrase: String,

        /// Registry base URL (recipient key is looked up fresh)
        #[arg(short, long)]
        registry: String,

        /// Posting substrate character limit
        #[arg(long, default_value_t = 300)]
        max_post_chars: usize,
    },

    /// Open an envelope-shaped post body
    Open {
        /// Local identity (must have a stored keypair)
        identity: String,

        /// The full post text
        #[arg(short, long)]
        text: String,

        /// Handle of the post's author
        #[arg(short, long)]
        author: String,

        /// Passphrase for the private key
        #[arg(short, long)]
        passphrase: String,

        /// Registry base URL (needed only to re-open your own sent messages)
        #[arg(short, long)]
        registry: Option<String>,
    },

    /// Show whether a post body is an envelope and who it is for
    Inspect {
        /// The full post text
        text: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let store = KeyStore::new(&cli.store);

    match cli.command {
        Commands::Keygen {
            identity,
            passphrase,
        } => {
            let stored = StoredKeypair::new(Keypair::generate());
            store.persist(&identity, &stored, &passphrase)?;
            println!("Generated keypair for {}", identity);
            println!("Keystore: {}", store.root().display());
        }

        Commands::Publish { identity, registry } => {
            let portable = store
                .load_public(&identity)?
                .ok_or(SealpostError::KeyNotFound(identity.clone()))?;
            HttpKeyRegistry::new(registry)
                .publish(&identity, &portable)
                .await?;
            println!("Published key for {}", identity);
        }

        Commands::Lookup { handle, registry } => {
            match HttpKeyRegistry::new(registry).lookup(&handle).await? {
                Some(key) => println!("{}", serde_json::to_string_pretty(&key)?),
                None => println!("{} has not set up encryption", handle),
            }
        }

        Commands::Seal {
            identity,
            to,
            message,
            passphrase,
            registry,
            max_post_chars,
        } => {
            let stored = store
                .load(&identity, &passphrase)?
                .ok_or(SealpostError::KeyNotFound(identity.clone()))?;
            let recipient_key = HttpKeyRegistry::new(registry)
                .lookup(&to)
                .await?
                .ok_or(SealpostError::RecipientKeyNotFound(to.clone()))?
                .to_public()?;

            let limits = WireLimits::new(max_post_chars);
            let envelope = seal(&message, &recipient_key, &stored.keypair, &limits, &to)?;
            println!("{}", wire::wrap(&to, &wire::encode(&envelope)));
        }

        Commands::Open {
            identity,
            text,
            author,
            passphrase,
            registry,
        } => {
            let parts = wire::unwrap(&text)
                .ok_or(SealpostError::Format("not an envelope".into()))?;
            if !can_attempt_decrypt(&parts.recipient_handle, &author, &identity) {
                return Err(Box::new(SealpostError::Decryption));
            }

            let stored = store
                .load(&identity, &passphrase)?
                .ok_or(SealpostError::KeyNotFound(identity.clone()))?;
            let envelope = wire::decode(&parts.token)?;

            let counterpart = if identity.eq_ignore_ascii_case(&author) {
                // Re-opening our own sent message: we need the recipient's
                // published key.
                let registry = registry.ok_or(SealpostError::Registry(
                    "opening a sent message requires --registry".into(),
                ))?;
                HttpKeyRegistry::new(registry)
                    .lookup(&parts.recipient_handle)
                    .await?
                    .ok_or(SealpostError::RecipientKeyNotFound(
                        parts.recipient_handle.clone(),
                    ))?
                    .to_public()?
            } else {
                envelope.sender_public.clone()
            };

            println!("{}", unseal(&envelope, &counterpart, &stored.keypair)?);
        }

        Commands::Inspect { text } => match wire::unwrap(&text) {
            Some(parts) => {
                println!("Envelope for @{}", parts.recipient_handle);
                println!("Token: {} chars", parts.token.len());
            }
            None => println!("Not an envelope"),
        },
    }

    Ok(())
}
