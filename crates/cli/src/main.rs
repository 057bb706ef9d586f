//! CLI for the `schnorr-host` crate.

use std::{
    io::{self, Read as _, Write as _},
    path::PathBuf,
};

use anyhow::Context;
use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

use schnorr_host::{Runtime, RuntimeConfig, Session};

/// Signs and hashes messages with a sandboxed WASM guest module.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Path to the guest WASM module.
    #[arg(long, short = 'm', env = "SCHNORR_HOST_MODULE")]
    module: PathBuf,
    /// Limit on the guest linear memory size in bytes.
    #[arg(long)]
    memory_limit: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generates a new private key and prints it together with its address.
    Keygen,
    /// Signs a message (usually, a hash) with the provided private key.
    Sign {
        /// Private key to sign with.
        #[arg(long, short = 'k', env = "SCHNORR_HOST_PRIVATE_KEY", hide_env_values = true)]
        key: String,
        /// Message to sign. If not specified, the message is read from the standard input.
        message: Option<String>,
    },
    /// Hashes a message.
    Hash {
        /// Output little-endian hash bytes in hex instead of the textual hash literal.
        #[arg(long)]
        bytes: bool,
        /// Message to hash. If not specified, the message is read from the standard input.
        message: Option<String>,
    },
    /// Formats a message as a struct consisting of the specified number of chunks.
    Format {
        /// Number of chunks in the formatted message.
        #[arg(long, short = 'c', default_value_t = 1)]
        chunks: usize,
        /// Message to format. If not specified, the message is read from the standard input.
        message: Option<String>,
    },
    /// Recovers a message from its formatted representation.
    Recover {
        /// Formatted message. If not specified, it is read from the standard input.
        formatted: Option<String>,
    },
}

impl Args {
    #[cfg(feature = "tracing")]
    fn configure_tracing() {
        use tracing_subscriber::{FmtSubscriber, filter::EnvFilter};

        FmtSubscriber::builder()
            .without_time()
            .with_writer(io::stderr)
            .with_env_filter(EnvFilter::from_default_env())
            .init();
    }

    fn run(self) -> anyhow::Result<()> {
        #[cfg(feature = "tracing")]
        Self::configure_tracing();

        let mut config = RuntimeConfig::new(self.module.clone());
        config.set_memory_limit(self.memory_limit);
        let runtime = Runtime::new(&config).with_context(|| {
            format!(
                "failed loading guest module from `{}`",
                self.module.to_string_lossy()
            )
        })?;
        let mut session = runtime
            .new_session()
            .context("failed creating guest session")?;

        let output = self.command.execute(&mut session)?;
        let mut stdout = io::stdout().lock();
        stdout
            .write_all(output.as_bytes())
            .and_then(|()| stdout.write_all(b"\n"))
            .context("failed writing to standard output")
    }
}

impl Command {
    fn execute(self, session: &mut Session) -> anyhow::Result<Zeroizing<String>> {
        let output = match self {
            Self::Keygen => {
                let key_pair = session
                    .new_private_key()
                    .context("failed generating private key")?;
                let private_key = Zeroizing::new(key_pair.private_key);
                let mut output = Zeroizing::new(String::from_utf8_lossy(&private_key).into_owned());
                output.push('\n');
                output.push_str(&key_pair.address);
                return Ok(output);
            }
            Self::Sign { key, message } => {
                let key = Zeroizing::new(key.into_bytes());
                let message = read_message(message)?;
                session.sign(&key, &message).context("failed signing message")?
            }
            Self::Hash { bytes: false, message } => {
                let message = read_message(message)?;
                session
                    .hash_message_to_string(&message)
                    .context("failed hashing message")?
            }
            Self::Hash { bytes: true, message } => {
                let message = read_message(message)?;
                let hash = session
                    .hash_message(&message)
                    .context("failed hashing message")?;
                hex::encode(&hash)
            }
            Self::Format { chunks, message } => {
                let message = read_message(message)?;
                let formatted = session
                    .format_message(&message, chunks)
                    .context("failed formatting message")?;
                String::from_utf8(formatted).context("formatted message is not UTF-8")?
            }
            Self::Recover { formatted } => {
                let formatted = read_message(formatted)?;
                let message = session
                    .recover_message(&formatted)
                    .context("failed recovering message")?;
                String::from_utf8(message).context("recovered message is not UTF-8")?
            }
        };
        Ok(Zeroizing::new(output))
    }
}

fn read_message(message: Option<String>) -> anyhow::Result<Vec<u8>> {
    if let Some(message) = message {
        return Ok(message.into_bytes());
    }
    let mut buffer = Vec::with_capacity(1_024);
    io::stdin()
        .read_to_end(&mut buffer)
        .context("failed reading message from standard input")?;
    Ok(buffer)
}

fn main() -> anyhow::Result<()> {
    Args::parse().run()
}
