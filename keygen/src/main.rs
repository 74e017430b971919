//! Out-of-band VAPID key generation.
//!
//! Prints a fresh key pair in `.env` format. Run once per deployment and keep
//! the output with the rest of the service secrets; the notifier never
//! generates keys itself.

use anyhow::Result;
use clap::Parser;
use notifier::constants::{env, push};
use notifier::VapidKeys;

/// Generate a VAPID key pair for the class reminder notifier
#[derive(Parser)]
#[command(name = "vapid-keygen", version, about)]
struct Cli {
    /// Contact URL for push services (`mailto:` or `https:`)
    #[arg(long, default_value = push::DEFAULT_SUBJECT)]
    subject: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let keys = VapidKeys::generate(&cli.subject)?;

    // Round trip through the loader so a bad pair never gets printed
    VapidKeys::from_base64(keys.public_key(), &keys.export_private_key(), &cli.subject)?;

    println!("{}={}", env::VAPID_PUBLIC_KEY, keys.public_key());
    println!("{}={}", env::VAPID_PRIVATE_KEY, keys.export_private_key());
    println!("{}={}", env::VAPID_SUBJECT, keys.subject());
    Ok(())
}
