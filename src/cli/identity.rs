use anyhow::Result;
use clap::{Args, Subcommand};

use crate::config::Config;
use crate::identity::CredentialStore;

#[derive(Args)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub command: IdentityCommands,
}

#[derive(Subcommand)]
pub enum IdentityCommands {
    /// Show the registered account (never prints the API key)
    Show,

    /// Remove the local identity and its keychain entry
    Clear,
}

pub async fn run(args: IdentityArgs, config: Config) -> Result<()> {
    let store = if config.identity.use_vault {
        CredentialStore::with_keyring(config.identity_file())
    } else {
        CredentialStore::file_only(config.identity_file())
    };

    match args.command {
        IdentityCommands::Show => show(&store).await,
        IdentityCommands::Clear => {
            store.clear().await?;
            println!("Local identity cleared ({})", store.path().display());
            Ok(())
        }
    }
}

async fn show(store: &CredentialStore) -> Result<()> {
    match store.load_located().await? {
        Some((identity, location)) => {
            println!("Username:      {}", identity.username);
            println!("User ID:       {}", identity.user_id);
            println!("Registered:    {}", identity.registered_at.to_rfc3339());
            println!("API key in:    {}", location.describe());
            println!("Identity file: {}", store.path().display());
        }
        None => {
            println!("Not registered. Call 'register_agent' to create an account.");
            println!("Identity file: {}", store.path().display());
        }
    }
    Ok(())
}
