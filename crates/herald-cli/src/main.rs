//! # Herald CLI
//!
//! Activate this machine for push notifications and administer
//! registrations.
//!
//! ## Usage
//!
//! ```bash
//! # Register this device
//! herald activate
//!
//! # Show activation state
//! herald status
//!
//! # Use a specific config file
//! herald --config /path/to/herald.toml deactivate
//!
//! # Configure through the environment
//! HERALD_KEY=app.key:secret herald channels
//! ```

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use herald_core::{FileStorage, Push};
use herald_protocol::PushChannelSubscription;
use herald_transport::{PaginatedResult, RestTransport};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[derive(Debug, Parser)]
#[command(name = "herald", version, about = "Herald push notification client")]
struct Cli {
    /// Path to herald.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register this device for push notifications
    Activate {
        /// Register through the application's own registerer
        #[arg(long)]
        custom_registerer: bool,
    },
    /// Remove this device's registration
    Deactivate {
        /// Deregister through the application's own deregisterer
        #[arg(long)]
        custom_deregisterer: bool,
    },
    /// Show activation state and the local device
    Status,
    /// Publish a notification to a recipient
    Publish {
        /// Recipient as JSON, e.g. '{"clientId":"bob"}'
        recipient: String,
        /// Payload as a JSON object
        payload: String,
    },
    /// Device registrations
    #[command(subcommand)]
    Devices(DeviceCommand),
    /// Channel subscriptions
    #[command(subcommand)]
    Subscriptions(SubscriptionCommand),
    /// List channels with push subscribers
    Channels {
        #[arg(long)]
        limit: Option<u32>,
        /// Follow every page
        #[arg(long)]
        all: bool,
    },
}

#[derive(Debug, Subcommand)]
enum DeviceCommand {
    /// List registrations
    List {
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        device_id: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Remove registrations
    Remove {
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        device_id: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum SubscriptionCommand {
    /// List subscriptions
    List {
        #[arg(long)]
        channel: Option<String>,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        device_id: Option<String>,
    },
    /// Subscribe a device or client id to a channel
    Save {
        channel: String,
        #[arg(long, conflicts_with = "device_id", required_unless_present = "device_id")]
        client_id: Option<String>,
        #[arg(long)]
        device_id: Option<String>,
    },
    /// Remove subscriptions
    Remove {
        #[arg(long)]
        channel: Option<String>,
        #[arg(long)]
        client_id: Option<String>,
        #[arg(long)]
        device_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    tracing::debug!(endpoint = %config.endpoint, "Loaded configuration");
    herald_core::metrics::describe();

    let transport = Arc::new(
        RestTransport::new(config.rest_options()).context("Invalid REST configuration")?,
    );

    match cli.command {
        Command::Activate { custom_registerer } => {
            push(&config, Arc::clone(&transport))?
                .activate(custom_registerer)
                .await
                .context("Activation failed")?;
            println!("Activated");
        }
        Command::Deactivate {
            custom_deregisterer,
        } => {
            push(&config, Arc::clone(&transport))?
                .deactivate(custom_deregisterer)
                .await
                .context("Deactivation failed")?;
            println!("Deactivated");
        }
        Command::Status => {
            let snapshot = push(&config, Arc::clone(&transport))?.snapshot().await?;
            println!("state:                 {}", snapshot.state);
            println!("device:                {}", snapshot.device.id);
            println!("registered:            {}", snapshot.device.is_registered());
            println!("custom registerer:     {}", snapshot.use_custom_registerer);
            println!("custom deregisterer:   {}", snapshot.use_custom_deregisterer);
            if !snapshot.pending.is_empty() {
                println!("pending:               {}", snapshot.pending.join(", "));
            }
        }
        Command::Publish { recipient, payload } => {
            let recipient = serde_json::from_str(&recipient).context("Recipient is not JSON")?;
            let payload = serde_json::from_str(&payload).context("Payload is not JSON")?;
            push(&config, Arc::clone(&transport))?
                .publish(recipient, payload)
                .await
                .context("Publish failed")?;
            println!("Published");
        }
        Command::Devices(command) => devices(&transport, command).await?,
        Command::Subscriptions(command) => subscriptions(&transport, command).await?,
        Command::Channels { limit, all } => {
            let channels = &transport.admin().channel_subscriptions;
            let limit = limit.map(|l| l.to_string());
            let params = params(&[("limit", limit.as_deref())]);

            let mut page = channels.list_channels(&params).await?;
            loop {
                for channel in &page.items {
                    println!("{channel}");
                }
                if !all {
                    break;
                }
                match channels.next_channels(&page).await? {
                    Some(next) => page = next,
                    None => break,
                }
            }
        }
    }

    Ok(())
}

fn push(config: &Config, transport: Arc<RestTransport>) -> Result<Push> {
    let path = config.storage_path();
    let storage = FileStorage::open(&path)
        .with_context(|| format!("Failed to open storage: {}", path.display()))?;

    Ok(Push::builder(transport)
        .storage(Arc::new(storage))
        .platform(Arc::new(config.platform()))
        .device_defaults(config.device_defaults())
        .build())
}

async fn devices(transport: &RestTransport, command: DeviceCommand) -> Result<()> {
    let registrations = transport.admin().device_registrations;

    match command {
        DeviceCommand::List {
            client_id,
            device_id,
            limit,
        } => {
            let limit = limit.map(|l| l.to_string());
            let params = params(&[
                ("clientId", client_id.as_deref()),
                ("deviceId", device_id.as_deref()),
                ("limit", limit.as_deref()),
            ]);
            print_page(&registrations.get(&params).await?)?;
        }
        DeviceCommand::Remove {
            client_id,
            device_id,
        } => {
            let params = params(&[
                ("clientId", client_id.as_deref()),
                ("deviceId", device_id.as_deref()),
            ]);
            anyhow::ensure!(!params.is_empty(), "Pass --client-id or --device-id");
            registrations.remove(&params).await?;
            println!("Removed");
        }
    }

    Ok(())
}

async fn subscriptions(transport: &RestTransport, command: SubscriptionCommand) -> Result<()> {
    let subscriptions = transport.admin().channel_subscriptions;

    match command {
        SubscriptionCommand::List {
            channel,
            client_id,
            device_id,
        } => {
            let params = params(&[
                ("channel", channel.as_deref()),
                ("clientId", client_id.as_deref()),
                ("deviceId", device_id.as_deref()),
            ]);
            print_page(&subscriptions.get(&params).await?)?;
        }
        SubscriptionCommand::Save {
            channel,
            client_id,
            device_id,
        } => {
            let subscription = match (client_id, device_id) {
                (Some(client_id), _) => PushChannelSubscription::for_client_id(channel, client_id),
                (None, Some(device_id)) => PushChannelSubscription::for_device(channel, device_id),
                (None, None) => anyhow::bail!("Pass --client-id or --device-id"),
            };
            let saved = subscriptions.save(&subscription).await?;
            println!("{}", serde_json::to_string_pretty(&saved)?);
        }
        SubscriptionCommand::Remove {
            channel,
            client_id,
            device_id,
        } => {
            let params = params(&[
                ("channel", channel.as_deref()),
                ("clientId", client_id.as_deref()),
                ("deviceId", device_id.as_deref()),
            ]);
            anyhow::ensure!(!params.is_empty(), "Pass at least one filter");
            subscriptions.remove(&params).await?;
            println!("Removed");
        }
    }

    Ok(())
}

/// Keep only the query parameters that were given.
fn params<'a>(pairs: &[(&'static str, Option<&'a str>)]) -> Vec<(&'static str, &'a str)> {
    pairs
        .iter()
        .filter_map(|(key, value)| value.map(|v| (*key, v)))
        .collect()
}

fn print_page<T: Serialize>(page: &PaginatedResult<T>) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&page.items)?);
    if page.has_next() {
        eprintln!("(more results available)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_skip_missing() {
        let params = params(&[("clientId", Some("alice")), ("deviceId", None)]);
        assert_eq!(params, vec![("clientId", "alice")]);
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::parse_from(["herald", "activate", "--custom-registerer"]);
        assert!(matches!(
            cli.command,
            Command::Activate {
                custom_registerer: true
            }
        ));

        let cli = Cli::parse_from([
            "herald",
            "--config",
            "herald.toml",
            "subscriptions",
            "save",
            "alerts",
            "--device-id",
            "dev-1",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("herald.toml")));
        assert!(matches!(
            cli.command,
            Command::Subscriptions(SubscriptionCommand::Save { .. })
        ));

        assert!(Cli::try_parse_from(["herald", "subscriptions", "save", "alerts"]).is_err());
    }
}
