use cloudnotes_core::{NotesClient, StatusSnapshot};

use crate::commands::common::{ensure_sent, open_anonymous_client, settle};
use crate::error::CliError;

pub async fn run_status(profile: Option<&str>, as_json: bool) -> Result<(), CliError> {
    let mut client = open_anonymous_client(profile)?;
    let snapshot = fetch_status(&mut client).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        for line in format_status_lines(&client.api().endpoint().server(), &snapshot) {
            println!("{line}");
        }
    }

    Ok(())
}

pub async fn fetch_status(client: &mut NotesClient) -> Result<StatusSnapshot, CliError> {
    let mut events = client.subscribe();
    ensure_sent(client.api_mut().get_status(), "status request")?;
    settle(client, &mut events).await?;
    Ok(client.api().status().snapshot().clone())
}

pub fn format_status_lines(server: &str, snapshot: &StatusSnapshot) -> Vec<String> {
    let product = if snapshot.product_name.is_empty() {
        "Nextcloud"
    } else {
        snapshot.product_name.as_str()
    };
    let version = if snapshot.version_string.is_empty() {
        snapshot.version.as_str()
    } else {
        snapshot.version_string.as_str()
    };

    let mut lines = vec![format!("{product} {version} at {server}")];
    if !snapshot.installed {
        lines.push("Not installed".to_string());
    }
    if snapshot.maintenance {
        lines.push("Maintenance mode is enabled".to_string());
    }
    if snapshot.needs_db_upgrade {
        lines.push("Database upgrade required".to_string());
    }
    lines
}
