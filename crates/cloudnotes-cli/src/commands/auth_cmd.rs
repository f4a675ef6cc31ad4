use std::time::Duration;

use cloudnotes_core::events::drain_events;
use cloudnotes_core::{ApiErrorKind, ApiEvent, LoginStatus, NotesClient, Progress};

use crate::auth::{clear_app_password, save_app_password};
use crate::commands::common::{
    client_config, configure_client, ensure_sent, load_profile, open_client, settle,
};
use crate::error::CliError;

/// Account details the server handed back at the end of a login flow.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub server: String,
    pub username: String,
    pub app_password: String,
}

pub async fn run_login(profile: Option<&str>, timeout_secs: u64) -> Result<(), CliError> {
    let (mut config, profile_name) = load_profile(profile)?;
    let profile_config = config.profile(&profile_name).cloned().ok_or_else(|| {
        CliError::Config(format!(
            "Profile '{profile_name}' is not configured. Run `cloudnotes config init --server <url>` first."
        ))
    })?;

    let mut client = NotesClient::new(client_config())?;
    configure_client(&mut client, &profile_config, None)?;

    let flow = login_flow(&mut client, |url| {
        println!("Open this URL in a browser to grant access:\n  {url}");
    });
    let result = tokio::time::timeout(Duration::from_secs(timeout_secs), flow).await;
    let outcome = match result {
        Ok(outcome) => outcome?,
        Err(_) => {
            client.api_mut().abort_login();
            return Err(CliError::LoginTimeout(timeout_secs));
        }
    };

    if !verify_credentials(&mut client).await {
        tracing::warn!("Server did not confirm the new credentials");
    }

    save_app_password(&profile_name, &outcome.app_password)?;
    let stored = config.profile_mut_or_default(&profile_name);
    stored.server_url = Some(outcome.server.clone());
    stored.username = Some(outcome.username.clone());
    config.save().map_err(CliError::Config)?;

    println!(
        "Logged in profile '{}' as {} on {}",
        profile_name, outcome.username, outcome.server
    );
    Ok(())
}

/// Runs Login Flow v2 to completion, reporting the browser URL through
/// `on_login_url` as soon as the server issues it.
pub async fn login_flow(
    client: &mut NotesClient,
    mut on_login_url: impl FnMut(&str),
) -> Result<LoginOutcome, CliError> {
    let mut events = client.subscribe();
    ensure_sent(client.api_mut().initiate_login(), "login flow")?;

    let mut last_error = None;
    loop {
        match client.process_next().await {
            Progress::Closed => {
                return Err(CliError::Login("reply stream closed".to_string()));
            }
            Progress::Polled { accepted: false } => {
                client.api_mut().abort_login();
                return Err(CliError::NotSent("login poll".to_string()));
            }
            Progress::Polled { accepted: true } | Progress::Reply(_) => {}
        }

        for event in drain_events(&mut events) {
            match event {
                ApiEvent::LoginUrlChanged(Some(url)) => on_login_url(&url),
                ApiEvent::Error(kind) => last_error = Some(kind),
                _ => {}
            }
        }

        match client.api().login_status() {
            LoginStatus::Succeeded => break,
            LoginStatus::Failed => {
                let reason = last_error.unwrap_or(ApiErrorKind::Unknown);
                return Err(CliError::Login(reason.to_string()));
            }
            LoginStatus::Unknown | LoginStatus::Initiating | LoginStatus::Polling => {}
        }
    }

    let endpoint = client.api().endpoint();
    Ok(LoginOutcome {
        server: endpoint.server(),
        username: endpoint.endpoint().username.clone(),
        app_password: endpoint.endpoint().password.clone(),
    })
}

/// Asks the server whether the client's current credentials are accepted.
pub async fn verify_credentials(client: &mut NotesClient) -> bool {
    let mut events = client.subscribe();
    if !client.api().verify_login() {
        return false;
    }
    client.wait_idle().await;
    drain_events(&mut events)
        .into_iter()
        .any(|event| event == ApiEvent::LoginVerified { valid: true })
}

pub async fn run_logout(profile: Option<&str>) -> Result<(), CliError> {
    let (_, profile_name) = load_profile(profile)?;

    match open_client(profile) {
        Ok(mut client) => {
            if let Err(error) = revoke_app_password(&mut client).await {
                tracing::warn!("Could not revoke app password on the server: {}", error);
            }
        }
        Err(CliError::NotLoggedIn(_)) => {}
        Err(error) => return Err(error),
    }

    clear_app_password(&profile_name)?;
    println!("Logged out profile '{profile_name}'");
    Ok(())
}

pub async fn revoke_app_password(client: &mut NotesClient) -> Result<(), CliError> {
    let mut events = client.subscribe();
    ensure_sent(client.api().delete_app_password(), "app password revocation")?;
    settle(client, &mut events).await
}
