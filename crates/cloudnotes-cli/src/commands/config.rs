use crate::auth::{clear_app_password, load_app_password};
use crate::cli::ConfigCommands;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            server,
            username,
            insecure,
            no_activate,
        } => run_config_init(global_profile, server, username, insecure, no_activate),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

pub fn run_config_init(
    profile_name: Option<&str>,
    server: Option<String>,
    username: Option<String>,
    insecure: bool,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let updated = merge_profile(&existing_profile, server, username, insecure)?;
    if updated.server_url() != existing_profile.server_url()
        || updated.username() != existing_profile.username()
    {
        // Stored app passwords belong to one account on one server.
        clear_app_password(&profile_name)?;
    }
    *config.profile_mut_or_default(&profile_name) = updated;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );
    if load_app_password(&profile_name)?.is_none() {
        println!("Run `cloudnotes login` to authorize this profile.");
    }

    Ok(())
}

/// Applies explicit `config init` values on top of an existing profile.
pub fn merge_profile(
    existing: &CliProfile,
    server: Option<String>,
    username: Option<String>,
    insecure: bool,
) -> Result<CliProfile, CliError> {
    let server_url = match normalize_text_option(server) {
        Some(url) => Some(normalize_server_url(&url)?),
        None => existing.server_url(),
    };
    if server_url.is_none() {
        return Err(CliError::Config(
            "server URL is required; pass --server <url>".to_string(),
        ));
    }

    Ok(CliProfile {
        server_url,
        username: normalize_text_option(username).or_else(|| existing.username()),
        verify_ssl: if insecure {
            Some(false)
        } else {
            existing.verify_ssl
        },
    })
}

pub fn normalize_server_url(url: &str) -> Result<String, CliError> {
    let trimmed = url.trim();
    if !is_http_url(trimmed) {
        return Err(CliError::Config(
            "server URL must include http:// or https://".to_string(),
        ));
    }
    Ok(trimmed.trim_end_matches('/').to_string())
}

fn run_config_show(profile_name: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let Some(profile) = config.profile(&profile_name) else {
        println!("Profile '{profile_name}' is not configured.");
        return Ok(());
    };

    let logged_in = load_app_password(&profile_name)?.is_some();
    println!("profile:    {profile_name}");
    println!(
        "server:     {}",
        profile.server_url().unwrap_or_else(|| "-".to_string())
    );
    println!(
        "username:   {}",
        profile.username().unwrap_or_else(|| "-".to_string())
    );
    println!("verify_ssl: {}", profile.verify_ssl());
    println!("logged_in:  {logged_in}");
    Ok(())
}
