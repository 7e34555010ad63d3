use std::env;

use shopfloor_core::config::{
    generate_device_id, normalize_functions_url, ENV_API_KEY, ENV_DEVICE_ID, ENV_FUNCTIONS_URL,
    ENV_SUPABASE_URL,
};

use crate::cli::ConfigCommands;
use crate::config_profiles::{is_http_url, normalize_text_option, CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            functions_url,
            device_id,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileInput {
                supabase_url,
                supabase_anon_key,
                functions_url,
                device_id,
            },
            no_activate,
        ),
    }
}

/// Values passed on the command line.
#[derive(Debug, Default)]
pub struct ProfileInput {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub functions_url: Option<String>,
    pub device_id: Option<String>,
}

pub fn run_config_init(
    profile_name: Option<&str>,
    input: ProfileInput,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing_profile = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(input, &existing_profile, |name| {
        normalize_text_option(env::var(name).ok())
    })?;
    *config.profile_mut_or_default(&profile_name) = merged;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save().map_err(CliError::Config)?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let profile = config
        .profiles
        .get(&profile_name)
        .ok_or_else(|| CliError::Config("Failed to persist profile".to_string()))?;
    let missing_fields = profile.missing_fields();
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `shopfloor auth login --email <email> --password <password>`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

/// Merge explicit values over environment values over the existing profile.
///
/// A device id is generated once and then kept, so queued transactions from
/// this machine stay attributable to the same device.
pub fn merge_profile(
    input: ProfileInput,
    existing: &CliProfile,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<CliProfile, CliError> {
    let supabase_url = normalize_text_option(input.supabase_url)
        .or_else(|| env_lookup(ENV_SUPABASE_URL))
        .or_else(|| existing.supabase_url());
    let supabase_anon_key = normalize_text_option(input.supabase_anon_key)
        .or_else(|| env_lookup(ENV_API_KEY))
        .or_else(|| existing.supabase_anon_key());
    let functions_url = normalize_text_option(input.functions_url)
        .or_else(|| env_lookup(ENV_FUNCTIONS_URL))
        .or_else(|| existing.functions_url());
    let device_id = normalize_text_option(input.device_id)
        .or_else(|| env_lookup(ENV_DEVICE_ID))
        .or_else(|| existing.device_id())
        .unwrap_or_else(generate_device_id);

    let profile = CliProfile {
        supabase_url: supabase_url.map(|url| url.trim_end_matches('/').to_string()),
        supabase_anon_key,
        functions_url,
        device_id: Some(device_id),
    };
    validate_profile_urls(&profile)?;
    Ok(profile)
}

fn validate_profile_urls(profile: &CliProfile) -> Result<(), CliError> {
    if let Some(url) = profile.supabase_url() {
        if !is_http_url(&url) {
            return Err(CliError::Config(
                "supabase_url must include http:// or https://".to_string(),
            ));
        }
    }
    if let Some(url) = profile.functions_url() {
        normalize_functions_url(&url)?;
    }
    Ok(())
}
