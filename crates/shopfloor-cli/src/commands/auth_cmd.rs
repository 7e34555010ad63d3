use chrono::DateTime;

use crate::auth::{clear_stored_session, load_stored_session, AuthSession, SupabaseAuthService};
use crate::cli::AuthCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(global_profile);
    let maybe_profile = config.profile(&profile_name);

    match command {
        AuthCommands::Login { email, password } => {
            let profile = maybe_profile.ok_or_else(|| {
                CliError::Config(format!(
                    "Profile '{profile_name}' is not configured. Run `shopfloor config init --profile {profile_name}` first."
                ))
            })?;
            let client_config = profile.client_config()?;
            let auth_service = SupabaseAuthService::new_for_profile(&profile_name, &client_config)?;
            let session = auth_service.sign_in(&email, &password).await?;
            println!(
                "Signed in profile '{profile_name}' as {}",
                email_label(&session)
            );
            Ok(())
        }
        AuthCommands::Status => {
            let Some(profile) = maybe_profile else {
                println!("Profile '{profile_name}' is not configured.");
                return Ok(());
            };

            let session = match profile.client_config() {
                Ok(client_config) => {
                    SupabaseAuthService::new_for_profile(&profile_name, &client_config)?
                        .restore_session()
                        .await?
                }
                Err(_) => load_stored_session(&profile_name)?,
            };

            if let Some(session) = session {
                println!(
                    "Profile '{}' is signed in as {} (expires {})",
                    profile_name,
                    email_label(&session),
                    format_expiry(session.expires_at)
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Logout => {
            let stored_session = load_stored_session(&profile_name)?;
            let auth_service = maybe_profile
                .and_then(|profile| profile.client_config().ok())
                .map(|client_config| {
                    SupabaseAuthService::new_for_profile(&profile_name, &client_config)
                })
                .transpose()?;

            if let (Some(service), Some(session)) = (auth_service, stored_session) {
                service.sign_out(&session.access_token).await?;
            } else {
                clear_stored_session(&profile_name)?;
            }

            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}

fn email_label(session: &AuthSession) -> &str {
    session.user.email.as_deref().unwrap_or("(no email)")
}

pub fn format_expiry(expires_at: i64) -> String {
    DateTime::from_timestamp(expires_at, 0).map_or_else(
        || expires_at.to_string(),
        |date_time| date_time.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
