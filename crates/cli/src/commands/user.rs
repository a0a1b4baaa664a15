//! Account management commands.
//!
//! # Usage
//!
//! ```bash
//! # Create the first admin (the API only ever registers plain users)
//! parkspot user create -e ops@lot.example.org -p 'long passphrase' --admin
//!
//! # Promote or demote an existing account
//! parkspot user set-role -e driver@lot.example.org -r admin
//! ```

use parkspot_core::{AccountType, Email};
use parkspot_server::db::{RepositoryError, UserRepository};
use parkspot_server::services::auth::create_account;

use super::{CliError, connect};

/// Create an account.
///
/// # Errors
///
/// Returns `CliError::Auth` if the email is invalid, the password is too
/// short, or the email is already registered.
pub async fn create(email: &str, password: &str, admin: bool) -> Result<(), CliError> {
    let account_type = if admin {
        AccountType::Admin
    } else {
        AccountType::User
    };

    let pool = connect().await?;
    let users = UserRepository::new(&pool);
    let user = create_account(&users, email, password, account_type).await?;

    tracing::info!(
        "Account created! ID: {}, Email: {}, Type: {}",
        user.id,
        user.email,
        user.account_type
    );
    Ok(())
}

/// Change the account type of the user with `email`.
///
/// # Errors
///
/// Returns `CliError::InvalidArgument` for a bad email or role, and
/// `CliError::Repository` if no such user exists.
pub async fn set_role(email: &str, role: &str) -> Result<(), CliError> {
    let email = Email::parse(email).map_err(|e| CliError::InvalidArgument(e.to_string()))?;
    let account_type: AccountType = role.parse().map_err(CliError::InvalidArgument)?;

    let pool = connect().await?;
    UserRepository::new(&pool)
        .update_account_type_by_email(&email, account_type)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => {
                CliError::InvalidArgument(format!("no account with email {email}"))
            }
            other => CliError::Repository(other),
        })?;

    tracing::info!("Account {} is now {}", email, account_type);
    Ok(())
}
