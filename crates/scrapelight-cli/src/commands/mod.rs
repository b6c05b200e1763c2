//! Subcommand implementations.

mod call;
mod change_password;
mod login;
mod logout;
mod refresh;
mod register;
mod update_profile;
mod validate;
mod whoami;

use anyhow::Result;
use clap::Subcommand;

use scrapelight_http::ClientConfig;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Log in and store the session
    Login(login::LoginArgs),

    /// Create an account, then log in
    Register(register::RegisterArgs),

    /// End the session and remove stored credentials
    Logout(logout::LogoutArgs),

    /// Display the logged-in account
    Whoami(whoami::WhoamiArgs),

    /// Renew the stored credentials
    Refresh(refresh::RefreshArgs),

    /// Check that the stored access token is accepted
    Validate(validate::ValidateArgs),

    /// Change the account's username or email
    UpdateProfile(update_profile::UpdateProfileArgs),

    /// Change the account password
    ChangePassword(change_password::ChangePasswordArgs),

    /// Send an arbitrary request through the session
    Call(call::CallArgs),
}

pub async fn handle(command: Command, config: ClientConfig) -> Result<()> {
    match command {
        Command::Login(args) => login::run(args, config).await,
        Command::Register(args) => register::run(args, config).await,
        Command::Logout(args) => logout::run(args, config).await,
        Command::Whoami(args) => whoami::run(args, config).await,
        Command::Refresh(args) => refresh::run(args, config).await,
        Command::Validate(args) => validate::run(args, config).await,
        Command::UpdateProfile(args) => update_profile::run(args, config).await,
        Command::ChangePassword(args) => change_password::run(args, config).await,
        Command::Call(args) => call::run(args, config).await,
    }
}
