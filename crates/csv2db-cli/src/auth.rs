//! Interactive credential prompts.

use std::io::IsTerminal;

use csv2db::{url_credentials, ConnectOptions, LoadError};
use dialoguer::{Input, Password};

fn prompt_error(e: dialoguer::Error) -> LoadError {
    LoadError::Io(std::io::Error::other(e.to_string()))
}

/// Ask for a user and password the URL and flags leave out.
///
/// Without a terminal on stdin the options are returned unchanged and the
/// driver reports any authentication failure.
pub fn complete_credentials(mut connect: ConnectOptions) -> Result<ConnectOptions, LoadError> {
    if !std::io::stdin().is_terminal() {
        return Ok(connect);
    }
    let embedded = url_credentials(&connect.url)?;

    if connect.user.is_none() && embedded.user.is_none() {
        let user: String = Input::new()
            .with_prompt("Database user")
            .interact_text()
            .map_err(prompt_error)?;
        connect.user = Some(user);
    }
    if connect.password.is_none() && !embedded.has_password {
        let password: String = Password::new()
            .with_prompt("Database password")
            .allow_empty_password(true)
            .interact()
            .map_err(prompt_error)?;
        if !password.is_empty() {
            connect.password = Some(password);
        }
    }
    Ok(connect)
}
