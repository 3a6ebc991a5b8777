// Password-file management tool, grounded on hebo's `hebo_passwd.rs` (add,
// update, delete entries in a flat `username:$6$salt$hash` file) with a
// `clap` derive CLI in place of hebo's hand-parsed argv.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use monstermq::auth::file_auth;
use monstermq::error::Error;

#[derive(Parser, Debug)]
#[command(name = "monstermq-passwd", version, about = "Manage a monstermqd password file")]
struct Cli {
    /// Password file to create or edit.
    password_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a user, or update their password if already present.
    Add {
        username: String,
        /// Read interactively from stdin when omitted.
        password: Option<String>,
    },
    /// Remove a user from the file.
    Delete { username: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("monstermq-passwd: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Error> {
    match cli.command {
        Command::Add { username, password } => {
            let password = match password {
                Some(password) => password,
                None => prompt_for_password()?,
            };
            file_auth::set_password(&cli.password_file, &username, password.as_bytes())?;
            println!("updated password for {username}");
        }
        Command::Delete { username } => {
            file_auth::delete_user(&cli.password_file, &username)?;
            println!("removed {username}");
        }
    }
    Ok(())
}

fn prompt_for_password() -> Result<String, Error> {
    use std::io::Write;
    print!("Password: ");
    std::io::stdout()
        .flush()
        .map_err(|err| Error::new(monstermq::error::ErrorKind::Io, err.to_string()))?;
    let mut line = String::new();
    std::io::stdin()
        .read_line(&mut line)
        .map_err(|err| Error::new(monstermq::error::ErrorKind::Io, err.to_string()))?;
    Ok(line.trim_end_matches(['\n', '\r']).to_string())
}
