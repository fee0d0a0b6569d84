use std::{
    error::Error,
    fs::OpenOptions,
    io::{self, Write},
    path::Path,
    process::exit,
};

use bcrypt::DEFAULT_COST;
use clap::Parser;

use gastos_rs::auth::CredentialStore;

/// A utility for adding a user to the credential file.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the credential file (username:bcrypt_hash lines).
    #[arg(long)]
    credentials_path: String,

    /// The username to register.
    #[arg(long)]
    username: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let credentials_path = Path::new(&args.credentials_path);
    let username = args.username.trim();

    if username.is_empty() || username.contains(':') {
        print_error("Usernames must be non-empty and must not contain ':'.");
        exit(1);
    }

    if credentials_path.is_file() {
        let store = CredentialStore::from_file(credentials_path)?;

        if store.contains(username) {
            print_error(format!("The user '{username}' is already registered."));
            exit(1);
        }
    }

    let Some(password) = get_password() else {
        return Ok(());
    };

    let password_hash = bcrypt::hash(&password, DEFAULT_COST)?;

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(credentials_path)?;
    writeln!(file, "{username}:{password_hash}")?;

    println!("Registered '{username}'. Restart the server to pick up the change.");

    Ok(())
}

fn get_password() -> Option<String> {
    loop {
        println!();

        let first_password = match rpassword::prompt_password("Enter a password: ") {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                print_error(format!("Could not read password from stdin: {error}"));
                return None;
            }
        };

        if first_password.is_empty() {
            print_error("The password must not be empty, try again.");
            continue;
        }

        let second_password = match rpassword::prompt_password("Enter the same password again: ") {
            Ok(string) => string,
            Err(error) if error.kind() == io::ErrorKind::UnexpectedEof => {
                return None;
            }
            Err(error) => {
                print_error(format!("Could not read password from stdin: {error}"));
                return None;
            }
        };

        if first_password != second_password {
            print_error("Passwords must match, try again.");
            continue;
        }

        return Some(first_password);
    }
}

fn print_error(error: impl ToString) {
    eprintln!("\x1b[31;1m{}\x1b[0m", error.to_string())
}
