use clap::Parser;
use ota_distribution::utils::hash::calculate_hash;
use std::io::BufRead;

/// Prints the value to put in UPLOAD_AUTH_HASH for an upload password.
#[derive(Parser)]
#[command(name = "hash_password")]
struct Args {
    /// Password to hash. Read from stdin when omitted, so it stays out of shell history.
    password: Option<String>,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let password = match args.password {
        Some(password) => password,
        None => {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }

    println!("UPLOAD_AUTH_HASH={}", calculate_hash(password.as_bytes()));
    Ok(())
}
