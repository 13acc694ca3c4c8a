// ChatRelay - Multi-client TCP chat relay
use chatrelay::cli::{execute_command, Args};
use clap::Parser;

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let code = match execute_command(args).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", anyhow::Error::new(e));
            1
        }
    };

    // A terminal read may still be parked on a blocking thread; don't wait for it.
    std::process::exit(code);
}
