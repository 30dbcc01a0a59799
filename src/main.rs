use std::env;
use std::process::ExitCode;

use bitpull::bt_client::btclient::{Args, BtClient};
use bitpull::bt_client::btclient_error::BtClientError;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), BtClientError> {
    let arguments: Vec<String> = env::args().skip(1).collect();
    let args = Args::parse(&arguments)?;
    let client = BtClient::init(args)?;
    client.run()
}
