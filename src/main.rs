use ftp_upload_lib::{completion_command, logging, terminal_message};
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    let debug = logging::debug_requested(std::env::var("SYSTEM_DEBUG").ok().as_deref());
    logging::init(debug);

    let outcome = ftp_upload_lib::run().await;
    println!("{}", terminal_message(&outcome));
    println!("{}", completion_command(&outcome));

    if outcome.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
