use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match greppy_cli::main_entry().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
