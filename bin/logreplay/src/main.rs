use clap::error::ErrorKind;
use libprotocol::SourceError;
use libruntime::{ConfigError, ReplayError};

fn main() {
    let code = match libcli::run() {
        Ok(outcome) => libcli::outcome_code(&outcome),
        Err(err) => {
            if let Some(clap_err) = err.downcast_ref::<clap::Error>() {
                let _ = clap_err.print();
                match clap_err.kind() {
                    ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                    _ => 3,
                }
            } else {
                eprintln!("error: {:#}", err);
                exit_code(&err)
            }
        }
    };
    std::process::exit(code);
}

/// 2 for input or output failures, 3 for bad configuration.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.downcast_ref::<ConfigError>().is_some() {
            return 3;
        }
        if let Some(SourceError::Format(_)) = cause.downcast_ref::<SourceError>() {
            return 3;
        }
        if let Some(re) = cause.downcast_ref::<ReplayError>() {
            return match re {
                ReplayError::Config(_) => 3,
                _ => 2,
            };
        }
    }
    2
}
