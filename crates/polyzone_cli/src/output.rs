//! JSON response envelopes written to stdout.

use polyzone_core::{ErrorKind, RegistryError};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: ErrorKind,
    message: String,
    retryable: bool,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Envelope<T: Serialize> {
    Success { ok: bool, data: T },
    Failure { ok: bool, error: ErrorBody },
}

/// Prints the outcome and returns the process exit code.
pub fn emit<T: Serialize>(result: Result<T, RegistryError>) -> i32 {
    let (envelope, code) = match result {
        Ok(data) => (Envelope::Success { ok: true, data }, 0),
        Err(err) => (
            Envelope::Failure {
                ok: false,
                error: ErrorBody {
                    kind: err.kind(),
                    message: err.to_string(),
                    retryable: err.is_retryable(),
                },
            },
            1,
        ),
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("Error: failed to encode response: {err}");
            return 2;
        }
    }
    code
}
