//! JSON envelope printed on stdout after every command, plus exit codes.

use deployment_helper::error::Hint;
use deployment_helper::{Error, ErrorCode, Result};
use serde::Serialize;
use serde_json::Value;
use std::io::{self, Write};

/// `{success, data}` on success, `{success, error}` on failure.
#[derive(Debug, Serialize)]
struct Envelope {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
    details: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    hints: Vec<Hint>,
}

impl Envelope {
    fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(ErrorBody {
                    code: err.code.as_str(),
                    message: err.message,
                    details: err.details,
                    hints: err.hints,
                }),
            },
        }
    }
}

pub fn print_json_result(result: Result<Value>) -> Result<()> {
    let payload = serde_json::to_string_pretty(&Envelope::from_result(result))
        .map_err(|e| Error::internal_json(e.to_string(), Some("serialize response".to_string())))?;

    match writeln!(io::stdout().lock(), "{}", payload) {
        Err(e) if e.kind() != io::ErrorKind::BrokenPipe => Err(Error::internal_io(
            e.to_string(),
            Some("write stdout".to_string()),
        )),
        _ => Ok(()),
    }
}

/// Serialize a command's data and pick the process exit code.
pub fn map_cmd_result_to_json<T: Serialize>(result: Result<(T, i32)>) -> (Result<Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(e) => (
                Err(Error::internal_json(e.to_string(), Some("serialize response".to_string()))),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingKey
        | ErrorCode::ConfigInvalidYaml
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationInvalidArgument
        | ErrorCode::ValidationInvalidJson => 2,

        ErrorCode::StateInvalid => 4,

        ErrorCode::ExecutionFailed => 20,

        ErrorCode::InternalIoError
        | ErrorCode::InternalJsonError
        | ErrorCode::InternalUnexpected => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deployment_helper::error::ExecutionFailedDetails;

    #[test]
    fn execution_failure_maps_to_exit_20_with_command() {
        let err = Error::execution_failed(ExecutionFailedDetails {
            command: "php bin/console -n plugin:refresh".to_string(),
            duration_ms: 12.5,
            exit_code: Some(1),
            timed_out: false,
        });

        let (result, code) = map_cmd_result_to_json::<()>(Err(err));
        assert_eq!(code, 20);

        let envelope = serde_json::to_value(Envelope::from_result(result)).unwrap();
        assert_eq!(envelope["success"], false);
        assert_eq!(envelope["error"]["code"], "execution.failed");
        assert_eq!(
            envelope["error"]["details"]["command"],
            "php bin/console -n plugin:refresh"
        );
        assert!(envelope.get("data").is_none());
    }

    #[test]
    fn success_wraps_data() {
        let (result, code) = map_cmd_result_to_json(Ok((serde_json::json!({"a": 1}), 0)));
        assert_eq!(code, 0);

        let envelope = serde_json::to_value(Envelope::from_result(result)).unwrap();
        assert_eq!(envelope["success"], true);
        assert_eq!(envelope["data"]["a"], 1);
        assert!(envelope.get("error").is_none());
    }

    #[test]
    fn hints_are_omitted_when_empty() {
        let err = Error::state_invalid("var/deployment-helper.json", "broken");
        let envelope = serde_json::to_value(Envelope::from_result(Err(err))).unwrap();
        assert!(envelope["error"].get("hints").is_none());
    }

    #[test]
    fn config_and_state_errors_have_distinct_codes() {
        assert_eq!(exit_code_for_error(ErrorCode::ConfigInvalidYaml), 2);
        assert_eq!(exit_code_for_error(ErrorCode::StateInvalid), 4);
        assert_eq!(exit_code_for_error(ErrorCode::InternalIoError), 1);
    }
}
