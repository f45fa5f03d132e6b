//! FTP upload task: reads pipeline inputs, uploads the matched files and
//! reports a single result back to the agent.

pub mod inputs;
pub mod logging;

use ftpup_core::upload::{self, FtpConnector, SessionConnector, UploadReport, UploadResult};
use inputs::PipelineInputs;

pub use ftpup_core::upload::{UploadError, UploadErrorKind};

/// Read inputs through `lookup` and run the upload with `connector`.
pub async fn run_with<F, C>(lookup: F, connector: C) -> UploadResult<UploadReport>
where
    F: Fn(&str) -> Option<String>,
    C: SessionConnector,
{
    upload_inputs(PipelineInputs::from_lookup(lookup)?, connector).await
}

/// Run against the process environment and a real FTP server.
pub async fn run() -> UploadResult<UploadReport> {
    upload_inputs(PipelineInputs::from_env()?, FtpConnector).await
}

async fn upload_inputs<C: SessionConnector>(
    inputs: PipelineInputs,
    connector: C,
) -> UploadResult<UploadReport> {
    let request = inputs.into_request()?;
    upload::run_upload(&request, connector).await
}

/// The single line-oriented message shown for the run's outcome.
pub fn terminal_message(outcome: &UploadResult<UploadReport>) -> String {
    match outcome {
        Ok(report) => report.to_string(),
        Err(err) => err.message.clone(),
    }
}

/// Agent logging command closing the task with the run's outcome.
pub fn completion_command(outcome: &UploadResult<UploadReport>) -> String {
    match outcome {
        Ok(_) => "##vso[task.complete result=Succeeded;]Ftp upload successful".to_string(),
        Err(err) => format!(
            "##vso[task.complete result=Failed;]{}",
            err.message.replace('\r', "%0D").replace('\n', "%0A")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_command_escapes_newlines() {
        let outcome: UploadResult<UploadReport> =
            Err(UploadError::transport("Unable to upload file: a\nb"));
        assert_eq!(
            completion_command(&outcome),
            "##vso[task.complete result=Failed;]Unable to upload file: a%0Ab"
        );
    }

    #[test]
    fn terminal_message_is_summary_or_error() {
        let failed: UploadResult<UploadReport> =
            Err(UploadError::configuration("Input required: rootFolder"));
        assert_eq!(terminal_message(&failed), "Input required: rootFolder");

        let ok = Ok(UploadReport {
            host: "h".into(),
            remote_path: "/site".into(),
            directories_created: 1,
            files_uploaded: 2,
            bytes_uploaded: 3,
        });
        assert!(terminal_message(&ok).starts_with("Ftp upload successful\nhost: h"));
    }

    #[test]
    fn success_command() {
        let outcome = Ok(UploadReport {
            host: "h".into(),
            remote_path: "/".into(),
            directories_created: 0,
            files_uploaded: 0,
            bytes_uploaded: 0,
        });
        assert!(completion_command(&outcome).contains("result=Succeeded"));
    }
}
