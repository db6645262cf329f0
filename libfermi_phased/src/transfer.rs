use std::io::{Read, Write};
use std::net::TcpStream;
use std::path::Path;
use std::sync::mpsc::Sender;

use ssh2::Session;

use super::connection::ConnectionConfig;
use super::error::TransferError;
use super::templates::DONE_FLAG;
use super::upload_list::UploadList;
use super::worker_status::{TransferStage, TransferStatus};

const SCRIPT_MODE: i32 = 0o755;
const FILE_MODE: i32 = 0o644;

/// Output of a command run on the remote host
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

/// The two things the submission needs from a remote host: copy a file there, and run a
/// shell command.
pub trait RemoteShell {
    fn upload(&mut self, local: &Path, remote: &str) -> Result<(), TransferError>;
    fn execute(&mut self, command: &str) -> Result<CommandOutput, TransferError>;
}

/// An authenticated SSH session. The session is closed when this is dropped.
pub struct SshSession {
    session: Session,
    host: String,
}

impl SshSession {
    pub fn connect(config: &ConnectionConfig) -> Result<Self, TransferError> {
        let key_path = config.resolved_key_path();
        if !key_path.exists() {
            return Err(TransferError::BadKeyPath(key_path));
        }
        let tcp = TcpStream::connect((config.host.as_str(), config.port))?;
        let mut session = Session::new()?;
        session.set_tcp_stream(tcp);
        session.handshake()?;
        session.userauth_pubkey_file(&config.username, None, &key_path, None)?;
        log::info!("Connected to {} as {}", config.host, config.username);
        Ok(Self {
            session,
            host: config.host.clone(),
        })
    }
}

impl RemoteShell for SshSession {
    fn upload(&mut self, local: &Path, remote: &str) -> Result<(), TransferError> {
        let contents = std::fs::read(local)?;
        let mode = if local.extension().is_some_and(|e| e == "sh") {
            SCRIPT_MODE
        } else {
            FILE_MODE
        };
        let mut channel =
            self.session
                .scp_send(Path::new(remote), mode, contents.len() as u64, None)?;
        channel.write_all(&contents)?;
        channel.send_eof()?;
        channel.wait_eof()?;
        channel.close()?;
        channel.wait_close()?;
        Ok(())
    }

    fn execute(&mut self, command: &str) -> Result<CommandOutput, TransferError> {
        let mut channel = self.session.channel_session()?;
        channel.exec(command)?;
        let mut stdout = String::new();
        channel.read_to_string(&mut stdout)?;
        let mut stderr = String::new();
        channel.stderr().read_to_string(&mut stderr)?;
        channel.wait_close()?;
        Ok(CommandOutput {
            stdout,
            stderr,
            status: channel.exit_status()?,
        })
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        match self.session.disconnect(None, "Transfer finished", None) {
            Ok(()) => log::info!("Disconnected from {}", self.host),
            Err(e) => log::warn!("Failed to disconnect cleanly from {}: {e}", self.host),
        }
    }
}

/// Quote a string for a POSIX shell
pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// The command submitting every job script of a remote directory. Each `phase_<i>.sh`
/// job runs in `<i>/`, which is created first. Completion flags left by an earlier
/// run in the same directory are removed before anything is submitted, otherwise the
/// first bin to finish would count them and start the analysis early.
pub fn submission_command(remote_directory: &str) -> String {
    format!(
        r#"cd {} && rm -f */{DONE_FLAG} && for file in *.sh; do job="${{file%.sh}}"; mkdir -p "${{job#phase_}}"; echo "Submitting job: $file"; sbatch "$file"; done"#,
        shell_quote(remote_directory)
    )
}

fn run_checked<S: RemoteShell>(shell: &mut S, command: &str) -> Result<CommandOutput, TransferError> {
    let output = shell.execute(command)?;
    if !output.stdout.is_empty() {
        log::info!("{}", output.stdout.trim_end());
    }
    if !output.stderr.is_empty() {
        log::warn!("{}", output.stderr.trim_end());
    }
    if output.status != 0 {
        return Err(TransferError::RemoteCommandFailed {
            status: output.status,
            stderr: output.stderr,
        });
    }
    Ok(output)
}

/// Upload a generated job directory and submit its scripts.
///
/// Best effort: the first failure aborts whatever is left, and files already uploaded
/// stay on the cluster.
pub fn upload_and_submit<S: RemoteShell>(
    shell: &mut S,
    local_directory: &Path,
    remote_directory: &str,
    tx: &Sender<TransferStatus>,
) -> Result<CommandOutput, TransferError> {
    let upload_list = UploadList::new(local_directory, remote_directory)?;
    let total_size = upload_list.get_total_data_size();
    log::info!(
        "Uploading {} files with total size: {}",
        upload_list.upload_meta().len(),
        human_bytes::human_bytes(total_size as f64)
    );

    run_checked(
        shell,
        &format!("mkdir -p {}", shell_quote(remote_directory)),
    )?;

    let mut uploaded: u64 = 0;
    tx.send(TransferStatus::new(0.0, TransferStage::Uploading, ""))?;
    for (src, dst, size) in upload_list.upload_meta() {
        shell.upload(src, dst)?;
        uploaded += size;
        let name = src.file_name().unwrap_or_default().to_string_lossy();
        log::info!("Uploaded: {name} -> {remote_directory}");
        tx.send(TransferStatus::new(
            uploaded as f32 / total_size.max(1) as f32,
            TransferStage::Uploading,
            &name,
        ))?;
    }

    tx.send(TransferStatus::new(
        1.0,
        TransferStage::Submitting,
        remote_directory,
    ))?;
    let output = run_checked(shell, &submission_command(remote_directory))?;
    log::info!("All scripts uploaded and submitted from {remote_directory}");
    Ok(output)
}
