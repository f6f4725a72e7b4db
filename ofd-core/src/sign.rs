//! Receipt signing.
//!
//! The OFD expects a CMS `SignedData` in DER with the receipt JSON embedded
//! and no certificates attached. Signing is delegated to the `openssl`
//! binary, which holds the merchant key material.
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("failed to start signer {program:?}: {source}")]
    Spawn {
        program: OsString,
        #[source]
        source: std::io::Error,
    },
    #[error("signer I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("signer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("signer produced no output")]
    EmptyOutput,
}

/// Turns an unsigned receipt document into the artifact the OFD accepts.
pub trait ReceiptSigner {
    /// # Errors
    /// Any failure is fatal for the run; nothing is submitted.
    fn sign(&self, document: &[u8]) -> Result<Vec<u8>, SigningError>;
}

impl<T: ReceiptSigner + ?Sized> ReceiptSigner for &T {
    fn sign(&self, document: &[u8]) -> Result<Vec<u8>, SigningError> {
        (**self).sign(document)
    }
}

/// `openssl cms -sign` with the merchant certificate and key.
///
/// # Examples
/// ```rust
/// use ofd_core::sign::OpensslCmsSigner;
///
/// let signer = OpensslCmsSigner::new("certificates/EZ000000000931.crt", "certificates/merchant.key");
/// let args: Vec<_> = signer.args().into_iter().map(|a| a.into_string().unwrap()).collect();
/// assert_eq!(&args[..4], ["cms", "-sign", "-nodetach", "-binary"]);
/// ```
#[derive(Debug, Clone)]
pub struct OpensslCmsSigner {
    program: PathBuf,
    cert_path: PathBuf,
    key_path: PathBuf,
}

impl OpensslCmsSigner {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            program: PathBuf::from("openssl"),
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        }
    }

    /// Use a specific `openssl` executable instead of the one on `PATH`.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn cert_path(&self) -> &Path {
        &self.cert_path
    }

    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    /// Arguments after the program name; input on stdin, DER on stdout.
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = [
            "cms", "-sign", "-nodetach", "-binary", "-text", "-outform", "der", "-nocerts",
        ]
        .into_iter()
        .map(OsString::from)
        .collect();
        args.push("-signer".into());
        args.push(self.cert_path.clone().into_os_string());
        args.push("-inkey".into());
        args.push(self.key_path.clone().into_os_string());
        args
    }
}

impl ReceiptSigner for OpensslCmsSigner {
    fn sign(&self, document: &[u8]) -> Result<Vec<u8>, SigningError> {
        tracing::debug!(
            program = %self.program.display(),
            cert = %self.cert_path.display(),
            bytes = document.len(),
            "signing receipt"
        );
        let mut child = Command::new(&self.program)
            .args(self.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SigningError::Spawn {
                program: self.program.clone().into_os_string(),
                source,
            })?;

        // Feed stdin from a separate thread so a full stdout pipe cannot stall us.
        let mut stdin = child.stdin.take().ok_or_else(|| {
            SigningError::Io(std::io::Error::other("signer stdin unavailable"))
        })?;
        let (output, written) = std::thread::scope(|scope| {
            let writer = scope.spawn(move || stdin.write_all(document));
            let output = child.wait_with_output();
            let written = writer
                .join()
                .unwrap_or_else(|_| Err(std::io::Error::other("signer stdin writer panicked")));
            (output, written)
        });
        let output = output?;

        // A signer that exits early closes its stdin; its status explains more than EPIPE.
        if !output.status.success() {
            return Err(SigningError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        written?;
        if output.stdout.is_empty() {
            return Err(SigningError::EmptyOutput);
        }
        Ok(output.stdout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_pass_cert_and_key_through() {
        let signer = OpensslCmsSigner::new("a.crt", "b.key");
        let args = signer.args();
        let tail: Vec<_> = args[args.len() - 4..].iter().cloned().collect();
        assert_eq!(tail, ["-signer", "a.crt", "-inkey", "b.key"].map(OsString::from));
        assert!(args.contains(&OsString::from("-nocerts")));
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let signer = OpensslCmsSigner::new("a.crt", "b.key")
            .with_program("/nonexistent/openssl-for-tests");
        let err = signer.sign(b"{}").unwrap_err();
        assert!(matches!(err, SigningError::Spawn { .. }));
    }
}
