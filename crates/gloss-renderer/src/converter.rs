//! The external format converter.
//!
//! The converter is a black box: marked-up HTML in, LaTeX out. Nothing here
//! knows its document model; the sentinels are what tie its output back to
//! the highlights.

use gloss_common::ConverterConfig;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::ConverterError;

pub trait Converter {
    fn convert(&self, input: &str) -> impl Future<Output = Result<String, ConverterError>> + Send;
}

/// Runs a converter program with the input on stdin and reads its stdout.
///
/// The child is killed if the conversion future is dropped or times out.
#[derive(Debug, Clone)]
pub struct PandocConverter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Default for PandocConverter {
    fn default() -> Self {
        Self::from_config(&ConverterConfig::default())
    }
}

impl PandocConverter {
    pub fn from_config(config: &ConverterConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    /// A converter for `program` with no arguments and the default timeout.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: ConverterConfig::default().timeout(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, input: &str) -> Result<String, ConverterError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ConverterError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| ConverterError::Other("converter stdin was not captured".to_owned()))?;
        let write = async move {
            stdin.write_all(input.as_bytes()).await?;
            stdin.shutdown().await
        };

        // Feed stdin while draining stdout, or a large document deadlocks on
        // full pipes.
        let (written, output) = tokio::join!(write, child.wait_with_output());
        let output = output.map_err(|source| ConverterError::Io {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(ConverterError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        // Only matters if the program claimed success without reading it all.
        written.map_err(|source| ConverterError::Io {
            program: self.program.clone(),
            source,
        })?;

        String::from_utf8(output.stdout).map_err(|source| ConverterError::NonUtf8 {
            program: self.program.clone(),
            source,
        })
    }
}

impl Converter for PandocConverter {
    fn convert(&self, input: &str) -> impl Future<Output = Result<String, ConverterError>> + Send {
        async move {
            let started = std::time::Instant::now();
            let converted = tokio::time::timeout(self.timeout, self.run(input))
                .await
                .map_err(|_| ConverterError::Timeout {
                    program: self.program.clone(),
                    timeout: self.timeout,
                })??;
            tracing::debug!(
                program = %self.program,
                input_bytes = input.len(),
                output_bytes = converted.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "converter finished"
            );
            Ok(converted)
        }
    }
}

/// A converter backed by a plain function, for in-process transforms.
#[derive(Debug, Clone, Copy)]
pub struct FnConverter<F>(pub F);

impl<F> Converter for FnConverter<F>
where
    F: Fn(&str) -> Result<String, ConverterError> + Sync,
{
    fn convert(&self, input: &str) -> impl Future<Output = Result<String, ConverterError>> + Send {
        std::future::ready((self.0)(input))
    }
}
