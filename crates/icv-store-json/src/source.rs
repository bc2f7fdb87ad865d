//! Sample sources: a plain JSON file, or a file refreshed by an external
//! generator before every read.

use std::{path::PathBuf, process::Stdio, time::Duration};

use icv_core::{
  sample::{DateRange, RawSample, decode_samples},
  store::SampleSource,
};

use crate::{Error, Result, document};

const DATE_ARG: &str = "%Y-%m-%d";

/// Reads the samples document at `path`. A missing document is an error.
#[derive(Debug, Clone)]
pub struct FileSource {
  path: PathBuf,
}

impl FileSource {
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

  pub fn path(&self) -> &std::path::Path { &self.path }

  async fn read(&self) -> Result<Vec<RawSample>> {
    let value = document::read_required(&self.path).await?;
    let samples = decode_samples(value)?;
    tracing::debug!(path = %self.path.display(), records = samples.len(), "samples read");
    Ok(samples)
  }
}

impl SampleSource for FileSource {
  type Error = Error;

  async fn fetch(&self, _range: &DateRange) -> Result<Vec<RawSample>> { self.read().await }
}

/// Runs `program args.. <start> <end>` and then reads the document it wrote.
///
/// The dates are passed as `YYYY-MM-DD`. The child is killed if it outlives
/// `timeout`.
#[derive(Debug, Clone)]
pub struct CommandSource {
  program: String,
  args:    Vec<String>,
  timeout: Duration,
  output:  FileSource,
}

impl CommandSource {
  pub fn new(
    program: impl Into<String>,
    args: Vec<String>,
    timeout: Duration,
    output: FileSource,
  ) -> Self {
    Self { program: program.into(), args, timeout, output }
  }

  async fn run(&self, range: &DateRange) -> Result<()> {
    let start = range.start.format(DATE_ARG).to_string();
    let end = range.end.format(DATE_ARG).to_string();

    let mut command = tokio::process::Command::new(&self.program);
    command
      .args(&self.args)
      .arg(&start)
      .arg(&end)
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .kill_on_drop(true);

    tracing::info!(program = %self.program, %start, %end, "running sample generator");
    let output = tokio::time::timeout(self.timeout, command.output())
      .await
      .map_err(|_| Error::Timeout { program: self.program.clone(), after: self.timeout })?
      .map_err(|e| Error::Generator { program: self.program.clone(), detail: e.to_string() })?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr);
      let detail = match stderr.trim() {
        "" => output.status.to_string(),
        msg => format!("{}: {msg}", output.status),
      };
      tracing::warn!(program = %self.program, %detail, "sample generator failed");
      return Err(Error::Generator { program: self.program.clone(), detail });
    }
    Ok(())
  }
}

impl SampleSource for CommandSource {
  type Error = Error;

  async fn fetch(&self, range: &DateRange) -> Result<Vec<RawSample>> {
    self.run(range).await?;
    self.output.read().await
  }
}

/// The sample source selected by configuration.
#[derive(Debug, Clone)]
pub enum Samples {
  File(FileSource),
  Command(CommandSource),
}

impl SampleSource for Samples {
  type Error = Error;

  async fn fetch(&self, range: &DateRange) -> Result<Vec<RawSample>> {
    match self {
      Self::File(source) => source.fetch(range).await,
      Self::Command(source) => source.fetch(range).await,
    }
  }
}
