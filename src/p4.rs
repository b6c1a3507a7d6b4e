//! Perforce backend driven through the p4 command line client
//!
//! Spawns p4 directly so the usual P4PORT/P4USER/P4CLIENT environment
//! applies; explicit overrides from the config become global flags.

use anyhow::{bail, Context, Result};
use std::io::{BufRead, BufReader, Read};
use std::process::{Command, Stdio};

/// Receives progress text lines during a materialize call
pub trait ProgressSink {
    fn report(&mut self, line: &str);
}

impl<F: FnMut(&str)> ProgressSink for F {
    fn report(&mut self, line: &str) {
        self(line)
    }
}

/// Which revision source a range query reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    Labels,
    Changes,
}

impl QueryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryMode::Labels => "labels",
            QueryMode::Changes => "changes",
        }
    }

    pub fn from_str(s: &str) -> Option<QueryMode> {
        match s {
            "labels" => Some(QueryMode::Labels),
            "changes" => Some(QueryMode::Changes),
            _ => None,
        }
    }
}

/// One revision-history query: a depot path bounded by good and bad revisions
#[derive(Debug, Clone)]
pub struct RangeQuery {
    pub path: String,
    pub good: String,
    pub bad: String,
    pub mode: QueryMode,
}

/// Lists revisions in a range and materializes one into the workspace
pub trait Backend {
    /// Hand every revision record line for the query to `on_record`, in
    /// backend arrival order. Record order is not guaranteed; the catalog
    /// establishes the final ordering.
    fn list_revisions(&self, query: &RangeQuery, on_record: &mut dyn FnMut(&str)) -> Result<()>;

    /// Update the workspace to `path@identifier`, streaming progress lines
    /// to `progress` as they are produced. Blocking.
    fn materialize(
        &self,
        path: &str,
        identifier: &str,
        progress: &mut dyn ProgressSink,
    ) -> Result<()>;
}

/// Backend implementation shelling out to the p4 client
#[derive(Debug, Clone)]
pub struct P4Cli {
    bin: String,
    port: Option<String>,
    user: Option<String>,
    client: Option<String>,
}

impl P4Cli {
    pub fn new(
        bin: String,
        port: Option<String>,
        user: Option<String>,
        client: Option<String>,
    ) -> Self {
        Self {
            bin,
            port,
            user,
            client,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.bin);
        if let Some(port) = &self.port {
            cmd.arg("-p").arg(port);
        }
        if let Some(user) = &self.user {
            cmd.arg("-u").arg(user);
        }
        if let Some(client) = &self.client {
            cmd.arg("-c").arg(client);
        }
        cmd
    }

    /// Run one p4 command, feeding stdout lines to `on_line` as they arrive
    fn stream(&self, mut cmd: Command, what: &str, on_line: &mut dyn FnMut(&str)) -> Result<()> {
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .with_context(|| format!("Failed to run {}", self.bin))?;
        let stdout = child.stdout.take().context("Failed to capture p4 stdout")?;
        for line in BufReader::new(stdout).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            on_line(&line);
        }

        let mut stderr = String::new();
        if let Some(mut err) = child.stderr.take() {
            err.read_to_string(&mut stderr).ok();
        }
        let status = child.wait().context("Failed to wait for p4")?;
        if !status.success() {
            bail!("{} failed: {}", what, stderr.trim());
        }

        Ok(())
    }
}

impl Backend for P4Cli {
    fn list_revisions(&self, query: &RangeQuery, on_record: &mut dyn FnMut(&str)) -> Result<()> {
        let range = format!("{}@{},@{}", query.path, query.good, query.bad);
        let mut cmd = self.command();
        match query.mode {
            QueryMode::Labels => {
                cmd.arg("labels").arg(&range);
            }
            QueryMode::Changes => {
                cmd.arg("changes").arg("-s").arg("submitted").arg(&range);
            }
        }

        self.stream(cmd, &format!("p4 {}", query.mode.as_str()), on_record)
    }

    fn materialize(
        &self,
        path: &str,
        identifier: &str,
        progress: &mut dyn ProgressSink,
    ) -> Result<()> {
        let target = format!("{}@{}", path, identifier);
        let mut cmd = self.command();
        cmd.arg("sync").arg(&target);

        self.stream(cmd, "p4 sync", &mut |line| progress.report(line))
    }
}
