//! External facilities used by the leaf programs: file globbing, the
//! transpiler CLI and generic tool commands.
//!
//! Each facility is a trait so programs can be driven by fakes in tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::ToolCommand;
use crate::error::LeafError;

/// Pattern to ordered list of matching paths.
pub trait Glob: Send + Sync {
    fn glob(&self, pattern: &str) -> Result<Vec<String>, LeafError>;
}

/// Filesystem glob with support for `?(a|b)` optional groups.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsGlob;

impl Glob for FsGlob {
    fn glob(&self, pattern: &str) -> Result<Vec<String>, LeafError> {
        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for expanded in expand_optional_groups(pattern) {
            let entries = glob::glob(&expanded).map_err(|e| LeafError::Pattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })?;
            for entry in entries {
                let path = entry?.to_string_lossy().into_owned();
                if seen.insert(path.clone()) {
                    paths.push(path);
                }
            }
        }
        debug!(pattern = %pattern, matches = paths.len(), "Globbed");
        Ok(paths)
    }
}

/// Returns true if `path` matches `pattern`, optional groups included.
pub fn matches_pattern(pattern: &str, path: &str) -> Result<bool, LeafError> {
    for expanded in expand_optional_groups(pattern) {
        let compiled = glob::Pattern::new(&expanded).map_err(|e| LeafError::Pattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        if compiled.matches(path) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Expand every `?(a|b)` group into the alternatives "", "a" and "b".
pub fn expand_optional_groups(pattern: &str) -> Vec<String> {
    let Some(start) = pattern.find("?(") else {
        return vec![pattern.to_string()];
    };
    let Some(len) = pattern[start..].find(')') else {
        return vec![pattern.to_string()];
    };
    let end = start + len;
    let prefix = &pattern[..start];
    let rest = &pattern[end + 1..];

    std::iter::once("")
        .chain(pattern[start + 2..end].split('|'))
        .flat_map(|alternative| {
            expand_optional_groups(rest)
                .into_iter()
                .map(move |tail| format!("{prefix}{alternative}{tail}"))
        })
        .collect()
}

/// Inputs of one transpile run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileRequest {
    pub base_dir: PathBuf,
    pub filenames: Vec<String>,
    pub out_dir: PathBuf,
    pub source_maps: bool,
}

impl TranspileRequest {
    /// Files the run produces: inputs rebased from `base_dir` onto
    /// `out_dir`, with a `.js` extension.
    pub fn outputs(&self) -> Vec<String> {
        self.filenames
            .iter()
            .map(|name| {
                let path = Path::new(name);
                let relative = path
                    .strip_prefix(&self.base_dir)
                    .ok()
                    .or_else(|| path.file_name().map(Path::new))
                    .unwrap_or(path);
                self.out_dir
                    .join(relative)
                    .with_extension("js")
                    .to_string_lossy()
                    .into_owned()
            })
            .collect()
    }
}

/// Turns source files into output files.
#[async_trait]
pub trait Transpile: Send + Sync {
    /// Transpile the request; returns the files written.
    async fn transpile(&self, request: &TranspileRequest) -> Result<Vec<String>, LeafError>;
}

/// Runs one external command and reports its success.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    async fn run(&self, tool: &ToolCommand) -> Result<(), LeafError>;
}

/// Runs tools as child processes. Their output goes to our stderr, since
/// stdout carries the protocol.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(tool: &ToolCommand) -> Command {
        let mut cmd = Command::new(&tool.program);
        cmd.args(&tool.args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(std::io::stderr()))
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        cmd
    }

    /// Spawn a tool without waiting for it.
    pub fn spawn(tool: &ToolCommand) -> Result<tokio::process::Child, LeafError> {
        Self::command(tool).spawn().map_err(|source| LeafError::Spawn {
            program: tool.program.clone(),
            source,
        })
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, tool: &ToolCommand) -> Result<(), LeafError> {
        info!(tool = %tool, "Running tool");
        let status = Self::spawn(tool)?.wait().await?;
        if status.success() {
            Ok(())
        } else {
            Err(LeafError::ToolFailed {
                tool: tool.to_string(),
                code: status.code(),
            })
        }
    }
}

/// Transpiles by invoking a CLI once per file as
/// `<command> <file> --out-file <output> [--source-maps]`, where the
/// output is the file rebased from the base directory onto the output
/// directory.
pub struct CommandTranspiler<R = ProcessRunner> {
    command: ToolCommand,
    runner: R,
}

impl CommandTranspiler {
    pub fn new(command: ToolCommand) -> Self {
        Self::with_runner(command, ProcessRunner)
    }
}

impl<R: ToolRunner> CommandTranspiler<R> {
    pub fn with_runner(command: ToolCommand, runner: R) -> Self {
        Self { command, runner }
    }

    fn invocation(&self, input: &str, output: &str, source_maps: bool) -> ToolCommand {
        let mut tool = self.command.clone();
        tool.args.push(input.to_string());
        tool.args.push("--out-file".to_string());
        tool.args.push(output.to_string());
        if source_maps {
            tool.args.push("--source-maps".to_string());
        }
        tool
    }
}

#[async_trait]
impl<R: ToolRunner> Transpile for CommandTranspiler<R> {
    async fn transpile(&self, request: &TranspileRequest) -> Result<Vec<String>, LeafError> {
        let outputs = request.outputs();
        for (input, output) in request.filenames.iter().zip(&outputs) {
            debug!(input = %input, output = %output, "Transpiling file");
            self.runner
                .run(&self.invocation(input, output, request.source_maps))
                .await?;
        }
        Ok(outputs)
    }
}
