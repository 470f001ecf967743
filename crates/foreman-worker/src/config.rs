//! Worker configuration.

use std::fmt;
use std::path::PathBuf;

/// An external program plus its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl ToolCommand {
    /// Split a command line on whitespace. Returns `None` if it is blank.
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace().map(str::to_string);
        let program = words.next()?;
        Some(Self {
            program,
            args: words.collect(),
        })
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Source directory, watched by the watcher and used as transpile base.
    pub src_dir: PathBuf,

    /// Directory transpiled files are written to.
    pub out_dir: PathBuf,

    /// Glob selecting the files to transpile; `?(a|b)` groups are allowed.
    pub pattern: String,

    /// Transpiler command; inputs and output flags are appended.
    pub transpiler: ToolCommand,

    /// Emit source maps next to transpiled files.
    pub source_maps: bool,

    pub lint: ToolCommand,
    pub test: ToolCommand,
    pub bundle: ToolCommand,

    /// Long-running development server.
    pub serve: ToolCommand,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            src_dir: PathBuf::from("src"),
            out_dir: PathBuf::from("build"),
            pattern: "src/**/*.js?(x)".to_string(),
            transpiler: command("babel"),
            source_maps: true,
            lint: command("eslint src"),
            test: command("npm test"),
            bundle: command("webpack"),
            serve: command("webpack-dev-server"),
        }
    }
}

fn command(line: &str) -> ToolCommand {
    ToolCommand::parse(line).unwrap_or_else(|| ToolCommand {
        program: line.to_string(),
        args: Vec::new(),
    })
}
