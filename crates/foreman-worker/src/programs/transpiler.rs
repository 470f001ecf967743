//! Transpiler: one transpile run per `Transpile` command.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use foreman_core::Action;
use tracing::{debug, info};

use crate::error::LeafError;
use crate::facilities::{matches_pattern, Glob, Transpile, TranspileRequest};
use crate::runtime::{Outbox, Program};

/// Where sources are found and where output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileSettings {
    pub pattern: String,
    pub base_dir: PathBuf,
    pub out_dir: PathBuf,
    pub source_maps: bool,
}

/// Transpile the files matching the pattern, or only `path` when given
/// and matching, then publish `TranspileDone` and `WorkerDone`.
pub async fn transpile_once(
    glob: &dyn Glob,
    transpiler: &dyn Transpile,
    settings: &TranspileSettings,
    path: Option<&str>,
    out: &Outbox,
) -> Result<(), LeafError> {
    let filenames = match path {
        Some(path) => {
            if matches_pattern(&settings.pattern, path)? {
                vec![path.to_string()]
            } else {
                debug!(path = %path, pattern = %settings.pattern, "Changed file not transpiled");
                Vec::new()
            }
        }
        None => glob.glob(&settings.pattern)?,
    };

    let files = if filenames.is_empty() {
        info!(pattern = %settings.pattern, "No files to transpile");
        Vec::new()
    } else {
        let request = TranspileRequest {
            base_dir: settings.base_dir.clone(),
            filenames,
            out_dir: settings.out_dir.clone(),
            source_maps: settings.source_maps,
        };
        info!(files = request.filenames.len(), out_dir = %request.out_dir.display(), "Transpiling");
        transpiler.transpile(&request).await?
    };

    out.send(Action::TranspileDone { files })?;
    out.done()
}

pub struct Transpiler {
    glob: Arc<dyn Glob>,
    transpiler: Arc<dyn Transpile>,
    settings: TranspileSettings,
}

impl Transpiler {
    pub fn new(
        glob: Arc<dyn Glob>,
        transpiler: Arc<dyn Transpile>,
        settings: TranspileSettings,
    ) -> Self {
        Self {
            glob,
            transpiler,
            settings,
        }
    }
}

#[async_trait]
impl Program for Transpiler {
    fn accepts(&self, action: &Action) -> bool {
        match action {
            Action::Transpile { path: None } => true,
            // An invalid pattern is accepted so the error gets reported
            Action::Transpile { path: Some(path) } => {
                matches_pattern(&self.settings.pattern, path).unwrap_or(true)
            }
            _ => false,
        }
    }

    async fn handle(&mut self, command: Action, out: &Outbox) -> Result<(), LeafError> {
        let path = match &command {
            Action::Transpile { path } => path.as_deref(),
            _ => None,
        };
        transpile_once(
            self.glob.as_ref(),
            self.transpiler.as_ref(),
            &self.settings,
            path,
            out,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foreman_core::WorkerId;
    use std::sync::Mutex;

    struct FakeGlob {
        expected: &'static str,
        paths: Vec<&'static str>,
    }

    impl Glob for FakeGlob {
        fn glob(&self, pattern: &str) -> Result<Vec<String>, LeafError> {
            assert_eq!(pattern, self.expected);
            Ok(self.paths.iter().map(|p| p.to_string()).collect())
        }
    }

    #[derive(Default)]
    struct FakeTranspile {
        requests: Mutex<Vec<TranspileRequest>>,
        fail: bool,
    }

    #[async_trait]
    impl Transpile for FakeTranspile {
        async fn transpile(&self, request: &TranspileRequest) -> Result<Vec<String>, LeafError> {
            self.requests.lock().unwrap().push(request.clone());
            if self.fail {
                return Err(LeafError::ToolFailed {
                    tool: "babel".to_string(),
                    code: Some(1),
                });
            }
            Ok(request.outputs())
        }
    }

    fn settings() -> TranspileSettings {
        TranspileSettings {
            pattern: "src/**/*.js?(x)".to_string(),
            base_dir: PathBuf::from("src"),
            out_dir: PathBuf::from("build"),
            source_maps: true,
        }
    }

    fn glob() -> FakeGlob {
        FakeGlob {
            expected: "src/**/*.js?(x)",
            paths: vec!["src/spike.js", "src/lee.js"],
        }
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<Action>) -> Vec<Action> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_transpile_once() {
        let transpile = FakeTranspile::default();
        let (out, mut rx) = Outbox::channel(WorkerId::Transpiler);

        transpile_once(&glob(), &transpile, &settings(), None, &out)
            .await
            .unwrap();

        assert_eq!(
            *transpile.requests.lock().unwrap(),
            vec![TranspileRequest {
                base_dir: PathBuf::from("src"),
                filenames: vec!["src/spike.js".to_string(), "src/lee.js".to_string()],
                out_dir: PathBuf::from("build"),
                source_maps: true,
            }]
        );
        assert_eq!(
            drain(&mut rx),
            vec![
                Action::TranspileDone {
                    files: vec!["build/spike.js".to_string(), "build/lee.js".to_string()],
                },
                Action::WorkerDone {
                    worker: WorkerId::Transpiler
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_single_changed_file() {
        let transpile = FakeTranspile::default();
        let (out, mut rx) = Outbox::channel(WorkerId::Transpiler);

        transpile_once(&glob(), &transpile, &settings(), Some("src/app.jsx"), &out)
            .await
            .unwrap();

        let requests = transpile.requests.lock().unwrap();
        assert_eq!(requests[0].filenames, vec!["src/app.jsx"]);
        assert_eq!(
            drain(&mut rx)[0],
            Action::TranspileDone {
                files: vec!["build/app.js".to_string()]
            }
        );
    }

    #[tokio::test]
    async fn test_changed_file_outside_pattern_is_skipped() {
        let transpile = FakeTranspile::default();
        let (out, mut rx) = Outbox::channel(WorkerId::Transpiler);

        transpile_once(&glob(), &transpile, &settings(), Some("src/styles.css"), &out)
            .await
            .unwrap();

        assert!(transpile.requests.lock().unwrap().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![
                Action::TranspileDone { files: vec![] },
                Action::WorkerDone {
                    worker: WorkerId::Transpiler
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_to_transpile() {
        let transpile = FakeTranspile::default();
        let empty = FakeGlob {
            expected: "src/**/*.js?(x)",
            paths: vec![],
        };
        let (out, mut rx) = Outbox::channel(WorkerId::Transpiler);

        transpile_once(&empty, &transpile, &settings(), None, &out)
            .await
            .unwrap();

        assert!(transpile.requests.lock().unwrap().is_empty());
        assert_eq!(
            drain(&mut rx),
            vec![
                Action::TranspileDone { files: vec![] },
                Action::WorkerDone {
                    worker: WorkerId::Transpiler
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_failure_publishes_nothing() {
        let transpile = FakeTranspile {
            fail: true,
            ..Default::default()
        };
        let (out, mut rx) = Outbox::channel(WorkerId::Transpiler);

        let result = transpile_once(&glob(), &transpile, &settings(), None, &out).await;
        assert!(matches!(result, Err(LeafError::ToolFailed { .. })));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_accepts_transpile_only() {
        let program = Transpiler::new(
            Arc::new(glob()),
            Arc::new(FakeTranspile::default()),
            settings(),
        );
        assert!(program.accepts(&Action::Transpile { path: None }));
        assert!(program.accepts(&Action::Transpile {
            path: Some("src/lib/app.jsx".to_string())
        }));
        assert!(!program.accepts(&Action::Transpile {
            path: Some("src/styles.css".to_string())
        }));
        assert!(!program.accepts(&Action::Lint));
    }
}
