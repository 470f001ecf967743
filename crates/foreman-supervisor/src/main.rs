//! Foreman: goal-driven build supervisor.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use foreman_core::{Goal, WorkerId};
use foreman_process::CommandLauncher;
use foreman_supervisor::{report, Supervisor, SupervisorConfig};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Drive the build workers toward a goal.
#[derive(Parser, Debug)]
#[command(name = "foreman", about = "Goal-driven build supervisor")]
struct Args {
    /// Goal to pursue: watch, lint, test, build or serve
    #[arg(long, default_value = "watch")]
    goal: Goal,

    /// Program launched for every worker (the worker name is appended)
    #[arg(long, default_value = "foreman-worker")]
    worker_program: String,

    /// Extra argument passed to the worker program (repeatable)
    #[arg(long = "worker-arg", allow_hyphen_values = true)]
    worker_args: Vec<String>,

    /// Seconds to wait for a worker to become ready (0 waits forever)
    #[arg(long, default_value = "60")]
    readiness_timeout_secs: u64,

    /// Supervise only these workers (repeatable)
    #[arg(long = "only")]
    only: Vec<WorkerId>,
}

impl Args {
    fn config(&self) -> SupervisorConfig {
        let defaults = SupervisorConfig::default();
        SupervisorConfig {
            worker_program: self.worker_program.clone(),
            worker_args: self.worker_args.clone(),
            readiness_timeout: match self.readiness_timeout_secs {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
            ..defaults
        }
        .only(&self.only)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = args.config();
    let launcher = config
        .worker_args
        .iter()
        .fold(CommandLauncher::new(&config.worker_program), |launcher, arg| {
            launcher.with_arg(arg.clone())
        });

    info!(
        goal = %args.goal,
        worker_program = %config.worker_program,
        workers = config.workers.len(),
        "Starting foreman"
    );

    let long_running = config
        .workers_for(args.goal)
        .iter()
        .any(WorkerId::is_long_running);

    let mut supervisor = Supervisor::new(config, Arc::new(launcher));
    supervisor.start()?;
    supervisor.foreman().set_goal(args.goal);

    let outcome = if long_running {
        info!("Running until interrupted (ctrl-c)");
        tokio::signal::ctrl_c().await?;
        Ok(())
    } else {
        tokio::select! {
            result = supervisor.wait_for_goal(args.goal) => result,
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("Interrupted");
                Ok(())
            }
        }
    };

    let store = supervisor.store().clone();
    supervisor.shutdown().await;
    print!("{}", report::render(&store.snapshot()));

    if let Err(e) = &outcome {
        error!(error = %e, "Goal not reached");
    }
    outcome?;
    Ok(())
}
