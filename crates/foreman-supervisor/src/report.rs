//! Plain-text status report of the supervised workers.

use std::fmt::Write;

use foreman_core::WorkerStatus;

use crate::store::Snapshot;

const STATUSES: [WorkerStatus; 6] = [
    WorkerStatus::Offline,
    WorkerStatus::Busy,
    WorkerStatus::Ready,
    WorkerStatus::Done,
    WorkerStatus::Error,
    WorkerStatus::Stop,
];

/// Render the goal, a count of workers by status, and one line per worker.
pub fn render(snapshot: &Snapshot) -> String {
    let mut output = String::new();

    match snapshot.goal {
        Some(goal) => writeln!(output, "goal: {goal}").ok(),
        None => writeln!(output, "goal: (none)").ok(),
    };

    let counts: Vec<String> = STATUSES
        .iter()
        .map(|status| {
            let count = snapshot
                .registry
                .iter()
                .filter(|worker| worker.status == *status)
                .count();
            format!("{status}={count}")
        })
        .collect();
    writeln!(output, "workers: {}", counts.join(" ")).ok();

    for worker in snapshot.registry.iter() {
        write!(output, "  {:<12} {}", worker.name(), worker.status).ok();
        if let Some(error) = &worker.error {
            write!(output, " ({error})").ok();
        }
        output.push('\n');
    }

    output
}
