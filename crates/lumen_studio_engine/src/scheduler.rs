// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation scheduling, synchronous or through the background worker.
//!
//! Plans flagged continuous (playback already owns the timing loop) run
//! inline on the calling thread. Everything else goes to the single
//! background worker; a request arriving while a task runs is dropped.
//! The worker locks the shared project for the duration of a plan, which
//! makes the single-writer discipline an enforced invariant rather than a
//! call-site convention. Completion crosses back to the owner thread
//! through the notifier channel only.

use crate::eval::{EvalError, InterruptFlag};
use crate::event::EventMask;
use crate::notifier::Notifier;
use crate::project::Project;
use lumen_studio_graph::NodeId;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc::unbounded_channel;

/// Why an evaluation was requested
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalReason {
    /// A node was added
    NodeAdded,
    /// A node was removed
    NodeRemoved,
    /// A node was selected
    NodeSelected,
    /// A parameter changed
    ParameterChanged,
    /// Graph topology changed
    GraphChanged,
    /// The time cursor moved
    TimeChanged,
    /// A file was opened
    FileOpened,
    /// A render was requested
    RenderRequested,
    /// Continuous playback tick
    Playback,
}

impl std::fmt::Display for EvalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::NodeAdded => "node added",
            Self::NodeRemoved => "node removed",
            Self::NodeSelected => "node selected",
            Self::ParameterChanged => "parameter changed",
            Self::GraphChanged => "graph changed",
            Self::TimeChanged => "time changed",
            Self::FileOpened => "file opened",
            Self::RenderRequested => "render requested",
            Self::Playback => "playback",
        };
        write!(f, "{name}")
    }
}

/// The scope of one evaluation pass
#[derive(Debug, Clone)]
pub struct Plan {
    /// Entities to evaluate, in order
    pub targets: Vec<NodeId>,
    /// Whether the pass is part of continuous playback
    pub continuous: bool,
    /// Why the pass was requested
    pub reason: EvalReason,
    /// Diagnostic message for logs
    pub message: String,
}

/// Builds and runs evaluation plans.
///
/// Callers must not hold the project lock while requesting or submitting;
/// both paths take it themselves.
pub struct Scheduler {
    tx: tokio::sync::mpsc::UnboundedSender<Plan>,
    task_running: Arc<AtomicBool>,
    project: Arc<Mutex<Project>>,
    notifier: Notifier,
    interrupt: InterruptFlag,
}

impl Scheduler {
    /// Create a scheduler and spawn its worker thread
    pub fn new(
        project: Arc<Mutex<Project>>,
        notifier: Notifier,
        interrupt: InterruptFlag,
    ) -> Self {
        let (tx, mut rx) = unbounded_channel::<Plan>();
        let task_running = Arc::new(AtomicBool::new(false));

        let worker_project = Arc::clone(&project);
        let worker_notifier = notifier.clone();
        let worker_interrupt = interrupt.clone();
        let worker_flag = Arc::clone(&task_running);

        std::thread::spawn(move || {
            while let Some(plan) = rx.blocking_recv() {
                worker_notifier.task_started();
                run_plan(&worker_project, &plan, &worker_notifier, &worker_interrupt);
                // Notices first: once the flag reads idle, completion has
                // already been queued for the owner thread.
                worker_notifier.task_finished();
                worker_flag.store(false, Ordering::Release);
            }
        });

        Self {
            tx,
            task_running,
            project,
            notifier,
            interrupt,
        }
    }

    /// Whether the background worker is busy
    pub fn is_task_running(&self) -> bool {
        self.task_running.load(Ordering::Acquire)
    }

    /// Build a plan covering every entity, flagged continuous when the
    /// project is in playback
    pub fn plan(&self, reason: EvalReason, message: impl Into<String>) -> Plan {
        let project = self.project.lock();
        Plan {
            targets: project.entities(),
            continuous: project.playback,
            reason,
            message: message.into(),
        }
    }

    /// Build and submit a plan in one step
    pub fn request(&self, reason: EvalReason, message: impl Into<String>) {
        let plan = self.plan(reason, message);
        self.submit(plan);
    }

    /// Run a plan: inline when continuous, otherwise on the worker.
    ///
    /// A plan submitted while a task is already running is dropped.
    pub fn submit(&self, plan: Plan) {
        tracing::debug!("evaluation requested ({}): {}", plan.reason, plan.message);

        if plan.continuous {
            run_plan(&self.project, &plan, &self.notifier, &self.interrupt);
            return;
        }

        if self.task_running.swap(true, Ordering::AcqRel) {
            tracing::debug!("task in progress, dropping '{}'", plan.message);
            return;
        }

        let _ = self.tx.send(plan);
    }
}

fn run_plan(
    project: &Mutex<Project>,
    plan: &Plan,
    notifier: &Notifier,
    interrupt: &InterruptFlag,
) {
    interrupt.clear();
    let started = Instant::now();

    {
        let mut project = project.lock();
        for &entity in &plan.targets {
            match project.evaluate_entity(entity, interrupt) {
                Ok(()) => {}
                Err(EvalError::Interrupted) => {
                    tracing::info!("evaluation interrupted ({})", plan.message);
                    break;
                }
                Err(err) => tracing::warn!("evaluation failed: {err}"),
            }
        }
    }

    tracing::debug!(
        "evaluation '{}' finished in {:.2?}",
        plan.message,
        started.elapsed()
    );
    notifier.notify(EventMask::IMAGE | EventMask::PROCESSED);
}
