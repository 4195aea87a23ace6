//! Generic driver stepping a collector format through its nodes.
//!
//! A node is one unit of collection (a group, a bracket stage). For each node
//! the driver walks `LocateEntry -> AtGroupDetail -> Recorded -> AtGroupList`,
//! with `Recovering` looping back to `LocateEntry` after an ambiguous screen.

use std::fmt;
use std::time::Instant;

use tracing::{error, info, warn};

use super::navigator::{Navigator, StepError, StepResult};
use super::state::CollectorState;
use crate::config::RecoveryConfig;
use crate::error::CollectorError;

/// Per-format navigation and collection logic.
pub trait CollectorFormat {
    type Node: Copy + fmt::Display + fmt::Debug + PartialEq;
    type Record;

    fn name(&self) -> &'static str;

    /// Nodes collected when the caller names none.
    fn default_nodes(&self) -> Vec<Self::Node>;

    /// Rejects nodes the format cannot collect. Called for every node before
    /// the first click.
    fn validate(&self, node: &Self::Node) -> Result<(), CollectorError>;

    /// Navigates to the node and waits for its anchor.
    fn locate_entry(&mut self, nav: &mut Navigator, node: &Self::Node) -> StepResult<()>;

    fn collect(&mut self, nav: &mut Navigator, node: &Self::Node) -> StepResult<Self::Record>;

    /// Leaves the node's detail screen once its record is persisted.
    fn return_to_list(&mut self, nav: &mut Navigator, node: &Self::Node) -> StepResult<()>;

    /// Closes whatever overlay an interrupted node left open.
    fn recover(&mut self, nav: &mut Navigator, node: &Self::Node) -> StepResult<()> {
        self.return_to_list(nav, node)
    }

    /// Cleans up after the node's entry failed and the node is skipped.
    fn abandon_entry(&mut self, nav: &mut Navigator, node: &Self::Node) -> StepResult<()> {
        self.recover(nav, node)
    }
}

/// I/O boundary for finalized records.
pub trait RecordSink<R> {
    fn persist(&mut self, record: &R) -> Result<(), CollectorError>;
}

impl<R, F> RecordSink<R> for F
where
    F: FnMut(&R) -> Result<(), CollectorError>,
{
    fn persist(&mut self, record: &R) -> Result<(), CollectorError> {
        self(record)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    NavigationFailed(String),
    StageIncomplete(String),
    PersistFailed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NavigationFailed(msg) => write!(f, "navigation failed: {}", msg),
            SkipReason::StageIncomplete(msg) => write!(f, "stage incomplete: {}", msg),
            SkipReason::PersistFailed(msg) => write!(f, "persist failed: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Completed,
    Interrupted { processed: usize, total: usize },
    Aborted { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub format: String,
    /// Nodes whose record reached the sink, in collection order
    pub finalized: Vec<String>,
    pub skipped: Vec<(String, SkipReason)>,
    pub outcome: RunOutcome,
}

impl RunReport {
    pub fn summary(&self) -> String {
        let outcome = match &self.outcome {
            RunOutcome::Completed => "completed".to_string(),
            RunOutcome::Interrupted { processed, total } => {
                format!("interrupted after {}/{}", processed, total)
            }
            RunOutcome::Aborted { reason } => format!("aborted ({})", reason),
        };
        format!(
            "{}: {}, {} finalized, {} skipped",
            self.format,
            outcome,
            self.finalized.len(),
            self.skipped.len()
        )
    }
}

/// Records collected by one run plus its report.
pub struct CollectionRun<R> {
    pub report: RunReport,
    pub records: Vec<R>,
}

/// Keeps the first occurrence of every node.
pub fn dedup_nodes<N: PartialEq + Copy + fmt::Display>(nodes: &[N]) -> Vec<N> {
    let mut unique: Vec<N> = Vec::with_capacity(nodes.len());
    for node in nodes {
        if unique.contains(node) {
            warn!("Duplicate node {} dropped", node);
        } else {
            unique.push(*node);
        }
    }
    unique
}

pub struct CollectionRunner {
    recovery_attempts: u32,
}

impl CollectionRunner {
    pub fn new(recovery: &RecoveryConfig) -> Self {
        Self {
            recovery_attempts: recovery.attempts,
        }
    }

    /// Collects `nodes` (or the format's defaults when empty) in caller order.
    ///
    /// Invalid nodes are rejected before any navigation. Everything after that
    /// is reported through the returned `RunReport`.
    pub fn run<F, S>(
        &self,
        format: &mut F,
        nav: &mut Navigator,
        sink: &mut S,
        nodes: &[F::Node],
    ) -> Result<CollectionRun<F::Record>, CollectorError>
    where
        F: CollectorFormat,
        S: RecordSink<F::Record>,
    {
        for node in nodes {
            format.validate(node)?;
        }
        let nodes = if nodes.is_empty() {
            format.default_nodes()
        } else {
            dedup_nodes(nodes)
        };

        let start = Instant::now();
        info!(
            "Starting {} collection: {} nodes (Ctrl+Shift+Q to abort)",
            format.name(),
            nodes.len()
        );
        nav.enter(CollectorState::Idle);

        let mut ctx = RunContext {
            format,
            nav,
            sink,
            nodes,
            index: 0,
            attempts: 0,
            pending: None,
            finalized: Vec::new(),
            skipped: Vec::new(),
            records: Vec::new(),
            recovery_attempts: self.recovery_attempts,
        };
        while ctx.step() {}

        let outcome = match ctx.nav.state() {
            CollectorState::Aborted(reason) => RunOutcome::Aborted {
                reason: reason.clone(),
            },
            CollectorState::Interrupted => RunOutcome::Interrupted {
                processed: ctx.finalized.len() + ctx.skipped.len(),
                total: ctx.nodes.len(),
            },
            _ => RunOutcome::Completed,
        };
        let report = RunReport {
            format: ctx.format.name().to_string(),
            finalized: ctx.finalized,
            skipped: ctx.skipped,
            outcome,
        };
        info!(
            "{} in {:.1}s",
            report.summary(),
            start.elapsed().as_secs_f32()
        );
        Ok(CollectionRun {
            report,
            records: ctx.records,
        })
    }
}

struct RunContext<'a, F: CollectorFormat, S> {
    format: &'a mut F,
    nav: &'a mut Navigator,
    sink: &'a mut S,
    nodes: Vec<F::Node>,
    index: usize,
    /// Recovery attempts spent on the current node
    attempts: u32,
    pending: Option<F::Record>,
    finalized: Vec<String>,
    skipped: Vec<(String, SkipReason)>,
    records: Vec<F::Record>,
    recovery_attempts: u32,
}

impl<F: CollectorFormat, S: RecordSink<F::Record>> RunContext<'_, F, S> {
    fn node(&self) -> Option<F::Node> {
        self.nodes.get(self.index).copied()
    }

    /// Executes one state transition. Returns `false` once terminal.
    fn step(&mut self) -> bool {
        let state = self.nav.state().clone();
        if state.is_terminal() {
            return false;
        }
        // A collected record is persisted before an interrupt is honoured
        if state != CollectorState::Recorded && self.nav.checkpoint().is_err() {
            info!("Interrupt requested, stopping at {}", state);
            self.nav.enter(CollectorState::Interrupted);
            return false;
        }
        let Some(node) = self.node() else {
            self.nav.enter(CollectorState::Done);
            return false;
        };
        let position = format!("{}/{}", self.index + 1, self.nodes.len());

        match state {
            CollectorState::Idle => {
                self.nav.enter(CollectorState::LocateEntry);
            }

            CollectorState::LocateEntry => {
                info!("{} {} ({}): locating entry", self.format.name(), node, position);
                match self.format.locate_entry(self.nav, &node) {
                    Ok(()) => self.nav.enter(CollectorState::AtGroupDetail),
                    Err(e) => self.fail(node, e, true),
                }
            }

            CollectorState::AtGroupDetail
            | CollectorState::AtRoundDetail
            | CollectorState::AtCharacterOverlay => {
                info!("{} {} ({}): collecting", self.format.name(), node, position);
                match self.format.collect(self.nav, &node) {
                    Ok(record) => {
                        self.pending = Some(record);
                        self.nav.enter(CollectorState::Recorded);
                    }
                    Err(e) => self.fail(node, e, false),
                }
            }

            CollectorState::Recorded => {
                if let Some(record) = self.pending.take() {
                    match self.sink.persist(&record) {
                        Ok(()) => {
                            info!("{} {} ({}): recorded", self.format.name(), node, position);
                            self.finalized.push(node.to_string());
                        }
                        Err(e) => {
                            error!("Failed to persist {}: {}", node, e);
                            self.skipped
                                .push((node.to_string(), SkipReason::PersistFailed(e.to_string())));
                        }
                    }
                    self.records.push(record);
                }
                self.nav.enter(CollectorState::AtGroupList);
            }

            CollectorState::AtGroupList => match self.format.return_to_list(self.nav, &node) {
                Ok(()) => self.advance(),
                Err(e) => {
                    if self.settle_error(e, "returning to list") {
                        self.advance();
                    }
                }
            },

            CollectorState::Recovering => {
                warn!(
                    "{} {}: recovering (attempt {}/{})",
                    self.format.name(),
                    node,
                    self.attempts,
                    self.recovery_attempts
                );
                match self.format.recover(self.nav, &node) {
                    Ok(()) => self.nav.enter(CollectorState::LocateEntry),
                    Err(e) => {
                        let reason = SkipReason::StageIncomplete(e.to_string());
                        if self.settle_error(e, "recovering") {
                            self.skip(node, reason, false);
                        }
                    }
                }
            }

            CollectorState::Done | CollectorState::Interrupted | CollectorState::Aborted(_) => {
                return false;
            }
        }
        true
    }

    /// Moves to the next node, or `Done` after the last.
    fn advance(&mut self) {
        self.index += 1;
        self.attempts = 0;
        if self.index >= self.nodes.len() {
            self.nav.enter(CollectorState::Done);
        } else {
            self.nav.enter(CollectorState::LocateEntry);
        }
    }

    /// Applies the error policy to a failed entry or collection step.
    fn fail(&mut self, node: F::Node, error: StepError, during_entry: bool) {
        match error {
            StepError::Cancelled => {
                info!("Interrupted during {}", node);
                self.nav.enter(CollectorState::Interrupted);
            }
            StepError::Failed(e) if e.is_structural() => {
                error!("Aborting at {}: {}", node, e);
                self.nav.enter(CollectorState::Aborted(e.to_string()));
            }
            StepError::NotFound { .. } if during_entry => {
                warn!("{} skipped: {}", node, error);
                self.skip(node, SkipReason::NavigationFailed(error.to_string()), true);
            }
            StepError::NotFound { .. } | StepError::Ambiguous { .. } => {
                if self.attempts < self.recovery_attempts {
                    self.attempts += 1;
                    warn!("{}: {}", node, error);
                    self.nav.enter(CollectorState::Recovering);
                } else {
                    warn!("{} skipped after {} recoveries: {}", node, self.attempts, error);
                    self.skip(
                        node,
                        SkipReason::StageIncomplete(error.to_string()),
                        during_entry,
                    );
                }
            }
            StepError::Failed(e) => {
                warn!("{} skipped: {}", node, e);
                self.skip(node, SkipReason::NavigationFailed(e.to_string()), during_entry);
            }
        }
    }

    /// Records a skip, cleans up and moves on.
    fn skip(&mut self, node: F::Node, reason: SkipReason, during_entry: bool) {
        self.skipped.push((node.to_string(), reason));
        let cleanup = if during_entry {
            self.format.abandon_entry(self.nav, &node)
        } else {
            self.format.recover(self.nav, &node)
        };
        match cleanup {
            Ok(()) => self.advance(),
            Err(e) => {
                if self.settle_error(e, "closing overlays") {
                    self.advance();
                }
            }
        }
    }

    /// Terminal errors end the run; anything else is logged. Returns `true`
    /// when the run can continue.
    fn settle_error(&mut self, error: StepError, during: &str) -> bool {
        match error {
            StepError::Cancelled => {
                self.nav.enter(CollectorState::Interrupted);
                false
            }
            StepError::Failed(e) if e.is_structural() => {
                error!("Aborting while {}: {}", during, e);
                self.nav.enter(CollectorState::Aborted(e.to_string()));
                false
            }
            other => {
                warn!("Ignoring failure while {}: {}", during, other);
                true
            }
        }
    }
}
