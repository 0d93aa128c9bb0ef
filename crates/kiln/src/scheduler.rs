//! The cooperative emission scheduler.
//!
//! Jobs run one at a time in non-increasing priority order, and in
//! submission order within a priority. A job asking for an identifier which
//! is not bound yet is parked, its staged output discarded, and requeued
//! with its original position once the identifier is bound. When the queue
//! drains while jobs are still parked, the run fails with the chain of
//! instances waiting on each other.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use hashbrown::DefaultHashBuilder;

use indexmap::{IndexMap, IndexSet};

use crate::codegen::{Bindings, EmitContext, EmitError, JobFn, Transaction};
use crate::diagnostics::{Diagnostic, DiagnosticKind, Error, ErrorKind};
use crate::ir::IrNode;
use crate::manifest::Manifest;
use crate::registry::ComponentRegistry;
use crate::target::TargetProfile;
use crate::value::Path;

/// Standard emission priorities.
///
/// Only their order matters. A component may pick any other value.
pub mod priority {
    /// Target core setup.
    pub const CORE: f64 = 1000.0;
    /// Foundational buses.
    pub const BUS: f64 = 900.0;
    /// Clocks and networking.
    pub const NETWORK: f64 = 800.0;
    /// Generic components.
    pub const COMPONENT: f64 = 500.0;
    /// Sensors, switches, and outputs consuming buses.
    pub const CONSUMER: f64 = 100.0;
    /// Automations and triggers.
    pub const AUTOMATION: f64 = 10.0;
    /// Finalizers.
    pub const FINAL: f64 = 0.0;
}

/// The state of an emission job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Never ran.
    New,
    /// Running.
    Running,
    /// Completed and committed.
    Complete,
    /// Parked until the identifier with the given name is bound.
    Awaiting(String),
    /// Failed, or parked forever.
    Failed,
}

struct Job {
    seq: u64,
    priority: f64,
    label: String,
    origin: String,
    path: Path,
    run: JobFn,
    state: JobState,
}

struct Queued {
    priority: f64,
    seq: u64,
    job: usize,
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .total_cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Queued {}

// The instance declaring an identifier.
struct Owner {
    origin: String,
    path: Path,
}

/// The committed output of a scheduler run.
#[derive(Debug, Clone, PartialEq)]
pub struct Emission {
    /// The ordered statement stream.
    pub nodes: Vec<IrNode>,
    /// The build manifest.
    pub manifest: Manifest,
    /// Identifiers bound to their variables.
    pub bindings: Bindings,
}

/// Runs emission jobs.
pub struct Scheduler<'a> {
    registry: &'a ComponentRegistry,
    target: &'a TargetProfile,
    jobs: Vec<Job>,
    queue: BinaryHeap<Queued>,
    waiting: IndexMap<String, Vec<usize>, DefaultHashBuilder>,
    owners: IndexMap<String, Owner, DefaultHashBuilder>,
    next_seq: u64,
    emission: Emission,
}

impl<'a> Scheduler<'a> {
    /// Creates an empty [`Scheduler`].
    #[must_use]
    pub fn new(registry: &'a ComponentRegistry, target: &'a TargetProfile) -> Self {
        Self {
            registry,
            target,
            jobs: Vec::new(),
            queue: BinaryHeap::new(),
            waiting: IndexMap::with_hasher(DefaultHashBuilder::default()),
            owners: IndexMap::with_hasher(DefaultHashBuilder::default()),
            next_seq: 0,
            emission: Emission {
                nodes: Vec::new(),
                manifest: Manifest::new(),
                bindings: Bindings::default(),
            },
        }
    }

    /// Records the instance declaring an identifier, to explain waits which
    /// never end.
    pub fn declare(&mut self, name: &str, origin: &str, path: &Path) {
        let _ = self.owners.insert(
            name.to_string(),
            Owner {
                origin: origin.to_string(),
                path: path.clone(),
            },
        );
    }

    /// Submits a job of the instance `origin` found at `path`.
    pub fn push(&mut self, priority: f64, label: impl Into<String>, origin: &str, path: &Path, run: JobFn) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let job = self.jobs.len();
        self.jobs.push(Job {
            seq,
            priority,
            label: label.into(),
            origin: origin.to_string(),
            path: path.clone(),
            run,
            state: JobState::New,
        });
        self.queue.push(Queued { priority, seq, job });
    }

    /// Returns the state of every job in submission order.
    pub fn states(&self) -> impl Iterator<Item = (&str, &JobState)> {
        self.jobs.iter().map(|job| (job.label.as_str(), &job.state))
    }

    /// Drains the queue.
    ///
    /// # Errors
    ///
    /// Fails on the first job failure, or when jobs wait for identifiers
    /// which are never bound.
    pub fn run(&mut self) -> Result<(), Error> {
        while let Some(Queued { job: index, .. }) = self.queue.pop() {
            let job = &mut self.jobs[index];
            job.state = JobState::Running;
            tracing::debug!("Running `{}` at priority {}", job.label, job.priority);

            let run = job.run.clone();
            let mut cx = EmitContext::new(
                self.registry,
                self.target,
                &self.emission.bindings,
                self.emission.manifest.clone(),
                job.priority,
                job.origin.clone(),
                job.path.clone(),
            );
            let outcome = run(&mut cx);
            let transaction = cx.into_transaction();

            match outcome {
                Ok(()) => {
                    self.jobs[index].state = JobState::Complete;
                    self.commit(index, transaction);
                }
                Err(EmitError::Await(name)) => {
                    self.jobs[index].state = JobState::Awaiting(name.clone());
                    self.waiting.entry(name).or_default().push(index);
                }
                Err(EmitError::Fail(diagnostic)) => {
                    self.jobs[index].state = JobState::Failed;
                    return Err(self.failure(index, diagnostic));
                }
            }
        }

        if self.waiting.is_empty() {
            Ok(())
        } else {
            for indices in self.waiting.values() {
                for &index in indices {
                    self.jobs[index].state = JobState::Failed;
                }
            }
            Err(self.deadlock())
        }
    }

    /// Returns the committed output.
    #[must_use]
    pub fn into_emission(self) -> Emission {
        self.emission
    }

    fn commit(&mut self, index: usize, transaction: Transaction) {
        self.emission.nodes.extend(transaction.nodes);
        self.emission.manifest = transaction.manifest;

        for (name, variable) in transaction.bindings {
            if let Some(waiters) = self.waiting.shift_remove(&name) {
                for waiter in waiters {
                    let job = &self.jobs[waiter];
                    tracing::debug!("Resuming `{}` after ID '{name}' was bound", job.label);
                    self.queue.push(Queued {
                        priority: job.priority,
                        seq: job.seq,
                        job: waiter,
                    });
                }
            }
            let _ = self.emission.bindings.insert(name, variable);
        }

        let (origin, path) = {
            let parent = &self.jobs[index];
            (parent.origin.clone(), parent.path.clone())
        };
        for staged in transaction.jobs {
            self.push(staged.priority, staged.label, &origin, &path, staged.run);
        }
    }

    fn failure(&self, index: usize, diagnostic: Diagnostic) -> Error {
        let job = &self.jobs[index];
        tracing::debug!("`{}` failed: {diagnostic}", job.label);
        if diagnostic.kind == DiagnosticKind::Internal {
            return Error::internal(format!("{}: {}", diagnostic.path, diagnostic.message))
                .context(format!("while emitting {} at {}", job.label, job.path));
        }
        Error::with_diagnostics(
            ErrorKind::Emission,
            format!("Emission of `{}` failed", job.label),
            vec![diagnostic],
        )
    }

    // Follows the wait-for chain from the first parked job until it loops
    // or reaches an identifier nobody can bind.
    fn deadlock(&self) -> Error {
        let mut waits: IndexMap<Path, (&Job, &str), DefaultHashBuilder> =
            IndexMap::with_hasher(DefaultHashBuilder::default());
        for (name, indices) in &self.waiting {
            for &index in indices {
                let job = &self.jobs[index];
                let _ = waits.entry(job.path.clone()).or_insert((job, name.as_str()));
            }
        }

        let Some((start, _)) = waits.first() else {
            return Error::internal("no parked job to explain");
        };
        let mut current = start.clone();
        let mut chain: Vec<(&Job, &str)> = Vec::new();
        let mut visited: IndexSet<Path, DefaultHashBuilder> =
            IndexSet::with_hasher(DefaultHashBuilder::default());

        loop {
            if let Some(position) = visited.get_index_of(&current) {
                let cycle = &chain[position..];
                return self.cycle_error(cycle);
            }
            let _ = visited.insert(current.clone());

            let Some(&(job, name)) = waits.get(&current) else {
                return Error::internal(format!("no parked job at {current}"));
            };
            chain.push((job, name));

            let Some(owner) = self.owners.get(name) else {
                return Error::with_diagnostics(
                    ErrorKind::Emission,
                    "Emission never completed",
                    vec![Diagnostic::error(
                        DiagnosticKind::Emission,
                        job.path.clone(),
                        format!("`{}` waits for ID '{name}', which is never declared", job.origin),
                    )],
                );
            };
            if !waits.contains_key(&owner.path) {
                return Error::with_diagnostics(
                    ErrorKind::Emission,
                    "Emission never completed",
                    vec![Diagnostic::error(
                        DiagnosticKind::Emission,
                        job.path.clone(),
                        format!(
                            "`{}` waits for ID '{name}', declared by `{}` at {}, which never binds it",
                            job.origin, owner.origin, owner.path
                        ),
                    )],
                );
            }
            current = owner.path.clone();
        }
    }

    fn cycle_error(&self, cycle: &[(&Job, &str)]) -> Error {
        let mut message = String::from("Cyclic reference: ");
        for (i, (job, name)) in cycle.iter().enumerate() {
            if i == 0 {
                message.push_str(&format!("`{}` at {} waits for ID '{name}'", job.origin, job.path));
            } else {
                message.push_str(&format!(
                    ", declared by `{}` at {}, which waits for ID '{name}'",
                    job.origin, job.path
                ));
            }
        }
        if let Some((first, _)) = cycle.first() {
            message.push_str(&format!(", declared by `{}` at {}", first.origin, first.path));
        }

        let path = cycle.first().map_or_else(Path::root, |(job, _)| job.path.clone());
        tracing::debug!("{message}");
        Error::with_diagnostics(
            ErrorKind::Emission,
            "Emission never completed",
            vec![Diagnostic::error(DiagnosticKind::Emission, path, message)],
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use crate::codegen::{EmitContext, Emit, JobFn};
    use crate::diagnostics::ErrorKind;
    use crate::identifier::Identifier;
    use crate::ir::Expression;
    use crate::registry::ComponentRegistry;
    use crate::target::TargetProfile;
    use crate::types::{TypeRef, TypeRegistry};
    use crate::value::Path;

    use super::{JobState, Scheduler, priority};

    fn job<F>(run: F) -> JobFn
    where
        F: Fn(&mut EmitContext<'_>) -> Emit<()> + Send + Sync + 'static,
    {
        Arc::new(run)
    }

    // Waits for `waits_for` when set, then declares `declares`.
    fn declaring(ty: &TypeRef, declares: &'static str, waits_for: Option<&'static str>) -> JobFn {
        let ty = ty.clone();
        job(move |cx| {
            let mut args = Vec::new();
            if let Some(name) = waits_for {
                args.push(cx.get_variable(name)?);
            }
            let _ = cx.new_pvariable(&Identifier::manual(declares, ty.clone()), args)?;
            Ok(())
        })
    }

    fn rendered(scheduler: Scheduler<'_>) -> Vec<String> {
        scheduler
            .into_emission()
            .nodes
            .iter()
            .map(|node| node.statement.to_string())
            .collect()
    }

    fn setup() -> (ComponentRegistry, TargetProfile, TypeRef) {
        let types = TypeRegistry::new();
        let ty = types.namespace("demo").class_("Demo", &[]);
        (
            ComponentRegistry::new(types),
            TargetProfile::lookup("host").unwrap(),
            ty,
        )
    }

    #[test]
    fn priority_order() {
        let (registry, target, ty) = setup();
        let mut scheduler = Scheduler::new(&registry, &target);
        let root = Path::root();

        scheduler.push(priority::CONSUMER, "sensor", "sensor", &root, declaring(&ty, "sensor", None));
        scheduler.push(priority::BUS, "i2c", "i2c", &root, declaring(&ty, "bus", None));
        scheduler.push(priority::CONSUMER, "switch", "switch", &root, declaring(&ty, "relay", None));
        scheduler.push(priority::FINAL, "setup", "esphome", &root, job(|cx| {
            cx.add(cx.core().app().call("setup", Vec::new()));
            Ok(())
        }));
        scheduler.run().unwrap();

        assert_eq!(
            rendered(scheduler),
            [
                "demo::Demo *bus = new demo::Demo();",
                "demo::Demo *sensor = new demo::Demo();",
                "demo::Demo *relay = new demo::Demo();",
                "App.setup();",
            ]
        );
    }

    #[test]
    fn equal_priority_suspension() {
        let (registry, target, ty) = setup();
        let mut scheduler = Scheduler::new(&registry, &target);
        let root = Path::root();

        scheduler.push(priority::CONSUMER, "dew_point", "dew_point", &root, declaring(&ty, "dew", Some("temperature")));
        scheduler.push(priority::CONSUMER, "template", "template", &root, declaring(&ty, "temperature", None));
        scheduler.push(priority::AUTOMATION, "interval", "interval", &root, declaring(&ty, "tick", None));
        scheduler.run().unwrap();

        let states: Vec<JobState> = scheduler.states().map(|(_, state)| state.clone()).collect();
        assert_eq!(states, [JobState::Complete, JobState::Complete, JobState::Complete]);
        assert_eq!(
            rendered(scheduler),
            [
                "demo::Demo *temperature = new demo::Demo();",
                "demo::Demo *dew = new demo::Demo(temperature);",
                "demo::Demo *tick = new demo::Demo();",
            ]
        );
    }

    #[test]
    fn waiter_overtaken_by_lower_priority() {
        let (registry, target, ty) = setup();
        let mut scheduler = Scheduler::new(&registry, &target);
        let root = Path::root();

        scheduler.push(priority::BUS, "bus", "bus", &root, declaring(&ty, "bus", Some("clock")));
        scheduler.push(priority::COMPONENT, "clock", "clock", &root, declaring(&ty, "clock", None));
        scheduler.push(priority::COMPONENT, "other", "other", &root, declaring(&ty, "other", None));
        scheduler.run().unwrap();

        // The resumed bus job outranks the remaining component job.
        assert_eq!(
            rendered(scheduler),
            [
                "demo::Demo *clock = new demo::Demo();",
                "demo::Demo *bus = new demo::Demo(clock);",
                "demo::Demo *other = new demo::Demo();",
            ]
        );
    }

    #[test]
    fn staged_output_is_discarded_on_suspension() {
        let (registry, target, ty) = setup();
        let mut scheduler = Scheduler::new(&registry, &target);
        let root = Path::root();

        let consumer = ty.clone();
        scheduler.push(priority::CONSUMER, "consumer", "consumer", &root, job(move |cx| {
            cx.add_define("USE_CONSUMER", None)?;
            cx.comment("consumer");
            let bus = cx.get_variable("bus")?;
            let _ = cx.new_pvariable(&Identifier::manual("consumer", consumer.clone()), vec![bus])?;
            Ok(())
        }));
        scheduler.push(priority::FINAL, "bus", "bus", &root, declaring(&ty, "bus", None));
        scheduler.run().unwrap();

        let emission = scheduler.into_emission();
        let rendered: Vec<String> = emission.nodes.iter().map(|node| node.statement.to_string()).collect();
        assert_eq!(
            rendered,
            [
                "demo::Demo *bus = new demo::Demo();",
                "// consumer",
                "demo::Demo *consumer = new demo::Demo(bus);",
            ]
        );
        assert_eq!(emission.manifest.compiler_flags(), ["-DUSE_CONSUMER"]);
        assert_eq!(emission.bindings.get("bus"), Some(&Expression::variable("bus", ty.ptr())));
    }

    #[test]
    fn sub_jobs() {
        let (registry, target, ty) = setup();
        let mut scheduler = Scheduler::new(&registry, &target);
        let root = Path::root();

        let trigger = ty.clone();
        scheduler.push(priority::CONSUMER, "sensor", "sensor", &root, job(move |cx| {
            let trigger = trigger.clone();
            cx.add_job(priority::AUTOMATION, "sensor automation", move |cx| {
                let sensor = cx.get_variable("sensor")?;
                let _ = cx.new_pvariable(&Identifier::manual("trigger", trigger.clone()), vec![sensor])?;
                Ok(())
            });
            Ok(())
        }));
        scheduler.push(priority::COMPONENT, "source", "source", &root, declaring(&ty, "sensor", None));
        scheduler.run().unwrap();

        let labels: Vec<&str> = scheduler.states().map(|(label, _)| label).collect();
        assert_eq!(labels, ["sensor", "source", "sensor automation"]);
        assert_eq!(
            rendered(scheduler),
            [
                "demo::Demo *sensor = new demo::Demo();",
                "demo::Demo *trigger = new demo::Demo(sensor);",
            ]
        );
    }

    #[test]
    fn cycles() {
        let (registry, target, ty) = setup();
        let mut scheduler = Scheduler::new(&registry, &target);
        let first = Path::root().key("sensor").index(0);
        let second = Path::root().key("sensor").index(1);

        scheduler.declare("a", "sensor.dew_point", &first);
        scheduler.declare("b", "sensor.dew_point", &second);
        scheduler.push(priority::CONSUMER, "sensor.dew_point", "sensor.dew_point", &first, declaring(&ty, "a", Some("b")));
        scheduler.push(priority::CONSUMER, "sensor.dew_point", "sensor.dew_point", &second, declaring(&ty, "b", Some("a")));

        let error = scheduler.run().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Emission);
        assert_eq!(
            error.diagnostics()[0].message,
            "Cyclic reference: `sensor.dew_point` at sensor[0] waits for ID 'b', declared by `sensor.dew_point` at sensor[1], which waits for ID 'a', declared by `sensor.dew_point` at sensor[0]"
        );
        assert!(scheduler.states().all(|(_, state)| *state == JobState::Failed));
    }

    #[test]
    fn undeclared_identifiers() {
        let (registry, target, ty) = setup();
        let mut scheduler = Scheduler::new(&registry, &target);
        let path = Path::root().key("sensor").index(0);
        scheduler.push(priority::CONSUMER, "sensor.template", "sensor.template", &path, declaring(&ty, "a", Some("ghost")));

        let error = scheduler.run().unwrap_err();
        assert_eq!(
            error.diagnostics()[0].message,
            "`sensor.template` waits for ID 'ghost', which is never declared"
        );
        assert_eq!(error.diagnostics()[0].path, path);
    }

    #[test]
    fn failures_abort() {
        let (registry, target, _) = setup();
        let mut scheduler = Scheduler::new(&registry, &target);
        let path = Path::root().key("logger");
        scheduler.push(priority::COMPONENT, "logger", "logger", &path, job(|cx| Err(cx.fail_at("level", "unsupported level"))));
        scheduler.push(priority::FINAL, "never", "never", &path, job(|_| Ok(())));

        let error = scheduler.run().unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Emission);
        assert_eq!(error.diagnostics()[0].path.to_string(), "logger.level");
        let states: Vec<JobState> = scheduler.states().map(|(_, state)| state.clone()).collect();
        assert_eq!(states, [JobState::Failed, JobState::New]);
    }
}
