//! The reader concurrency semaphore: admission control and memory
//! accounting for one shard's read path.
//!
//! Admission is strictly FIFO and two-dimensional: a read needs one count
//! slot and a caller-declared amount of buffer memory. Reads that parked
//! themselves as inactive are the eviction reserve; whenever a waiter
//! queues up, the oldest inactive readers are closed one by one in the
//! background until either the queue drains or the registry is empty.
//!
//! Everything here runs on the shard's single-threaded executor. State is
//! only touched between suspension points, so a `RefCell` around the
//! mutable interior is all the synchronization there is.

use std::{
    borrow::Cow,
    cell::{Cell, RefCell},
    collections::{HashMap, VecDeque},
    fmt::Write as _,
    future::Future,
    rc::{Rc, Weak},
    time::Duration,
};

use futures::future::{self, Either};
use itertools::Itertools;
use tokio::{
    sync::{Notify, oneshot},
    time::Instant,
};

use crate::{
    base::{ByteSize, SquallError, SquallResult, TableDesc},
    shard::{
        PermitState, ReaderPermit, Resources, SemaphoreConfig,
        permit::{PermitRecord, ResourceUnits},
        reader::ShardReader,
    },
};

/// Minimum gap between two rate-limited diagnostics dumps of the same
/// semaphore.
const DIAGNOSTICS_DUMP_PERIOD: Duration = Duration::from_secs(30);

/// Why an inactive read was evicted.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum EvictReason {
    /// Evicted to free resources for a queued waiter.
    #[display("permit")]
    Permit,
    /// The entry's ttl expired.
    #[display("time")]
    Time,
    /// Explicitly requested eviction.
    #[display("manual")]
    Manual,
}

/// Monotonic counters exposed for introspection; `inactive_reads` is the
/// one gauge and always equals the current registry size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SemaphoreStats {
    pub inactive_reads: u64,
    pub permit_based_evictions: u64,
    pub time_based_evictions: u64,
    pub total_reads_shed_due_to_overload: u64,
}

/// Callback invoked when an inactive read is evicted, before its reader
/// is closed.
pub type EvictionNotifyHandler = Box<dyn FnOnce(EvictReason)>;

struct Waiter {
    id: u64,
    tx: oneshot::Sender<SquallResult<ResourceUnits>>,
    permit: ReaderPermit,
    res: Resources,
}

struct InactiveRead {
    reader: Box<dyn ShardReader>,
    notify_handler: Option<EvictionNotifyHandler>,
}

/// The inactive-read registry: entries keyed by id, eviction order kept
/// as a FIFO of ids. Ids are never reused; an id whose entry was removed
/// out of order simply goes stale in the queue and is skipped on pop.
#[derive(Default)]
struct InactiveRegistry {
    entries: HashMap<u64, InactiveRead>,
    order: VecDeque<u64>,
}

/// A move-only token for a registered inactive read.
///
/// The handle and the registry entry are linked weakly in both
/// directions: eviction (or clearing, or semaphore shutdown) makes the
/// handle observe [`is_linked`](Self::is_linked) `== false`, and
/// consuming or dropping the handle never leaves the entry pointing at a
/// dead token. Dropping a handle that is still linked abandons the read:
/// the entry is removed and its reader closed in the background.
pub struct InactiveReadHandle {
    sem: Weak<SemInner>,
    entry: Cell<Option<u64>>,
}

impl InactiveReadHandle {
    /// A handle linked to nothing, as returned for reads that were
    /// evicted on registration.
    pub fn unlinked() -> Self {
        Self {
            sem: Weak::new(),
            entry: Cell::new(None),
        }
    }

    /// Whether the handle still refers to a registered inactive read.
    pub fn is_linked(&self) -> bool {
        match (self.sem.upgrade(), self.entry.get()) {
            (Some(sem), Some(id)) => sem.state.borrow().inactive.entries.contains_key(&id),
            _ => false,
        }
    }
}

impl Default for InactiveReadHandle {
    fn default() -> Self {
        Self::unlinked()
    }
}

impl Drop for InactiveReadHandle {
    fn drop(&mut self) {
        if let (Some(sem), Some(id)) = (self.sem.upgrade(), self.entry.take())
            && let Some(entry) = sem.detach_inactive(id)
        {
            sem.close_reader(entry.reader);
        }
    }
}

struct CloseGate {
    count: Cell<u64>,
    idle: Notify,
}

impl CloseGate {
    fn new() -> Self {
        Self {
            count: Cell::new(0),
            idle: Notify::new(),
        }
    }

    fn enter(&self) {
        self.count.set(self.count.get() + 1);
    }

    fn leave(&self) {
        let count = self.count.get() - 1;
        self.count.set(count);
        if count == 0 {
            self.idle.notify_waiters();
        }
    }

    fn is_idle(&self) -> bool {
        self.count.get() == 0
    }

    async fn wait_idle(&self) {
        while self.count.get() > 0 {
            self.idle.notified().await;
        }
    }
}

struct SemState {
    available: Resources,
    wait_queue: VecDeque<Waiter>,
    inactive: InactiveRegistry,
    /// All live permit records, for diagnostics. Weak: the directory never
    /// keeps a permit alive; records unlink themselves when dropped.
    permits: HashMap<u64, Weak<PermitRecord>>,
    stats: SemaphoreStats,
    stopped: bool,
    broken_msg: Option<String>,
    next_id: u64,
}

pub(super) struct SemInner {
    name: String,
    initial: Resources,
    max_queue_length: usize,
    prethrow_action: Option<Box<dyn Fn()>>,
    state: RefCell<SemState>,
    gate: CloseGate,
    last_dump: Cell<Option<std::time::Instant>>,
    /// Self-reference handed to spawned tasks and inactive-read handles.
    weak_self: Weak<SemInner>,
}

enum Admission {
    Ready(SquallResult<ResourceUnits>),
    Queued(oneshot::Receiver<SquallResult<ResourceUnits>>),
}

impl SemInner {
    /// A fresh strong reference to self; valid whenever a method runs,
    /// since the caller necessarily holds one.
    fn strong(&self) -> Rc<SemInner> {
        self.weak_self.upgrade().expect("semaphore inner is alive")
    }

    fn next_id(&self) -> u64 {
        let mut st = self.state.borrow_mut();
        st.next_id += 1;
        st.next_id
    }

    fn has_available_units(&self, st: &SemState, r: Resources) -> bool {
        // Special case: when no reader is currently admitted (based on
        // count), admit one regardless of memory availability, otherwise a
        // single oversized read could deadlock an idle semaphore.
        (st.available.is_positive() && st.available.covers(r))
            || st.available.count == self.initial.count
    }

    pub(super) fn consume(&self, r: Resources) {
        self.state.borrow_mut().available -= r;
    }

    pub(super) fn signal(&self, r: Resources) {
        self.state.borrow_mut().available += r;
        self.wake_waiters();
    }

    /// Admit queued waiters head-only: the queue stays FIFO even when a
    /// later entry would fit into what is currently available.
    fn wake_waiters(&self) {
        loop {
            let fits = {
                let st = self.state.borrow();
                st.wait_queue
                    .front()
                    .is_some_and(|w| self.has_available_units(&st, w.res))
            };
            if !fits {
                break;
            }
            let waiter = self
                .state
                .borrow_mut()
                .wait_queue
                .pop_front()
                .expect("checked non-empty above");
            waiter.permit.on_admission();
            let units = ResourceUnits::new(waiter.permit.clone(), waiter.res);
            // A dead receiver means the waiter's future was dropped; the
            // units return their resources when they fall out of `send`.
            let _ = waiter.tx.send(Ok(units));
        }
    }

    pub(super) fn make_permit(
        &self,
        schema: Option<Rc<TableDesc>>,
        op_name: Cow<'static, str>,
    ) -> ReaderPermit {
        let id = self.next_id();
        let permit = ReaderPermit::new(self.strong(), schema, op_name, id);
        self.state.borrow_mut().permits.insert(id, permit.record_weak());
        permit
    }

    pub(super) fn unlink_permit(&self, id: u64) {
        self.state.borrow_mut().permits.remove(&id);
    }

    pub(super) fn do_wait_admission(
        &self,
        permit: ReaderPermit,
        memory: u64,
        deadline: Option<Instant>,
    ) -> impl Future<Output = SquallResult<ResourceUnits>> + use<> {
        let res = Resources::new(1, memory as i64);
        match self.admit_or_enqueue(permit, res, deadline) {
            Admission::Ready(result) => Either::Left(future::ready(result)),
            Admission::Queued(rx) => {
                let name = self.name.clone();
                Either::Right(async move {
                    match rx.await {
                        Ok(result) => result,
                        // the sender vanished without resolving: the
                        // semaphore was dropped out from under the waiter
                        Err(_) => {
                            Err(SquallError::SemaphoreBroken(format!("broken semaphore {name}")))
                        }
                    }
                })
            }
        }
    }

    fn admit_or_enqueue(
        &self,
        permit: ReaderPermit,
        res: Resources,
        deadline: Option<Instant>,
    ) -> Admission {
        let (first, admit_now) = {
            let st = self.state.borrow();
            if st.stopped {
                return Admission::Ready(Err(SquallError::SemaphoreStopped(self.name.clone())));
            }
            if let Some(msg) = &st.broken_msg {
                return Admission::Ready(Err(SquallError::SemaphoreBroken(msg.clone())));
            }
            let first = st.wait_queue.is_empty();
            (first, first && self.has_available_units(&st, res))
        };

        if admit_now {
            permit.on_admission();
            return Admission::Ready(Ok(ResourceUnits::new(permit, res)));
        }

        if self.state.borrow().wait_queue.len() >= self.max_queue_length {
            self.state.borrow_mut().stats.total_reads_shed_due_to_overload += 1;
            if let Some(action) = &self.prethrow_action {
                action();
            }
            self.maybe_dump_diagnostics("wait queue overloaded");
            return Admission::Ready(Err(SquallError::SemaphoreOverloaded(self.name.clone())));
        }

        let (tx, rx) = oneshot::channel();
        let id = self.next_id();
        permit.on_waiting();
        let kick_eviction = {
            let mut st = self.state.borrow_mut();
            st.wait_queue.push_back(Waiter {
                id,
                tx,
                permit,
                res,
            });
            first && !st.inactive.entries.is_empty()
        };

        if let Some(deadline) = deadline {
            let sem = self.weak_self.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep_until(deadline).await;
                if let Some(sem) = sem.upgrade() {
                    sem.expire_waiter(id);
                }
            });
        }

        if kick_eviction {
            self.evict_readers_in_background();
        }

        Admission::Queued(rx)
    }

    fn expire_waiter(&self, waiter_id: u64) {
        let waiter = {
            let mut st = self.state.borrow_mut();
            let Some(pos) = st.wait_queue.iter().position(|w| w.id == waiter_id) else {
                // already admitted, expired or broken
                return;
            };
            st.wait_queue.remove(pos).expect("position is in range")
        };
        let _ = waiter
            .tx
            .send(Err(SquallError::SemaphoreTimedOut(self.name.clone())));
        self.maybe_dump_diagnostics("timed out");
    }

    /// Drain inactive readers, oldest first, while waiters are queued.
    /// Closing a reader releases its resources, which re-runs admission,
    /// so this loop does not need to free enough for the head waiter in
    /// one step.
    fn evict_readers_in_background(&self) {
        let sem = self.strong();
        self.spawn_in_gate(async move {
            loop {
                if sem.state.borrow().wait_queue.is_empty() {
                    break;
                }
                let Some(entry) = sem.pop_oldest_inactive() else {
                    break;
                };
                let mut reader = sem.finish_eviction(entry, EvictReason::Permit);
                if let Err(err) = reader.close().await {
                    warn!(
                        "[semaphore {}] failed to close evicted reader: {}",
                        sem.name, err
                    );
                }
            }
        });
    }

    pub(super) fn register_inactive_read(
        &self,
        reader: Box<dyn ShardReader>,
    ) -> InactiveReadHandle {
        let permit = reader.permit().clone();
        // A non-empty wait queue implies the registry is being drained;
        // don't park new readers behind the drain. The queue check covers
        // the count dimension only, so memory headroom is checked
        // separately.
        let can_park = {
            let st = self.state.borrow();
            !st.stopped && st.wait_queue.is_empty() && st.available.memory > 0
        };

        if can_park {
            let id = self.next_id();
            {
                let mut st = self.state.borrow_mut();
                st.inactive.entries.insert(
                    id,
                    InactiveRead {
                        reader,
                        notify_handler: None,
                    },
                );
                st.inactive.order.push_back(id);
                st.stats.inactive_reads += 1;
            }
            permit.on_register_as_inactive();
            return InactiveReadHandle {
                sem: self.weak_self.clone(),
                entry: Cell::new(Some(id)),
            };
        }

        self.state.borrow_mut().stats.permit_based_evictions += 1;
        self.close_reader(reader);
        InactiveReadHandle::unlinked()
    }

    pub(super) fn unregister_inactive_read(
        &self,
        handle: InactiveReadHandle,
    ) -> Option<Box<dyn ShardReader>> {
        let id = handle.entry.take()?;
        let handle_sem = handle.sem.upgrade()?;
        if !std::ptr::eq(self, Rc::as_ptr(&handle_sem)) {
            // Unregister from the semaphore that actually owns the entry
            // and close the reader there, so accounting stays right on
            // both sides of the mixup.
            if let Some(entry) = handle_sem.detach_inactive(id) {
                handle_sem.close_reader(entry.reader);
            }
            error!(
                "unregister_inactive_read(): attempted to unregister an inactive read with a \
                 handle belonging to another semaphore: this is {} but the handle belongs to {}",
                self.name, handle_sem.name
            );
            return None;
        }

        let entry = self.detach_inactive(id)?;
        entry.reader.permit().on_unregister_as_inactive();
        Some(entry.reader)
    }

    /// Remove the entry for `id`, if it still exists. The stale id stays
    /// in the order queue and is skipped when it surfaces.
    fn detach_inactive(&self, id: u64) -> Option<InactiveRead> {
        let mut st = self.state.borrow_mut();
        let entry = st.inactive.entries.remove(&id)?;
        st.stats.inactive_reads -= 1;
        Some(entry)
    }

    fn pop_oldest_inactive(&self) -> Option<InactiveRead> {
        let mut st = self.state.borrow_mut();
        while let Some(id) = st.inactive.order.pop_front() {
            if let Some(entry) = st.inactive.entries.remove(&id) {
                st.stats.inactive_reads -= 1;
                return Some(entry);
            }
        }
        None
    }

    /// Notify and count an eviction; the caller decides how the returned
    /// reader is closed.
    fn finish_eviction(&self, mut entry: InactiveRead, reason: EvictReason) -> Box<dyn ShardReader> {
        if let Some(handler) = entry.notify_handler.take() {
            handler(reason);
        }
        let mut st = self.state.borrow_mut();
        match reason {
            EvictReason::Permit => st.stats.permit_based_evictions += 1,
            EvictReason::Time => st.stats.time_based_evictions += 1,
            EvictReason::Manual => {}
        }
        entry.reader
    }

    pub(super) fn try_evict_one_inactive_read(&self, reason: EvictReason) -> bool {
        let Some(entry) = self.pop_oldest_inactive() else {
            return false;
        };
        let reader = self.finish_eviction(entry, reason);
        self.close_reader(reader);
        true
    }

    fn evict_by_id(&self, id: u64, reason: EvictReason) {
        let Some(entry) = self.detach_inactive(id) else {
            return;
        };
        let reader = self.finish_eviction(entry, reason);
        self.close_reader(reader);
    }

    pub(super) fn clear_inactive_reads(&self) {
        while let Some(entry) = self.pop_oldest_inactive() {
            self.close_reader(entry.reader);
        }
    }

    pub(super) fn set_notify_handler(
        &self,
        handle: &InactiveReadHandle,
        handler: EvictionNotifyHandler,
        ttl: Option<Duration>,
    ) {
        debug_assert!(handle.is_linked(), "notify handler on an unlinked handle");
        let Some(id) = handle.entry.get() else {
            return;
        };
        {
            let mut st = self.state.borrow_mut();
            let Some(entry) = st.inactive.entries.get_mut(&id) else {
                return;
            };
            entry.notify_handler = Some(handler);
        }
        if let Some(ttl) = ttl {
            let sem = self.weak_self.clone();
            tokio::task::spawn_local(async move {
                tokio::time::sleep(ttl).await;
                if let Some(sem) = sem.upgrade() {
                    sem.evict_by_id(id, EvictReason::Time);
                }
            });
        }
    }

    /// Close `reader` in a background task tracked by the close gate, so
    /// `stop()` can wait for it.
    fn close_reader(&self, mut reader: Box<dyn ShardReader>) {
        let sem = self.strong();
        self.spawn_in_gate(async move {
            if let Err(err) = reader.close().await {
                warn!("[semaphore {}] failed to close reader: {}", sem.name, err);
            }
        });
    }

    fn spawn_in_gate(&self, fut: impl Future<Output = ()> + 'static) {
        self.gate.enter();
        let sem = self.strong();
        tokio::task::spawn_local(async move {
            fut.await;
            sem.gate.leave();
        });
    }

    fn fail_all_waiters(&self, mk_err: impl Fn() -> SquallError) {
        loop {
            let waiter = self.state.borrow_mut().wait_queue.pop_front();
            let Some(waiter) = waiter else { break };
            let _ = waiter.tx.send(Err(mk_err()));
        }
    }

    pub(super) fn broken(&self, reason: Option<String>) {
        let msg = reason.unwrap_or_else(|| format!("broken semaphore {}", self.name));
        self.state.borrow_mut().broken_msg = Some(msg.clone());
        self.fail_all_waiters(|| SquallError::SemaphoreBroken(msg.clone()));
    }

    pub(super) async fn stop(&self) {
        {
            let mut st = self.state.borrow_mut();
            assert!(!st.stopped, "semaphore {} stopped twice", self.name);
            st.stopped = true;
        }
        self.clear_inactive_reads();
        self.gate.wait_idle().await;
        self.fail_all_waiters(|| SquallError::SemaphoreStopped(self.name.clone()));
    }

    fn maybe_dump_diagnostics(&self, problem: &str) {
        let now = std::time::Instant::now();
        if let Some(last) = self.last_dump.get()
            && now.duration_since(last) < DIAGNOSTICS_DUMP_PERIOD
        {
            return;
        }
        self.last_dump.set(Some(now));
        info!("{}", self.dump_diagnostics(problem, 20));
    }

    /// Render the outstanding permits grouped by (schema, op, state),
    /// largest memory first. `max_lines == 0` disables truncation.
    fn dump_diagnostics(&self, problem: &str, max_lines: usize) -> String {
        #[derive(Clone, Copy, Default)]
        struct Group {
            permits: u64,
            resources: Resources,
        }

        impl Group {
            fn absorb(&mut self, other: Group) {
                self.permits += other.permits;
                self.resources += other.resources;
            }
        }

        let (records, available): (Vec<Rc<PermitRecord>>, Resources) = {
            let st = self.state.borrow();
            (
                st.permits.values().filter_map(Weak::upgrade).collect(),
                st.available,
            )
        };

        let mut groups: HashMap<
            (Option<*const TableDesc>, &str, PermitState),
            (Option<Rc<TableDesc>>, Group),
        > = HashMap::new();
        for record in &records {
            let key = (
                record.schema().map(Rc::as_ptr),
                record.op_name(),
                record.state(),
            );
            let (_, group) = groups
                .entry(key)
                .or_insert_with(|| (record.schema().cloned(), Group::default()));
            group.permits += 1;
            group.resources += record.resources();
        }

        let consumed = self.initial - available;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Semaphore {} with {}/{} count and {}/{} memory resources: {}, dumping permit diagnostics:",
            self.name, consumed.count, self.initial.count, consumed.memory, self.initial.memory, problem
        );
        let _ = writeln!(out, "permits\tcount\tmemory\ttable/description/state");

        let mut total = Group::default();
        let mut omitted = Group::default();
        let mut lines = 0usize;

        for ((_, op_name, state), (schema, group)) in groups
            .into_iter()
            .sorted_by(|(_, (_, a)), (_, (_, b))| b.resources.memory.cmp(&a.resources.memory))
        {
            total.absorb(group);
            if max_lines == 0 || lines < max_lines {
                lines += 1;
                let table = match schema {
                    Some(schema) => schema.to_string(),
                    None => "*.*".to_string(),
                };
                let _ = writeln!(
                    out,
                    "{}\t{}\t{:?}\t{}/{}/{}",
                    group.permits,
                    group.resources.count,
                    ByteSize(group.resources.memory),
                    table,
                    op_name,
                    state
                );
            } else {
                omitted.absorb(group);
            }
        }
        if omitted.permits > 0 {
            let _ = writeln!(
                out,
                "{}\t{}\t{:?}\tpermits omitted for brevity",
                omitted.permits,
                omitted.resources.count,
                ByteSize(omitted.resources.memory)
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "{}\t{}\t{:?}\ttotal",
            total.permits,
            total.resources.count,
            ByteSize(total.resources.memory)
        );
        out
    }
}

/// Admission control and memory accounting for one shard's concurrent
/// reads. See the [module docs](self) for the full picture.
///
/// The semaphore spawns background tasks with
/// [`tokio::task::spawn_local`], so it has to live inside a
/// [`tokio::task::LocalSet`] (or another current-thread spawn context).
/// Call [`stop`](Self::stop) before dropping it; `stop` evicts all parked
/// readers, waits for their shutdown and fails all remaining waiters.
pub struct ReaderSemaphore {
    inner: Rc<SemInner>,
}

impl ReaderSemaphore {
    pub fn new(count: u32, memory: i64, name: impl Into<String>) -> Self {
        Self::with_queue_limit(count, memory, name, usize::MAX, None)
    }

    pub fn with_queue_limit(
        count: u32,
        memory: i64,
        name: impl Into<String>,
        max_queue_length: usize,
        prethrow_action: Option<Box<dyn Fn()>>,
    ) -> Self {
        let initial = Resources::new(count, memory);
        let name = name.into();
        Self {
            inner: Rc::new_cyclic(|weak_self| SemInner {
                name,
                initial,
                max_queue_length,
                prethrow_action,
                state: RefCell::new(SemState {
                    available: initial,
                    wait_queue: VecDeque::new(),
                    inactive: InactiveRegistry::default(),
                    permits: HashMap::new(),
                    stats: SemaphoreStats::default(),
                    stopped: false,
                    broken_msg: None,
                    next_id: 0,
                }),
                gate: CloseGate::new(),
                last_dump: Cell::new(None),
                weak_self: weak_self.clone(),
            }),
        }
    }

    /// A semaphore with both capacities effectively infinite; used in
    /// tests and in contexts that must never restrict reads.
    pub fn no_limits(name: impl Into<String>) -> Self {
        Self::new(u32::MAX, i64::MAX, name)
    }

    pub fn from_config(config: &SemaphoreConfig, name: impl Into<String>) -> Self {
        Self::with_queue_limit(
            config.count,
            config.memory,
            name,
            config.max_queue_length,
            None,
        )
    }

    /// Create a permit for one logical read operation. `schema` is kept
    /// for diagnostics only and may be absent; `op_name` accepts both
    /// `&'static str` and owned strings, so literal call sites do not
    /// allocate.
    pub fn make_permit(
        &self,
        schema: Option<&Rc<TableDesc>>,
        op_name: impl Into<Cow<'static, str>>,
    ) -> ReaderPermit {
        self.inner.make_permit(schema.cloned(), op_name.into())
    }

    /// Park `reader` as inactive, making its resources reclaimable. When
    /// waiters are queued or no memory headroom is left, the reader is
    /// accepted but immediately evicted: it is closed in the background
    /// and the returned handle is unlinked.
    pub fn register_inactive_read(&self, reader: Box<dyn ShardReader>) -> InactiveReadHandle {
        self.inner.register_inactive_read(reader)
    }

    /// Take a parked reader back out of the registry. Returns `None` for
    /// unlinked handles and for handles whose entry was already evicted.
    pub fn unregister_inactive_read(
        &self,
        handle: InactiveReadHandle,
    ) -> Option<Box<dyn ShardReader>> {
        self.inner.unregister_inactive_read(handle)
    }

    /// Evict the oldest inactive read, if there is one.
    pub fn try_evict_one_inactive_read(&self) -> bool {
        self.inner.try_evict_one_inactive_read(EvictReason::Manual)
    }

    /// Evict every inactive read, oldest first.
    pub fn clear_inactive_reads(&self) {
        self.inner.clear_inactive_reads()
    }

    /// Install an eviction callback on a registered inactive read, and
    /// optionally a ttl after which the entry is evicted with reason
    /// [`EvictReason::Time`]. A panicking handler propagates to the
    /// evicting task.
    pub fn set_notify_handler(
        &self,
        handle: &InactiveReadHandle,
        handler: impl FnOnce(EvictReason) + 'static,
        ttl: Option<Duration>,
    ) {
        self.inner
            .set_notify_handler(handle, Box::new(handler), ttl)
    }

    /// Raw bookkeeping: take `r` out of the available resources without
    /// any admission check.
    pub fn consume(&self, r: Resources) {
        self.inner.consume(r)
    }

    /// Raw bookkeeping: return `r` and wake queued waiters that now fit.
    pub fn signal(&self, r: Resources) {
        self.inner.signal(r)
    }

    /// Fail every queued waiter, and every future one, with a broken
    /// error carrying `reason` (or a default text).
    pub fn broken(&self, reason: Option<String>) {
        self.inner.broken(reason)
    }

    /// Shut the semaphore down: evict all inactive reads, wait for every
    /// background reader close to finish, then fail remaining waiters
    /// with a stopped error. Must be called exactly once.
    pub async fn stop(&self) {
        self.inner.stop().await
    }

    pub fn waiters(&self) -> usize {
        self.inner.state.borrow().wait_queue.len()
    }

    pub fn available_resources(&self) -> Resources {
        self.inner.state.borrow().available
    }

    pub fn initial_resources(&self) -> Resources {
        self.inner.initial
    }

    pub fn consumed_resources(&self) -> Resources {
        self.inner.initial - self.inner.state.borrow().available
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn get_stats(&self) -> SemaphoreStats {
        self.inner.state.borrow().stats
    }

    /// A report of all outstanding permits, grouped by
    /// (table, operation, state) and sorted by held memory descending.
    /// `max_lines` truncates the body (0 means no limit); truncated rows
    /// are rolled up into a single tail row.
    pub fn dump_diagnostics(&self, max_lines: usize) -> String {
        self.inner.dump_diagnostics("user request", max_lines)
    }
}

impl Drop for ReaderSemaphore {
    fn drop(&mut self) {
        let st = self.inner.state.borrow();
        debug_assert!(
            st.inactive.entries.is_empty(),
            "semaphore {} dropped with inactive reads; stop() it first",
            self.inner.name
        );
        debug_assert!(
            self.inner.gate.is_idle(),
            "semaphore {} dropped with reader closes in flight; stop() it first",
            self.inner.name
        );
        drop(st);
        self.inner.broken(None);
    }
}
