use std::{
    borrow::Cow,
    cell::Cell,
    future::Future,
    rc::{Rc, Weak},
};

use tokio::time::Instant;

use crate::{
    base::{SquallResult, TableDesc},
    shard::{Resources, semaphore::SemInner},
};

/// Lifecycle state of a read operation's permit.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PermitState {
    /// Queued for admission.
    #[display("waiting")]
    Waiting,
    /// Running, or at least entitled to run.
    #[display("active")]
    Active,
    /// Parked in the inactive registry, evictable.
    #[display("inactive")]
    Inactive,
}

/// The shared record behind a [`ReaderPermit`]. One record exists per
/// logical read operation; every clone of the permit is another strong
/// reference to it.
pub(super) struct PermitRecord {
    semaphore: Rc<SemInner>,
    schema: Option<Rc<TableDesc>>,
    op_name: Cow<'static, str>,
    resources: Cell<Resources>,
    state: Cell<PermitState>,
    id: u64,
}

impl PermitRecord {
    pub(super) fn schema(&self) -> Option<&Rc<TableDesc>> {
        self.schema.as_ref()
    }

    pub(super) fn op_name(&self) -> &str {
        &self.op_name
    }

    pub(super) fn state(&self) -> PermitState {
        self.state.get()
    }

    pub(super) fn resources(&self) -> Resources {
        self.resources.get()
    }

    fn description(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}:{}", schema, self.op_name),
            None => format!("*.*:{}", self.op_name),
        }
    }
}

impl Drop for PermitRecord {
    fn drop(&mut self) {
        self.semaphore.unlink_permit(self.id);
        let res = self.resources.get();
        if res.is_any_held() {
            // Accounting must stay consistent even against buggy readers,
            // so the leak is returned on the permit's behalf.
            error!(
                "permit {} dropped while holding {{count={}, memory={}}}, returning the leak",
                self.description(),
                res.count,
                res.memory,
            );
            self.semaphore.signal(res);
        }
    }
}

/// A shared handle identifying a single logical read operation.
///
/// The permit tracks the resources the read currently holds against its
/// semaphore and the read's lifecycle [`state`](Self::state). Cloning is
/// cheap and yields a handle to the same underlying record; equality is
/// record identity.
#[derive(Clone)]
pub struct ReaderPermit {
    record: Rc<PermitRecord>,
}

impl ReaderPermit {
    pub(super) fn new(
        semaphore: Rc<SemInner>,
        schema: Option<Rc<TableDesc>>,
        op_name: Cow<'static, str>,
        id: u64,
    ) -> Self {
        Self {
            record: Rc::new(PermitRecord {
                semaphore,
                schema,
                op_name,
                resources: Cell::new(Resources::default()),
                state: Cell::new(PermitState::Active),
                id,
            }),
        }
    }

    pub(super) fn record_weak(&self) -> Weak<PermitRecord> {
        Rc::downgrade(&self.record)
    }

    /// Take `res` from the semaphore on behalf of this permit. This is raw
    /// bookkeeping: no admission check happens and no waiter is woken.
    pub fn consume(&self, res: Resources) {
        self.record.resources.set(self.record.resources.get() + res);
        self.record.semaphore.consume(res);
    }

    /// Give `res` back to the semaphore. Wakes queued waiters that now fit.
    pub fn signal(&self, res: Resources) {
        self.record.resources.set(self.record.resources.get() - res);
        self.record.semaphore.signal(res);
    }

    /// Scoped version of [`consume`](Self::consume): the returned guard
    /// gives the resources back when dropped.
    pub fn consume_resources(&self, res: Resources) -> ResourceUnits {
        ResourceUnits::new(self.clone(), res)
    }

    /// Shorthand for [`consume_resources`](Self::consume_resources) with a
    /// memory-only amount.
    pub fn consume_memory(&self, memory: u64) -> ResourceUnits {
        self.consume_resources(Resources::memory_only(memory as i64))
    }

    /// Wait until the semaphore admits this read with one count slot and
    /// `memory` bytes. The admission request is enqueued before this
    /// returns; the future only waits for the grant.
    ///
    /// Fails with a timeout error when `deadline` elapses first, with an
    /// overload error when the wait queue is full, and with a broken or
    /// stopped error when the semaphore goes away.
    pub fn wait_admission(
        &self,
        memory: u64,
        deadline: Option<Instant>,
    ) -> impl Future<Output = SquallResult<ResourceUnits>> + use<> {
        self.record
            .semaphore
            .do_wait_admission(self.clone(), memory, deadline)
    }

    pub fn state(&self) -> PermitState {
        self.record.state.get()
    }

    /// The resources currently held by this permit.
    pub fn consumed_resources(&self) -> Resources {
        self.record.resources.get()
    }

    /// `db.table:op` rendering for logs; `*.*` when the permit carries no
    /// schema.
    pub fn description(&self) -> String {
        self.record.description()
    }

    pub(super) fn on_waiting(&self) {
        self.record.state.set(PermitState::Waiting);
    }

    pub(super) fn on_admission(&self) {
        self.record.state.set(PermitState::Active);
    }

    pub(super) fn on_register_as_inactive(&self) {
        self.record.state.set(PermitState::Inactive);
    }

    pub(super) fn on_unregister_as_inactive(&self) {
        self.record.state.set(PermitState::Active);
    }
}

impl PartialEq for ReaderPermit {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.record, &other.record)
    }
}

impl Eq for ReaderPermit {}

/// Scoped ownership of resources consumed against a permit.
///
/// Construction consumes the amount immediately; dropping the guard
/// signals whatever it still holds, so resources are returned on every
/// exit path. Movable but not copyable.
pub struct ResourceUnits {
    permit: ReaderPermit,
    resources: Resources,
}

impl ResourceUnits {
    pub(super) fn new(permit: ReaderPermit, res: Resources) -> Self {
        permit.consume(res);
        Self {
            permit,
            resources: res,
        }
    }

    /// Re-base the guard to `res`: the new amount is consumed first, then
    /// the old amount is signalled, so the total never dips in between.
    pub fn reset(&mut self, res: Resources) {
        self.permit.consume(res);
        if self.resources.is_any_held() {
            self.permit.signal(self.resources);
        }
        self.resources = res;
    }

    /// Merge `other` into this guard. Both must belong to the same permit.
    pub fn add(&mut self, mut other: ResourceUnits) {
        assert!(
            self.permit == other.permit,
            "cannot merge resource units of different permits"
        );
        self.resources += std::mem::take(&mut other.resources);
    }

    pub fn resources(&self) -> Resources {
        self.resources
    }

    pub fn permit(&self) -> &ReaderPermit {
        &self.permit
    }
}

impl Drop for ResourceUnits {
    fn drop(&mut self) {
        if self.resources.is_any_held() {
            self.permit.signal(self.resources);
        }
    }
}
