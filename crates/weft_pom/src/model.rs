//! PomModel - aspect registry and transaction runner
//!
//! Running a transaction:
//!
//! ```text
//! guard check ─► start housekeeping ─► find blocking outer transaction
//!      ─► push block ─► body ─► pop block
//!      ─► blocked?  merge into outer event
//!         else      update dependant aspects ─► notify listeners
//!      ─► commit housekeeping (always) ─► report collected failures
//! ```
//!
//! The block stack is per thread: nesting is only detected for transactions
//! started from inside another transaction's body on the same thread.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use weft_core::{catch_panic, CancellationToken, DisposalScope, IdGenerator, Registration};

use crate::aspect::{Aspect, AspectGraph, AspectId, AspectProvider, AspectRegistrator};
use crate::config::ModelConfig;
use crate::error::{ModelError, ModelResult};
use crate::event::ModelEvent;
use crate::host::{ChangeScope, FileId, NoopHost, TransactionHost};
use crate::listener::{ListenerId, PomModelListener};
use crate::transaction::{Transaction, TransactionContext, TransactionId};

/// Statistics about transaction processing
#[derive(Debug, Clone, Default)]
pub struct ModelStats {
    /// Transactions whose body was started
    pub transactions_run: u64,
    /// Transactions that updated dependants and notified listeners
    pub transactions_committed: u64,
    /// Transactions absorbed by a blocking outer transaction
    pub transactions_merged: u64,
    /// Transactions that reported failures
    pub transactions_failed: u64,
    /// Transactions whose body was cancelled
    pub transactions_cancelled: u64,
    /// `Aspect::update` calls
    pub dependant_updates: u64,
    /// `PomModelListener::model_changed` calls
    pub listener_notifications: u64,
}

struct BlockedEntry {
    aspect: AspectId,
    file: Option<FileId>,
    event: Arc<Mutex<ModelEvent>>,
}

struct ListenerEntry {
    id: ListenerId,
    listener: Arc<dyn PomModelListener>,
    scope: Option<(DisposalScope, Registration)>,
}

type ListenerTable = RwLock<Vec<ListenerEntry>>;

/// The program object model
pub struct PomModel {
    config: ModelConfig,
    host: Arc<dyn TransactionHost>,
    cancellation: CancellationToken,
    graph: RwLock<AspectGraph>,
    listeners: Arc<ListenerTable>,
    listener_ids: IdGenerator,
    blocked: Mutex<HashMap<ThreadId, Vec<BlockedEntry>>>,
    allow_modification: AtomicBool,
    stats: RwLock<ModelStats>,
}

impl PomModel {
    /// Create a model without a document layer
    pub fn new(config: ModelConfig) -> Self {
        Self::with_host(config, Arc::new(NoopHost))
    }

    /// Create a model that synchronizes through `host`
    pub fn with_host(config: ModelConfig, host: Arc<dyn TransactionHost>) -> Self {
        Self {
            config,
            host,
            cancellation: CancellationToken::new(),
            graph: RwLock::new(AspectGraph::new()),
            listeners: Arc::new(RwLock::new(Vec::new())),
            listener_ids: IdGenerator::new(),
            blocked: Mutex::new(HashMap::new()),
            allow_modification: AtomicBool::new(true),
            stats: RwLock::new(ModelStats::default()),
        }
    }

    /// Share a cancellation token with the caller's operation
    ///
    /// Transactions hold a non-cancelable section on this token while they run.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// Configuration
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Cancellation token
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    // ---- Aspect registry ----

    /// Register an aspect with its direct dependencies
    pub fn register_aspect(
        &self,
        id: AspectId,
        aspect: Arc<dyn Aspect>,
        dependencies: &[AspectId],
    ) -> ModelResult<()> {
        self.graph.write().register(id, aspect, dependencies)?;
        log::debug!("Registered aspect '{}' depending on {:?}", id, dependencies);
        Ok(())
    }

    /// Let each provider register its aspects, in order
    pub fn register_providers<'p>(
        &self,
        providers: impl IntoIterator<Item = &'p dyn AspectProvider>,
    ) -> ModelResult<()> {
        for provider in providers {
            provider.register(self)?;
        }
        Ok(())
    }

    /// Registered aspect instance
    pub fn aspect(&self, id: AspectId) -> Option<Arc<dyn Aspect>> {
        self.graph.read().aspect(id)
    }

    /// What `id` depends on, including itself
    pub fn incidence(&self, id: AspectId) -> Vec<AspectId> {
        self.graph.read().incidence(id).to_vec()
    }

    /// Aspects depending on `id`, including itself once registered
    pub fn dependants(&self, id: AspectId) -> Vec<AspectId> {
        self.graph.read().dependants(id).to_vec()
    }

    /// Registered aspect ids in registration order
    pub fn registered_aspects(&self) -> Vec<AspectId> {
        self.graph.read().registered().to_vec()
    }

    // ---- Listeners ----

    /// Add a listener until removed
    pub fn add_model_listener(&self, listener: Arc<dyn PomModelListener>) -> ListenerId {
        let id = self.listener_ids.next();
        self.listeners.write().push(ListenerEntry {
            id,
            listener,
            scope: None,
        });
        id
    }

    /// Add a listener removed when `scope` is disposed
    pub fn add_model_listener_scoped(
        &self,
        listener: Arc<dyn PomModelListener>,
        scope: &DisposalScope,
    ) -> ListenerId {
        let id = self.add_model_listener(listener);
        let listeners = Arc::downgrade(&self.listeners);
        // A disposed scope runs the teardown right away, so no lock is held here
        let registration = scope.register(move || {
            if let Some(listeners) = listeners.upgrade() {
                listeners.write().retain(|entry| entry.id != id);
            }
        });
        if let Some(entry) = self.listeners.write().iter_mut().find(|entry| entry.id == id) {
            entry.scope = Some((scope.clone(), registration));
        }
        id
    }

    /// Remove a listener; returns whether it was registered
    pub fn remove_model_listener(&self, id: ListenerId) -> bool {
        let removed = {
            let mut listeners = self.listeners.write();
            listeners
                .iter()
                .position(|entry| entry.id == id)
                .map(|index| listeners.remove(index))
        };
        match removed {
            Some(entry) => {
                if let Some((scope, registration)) = entry.scope {
                    scope.unregister(registration);
                }
                true
            }
            None => false,
        }
    }

    /// Number of registered listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }

    // ---- Modification guard ----

    /// Whether transactions may currently run
    pub fn is_modification_allowed(&self) -> bool {
        self.allow_modification.load(Ordering::Acquire)
    }

    /// Run `block` with transactions forbidden, restoring the previous state
    /// afterwards (also on unwind)
    pub fn guard_modifications_in<R>(&self, block: impl FnOnce() -> R) -> ModelResult<R> {
        if !self.host.is_write_access_allowed() {
            return Err(ModelError::IllegalState(
                "guarding modifications requires write access".to_string(),
            ));
        }
        let previous = self.allow_modification.swap(false, Ordering::AcqRel);
        let _restore = RestoreFlag {
            flag: &self.allow_modification,
            previous,
        };
        Ok(block())
    }

    // ---- Transactions ----

    /// Transactions currently running on the calling thread
    pub fn transaction_depth(&self) -> usize {
        self.blocked
            .lock()
            .get(&thread::current().id())
            .map_or(0, Vec::len)
    }

    /// Run a transaction
    ///
    /// Body failures and panics, and panics in dependant updates or
    /// listeners, are collected and reported after commit housekeeping:
    /// one failure as itself, several as `ModelError::Compound`. A body that
    /// returns `ModelError::Cancelled` skips merge and updates and the
    /// cancellation is returned as is.
    pub fn run_transaction(&self, transaction: Transaction<'_>) -> ModelResult<()> {
        if !self.is_modification_allowed() {
            return Err(ModelError::ModificationNotAllowed);
        }

        let _section = self.cancellation.non_cancelable_section();
        self.start_transaction(&transaction)?;

        let (id, aspect, scope, body) = transaction.into_parts();
        self.stats.write().transactions_run += 1;

        let file = scope.containing_file();
        let blocking = self.blocking_transaction(aspect, file);
        if let Some(outer) = &blocking {
            outer.lock().before_nested_transaction();
        }

        let event = Arc::new(Mutex::new(ModelEvent::for_scope(scope.clone())));
        self.push_block(BlockedEntry {
            aspect,
            file,
            event: event.clone(),
        });
        let context = TransactionContext::new(self, id, aspect, scope.clone(), event.clone());
        let outcome = catch_panic(AssertUnwindSafe(move || body(&context)));
        self.pop_block();

        let mut failures = Vec::new();
        let mut cancelled = false;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) if e.is_cancellation() => cancelled = true,
            Ok(Err(e)) => {
                log::error!("Transaction {} on '{}' failed: {}", id, aspect, e);
                failures.push(e);
            }
            Err(panic) => {
                log::error!("Transaction {} on '{}' panicked: {}", id, aspect, panic);
                failures.push(ModelError::Panicked(panic));
            }
        }

        if !cancelled && failures.is_empty() {
            let event = std::mem::take(&mut *event.lock());
            match blocking {
                Some(outer) => {
                    log::debug!("Transaction {} on '{}' merged into blocking transaction", id, aspect);
                    outer.lock().merge(event);
                    self.stats.write().transactions_merged += 1;
                }
                None => {
                    self.update_dependants(&event, &mut failures);
                    self.notify_listeners(&event, &mut failures);
                    self.stats.write().transactions_committed += 1;
                }
            }
        }

        self.commit_transaction(id, scope.as_ref());

        if cancelled {
            self.stats.write().transactions_cancelled += 1;
            return Err(ModelError::Cancelled);
        }
        if !failures.is_empty() {
            self.stats.write().transactions_failed += 1;
        }
        match failures.len() {
            0 => Ok(()),
            1 => Err(failures.remove(0)),
            _ => Err(ModelError::Compound(failures)),
        }
    }

    fn start_transaction(&self, transaction: &Transaction<'_>) -> ModelResult<()> {
        let scope = transaction.scope().as_ref();
        if !scope.is_valid() {
            return Err(ModelError::IllegalState(format!(
                "change scope {:?} is not valid",
                scope
            )));
        }
        if self.config.check_document_committed && self.host.is_document_uncommitted(scope) {
            return Err(ModelError::IllegalState(format!(
                "document of {:?} has uncommitted changes",
                scope
            )));
        }
        if self.config.enforce_command_scope
            && scope.is_physical()
            && !self.host.is_command_active()
            && !self.host.is_undo_transparent_action()
        {
            return Err(ModelError::IncorrectOperation(
                "physical changes must happen inside a command or an undo-transparent action"
                    .to_string(),
            ));
        }
        self.host.start_transaction(scope);
        log::trace!("Starting transaction {} on '{}'", transaction.id(), transaction.aspect());
        Ok(())
    }

    fn commit_transaction(&self, id: TransactionId, scope: &dyn ChangeScope) {
        let outcome = catch_panic(AssertUnwindSafe(|| {
            let synced = self.host.commit_transaction(scope);
            self.host.reparse_other_views(scope);
            self.host.after_children_changed(scope);
            synced
        }));
        match outcome {
            Ok(synced) => log::trace!("Committed transaction {} (document synced: {})", id, synced),
            Err(panic) => log::error!("Commit housekeeping for transaction {} panicked: {}", id, panic),
        }
    }

    /// Innermost running transaction on this thread that must absorb a new
    /// transaction on `aspect` in `file`
    ///
    /// Dependants of `aspect` are tried in order; for each, the block stack is
    /// scanned from the most recent entry.
    fn blocking_transaction(
        &self,
        aspect: AspectId,
        file: Option<FileId>,
    ) -> Option<Arc<Mutex<ModelEvent>>> {
        let file = file?;
        let dependants = self.dependants(aspect);
        let blocked = self.blocked.lock();
        let stack = blocked.get(&thread::current().id())?;
        dependants.iter().find_map(|dependant| {
            stack
                .iter()
                .rev()
                .find(|entry| entry.aspect == *dependant && entry.file == Some(file))
                .map(|entry| entry.event.clone())
        })
    }

    fn push_block(&self, entry: BlockedEntry) {
        self.blocked
            .lock()
            .entry(thread::current().id())
            .or_default()
            .push(entry);
    }

    fn pop_block(&self) {
        let mut blocked = self.blocked.lock();
        let thread = thread::current().id();
        if let Some(stack) = blocked.get_mut(&thread) {
            stack.pop();
            if stack.is_empty() {
                blocked.remove(&thread);
            }
        }
    }

    fn update_dependants(&self, event: &ModelEvent, failures: &mut Vec<ModelError>) {
        let changed = event.changed_aspects();
        let targets: Vec<(AspectId, Arc<dyn Aspect>)> = {
            let graph = self.graph.read();
            let mut dependants: Vec<AspectId> = Vec::new();
            for aspect in &changed {
                for dependant in graph.dependants(*aspect) {
                    if !dependants.contains(dependant) {
                        dependants.push(*dependant);
                    }
                }
            }
            dependants
                .into_iter()
                .filter(|d| !changed.contains(d))
                .filter_map(|d| graph.aspect(d).map(|a| (d, a)))
                .collect()
        };

        for (id, aspect) in targets {
            if let Err(panic) = catch_panic(AssertUnwindSafe(|| aspect.update(event))) {
                log::error!("Aspect '{}' panicked during update: {}", id, panic);
                failures.push(ModelError::Panicked(panic));
            }
            self.stats.write().dependant_updates += 1;
        }
    }

    fn notify_listeners(&self, event: &ModelEvent, failures: &mut Vec<ModelError>) {
        let changed = event.changed_aspects();
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .map(|entry| (entry.id, entry.listener.clone()))
            .collect();

        for (id, listener) in listeners {
            let outcome = catch_panic(AssertUnwindSafe(|| {
                let interested = changed
                    .iter()
                    .any(|aspect| listener.is_aspect_change_interesting(*aspect));
                if interested {
                    listener.model_changed(event);
                }
                interested
            }));
            match outcome {
                Ok(true) => self.stats.write().listener_notifications += 1,
                Ok(false) => {}
                Err(panic) => {
                    log::error!("Model listener {} panicked: {}", id, panic);
                    failures.push(ModelError::Panicked(panic));
                }
            }
        }
    }

    /// Snapshot of transaction statistics
    pub fn stats(&self) -> ModelStats {
        self.stats.read().clone()
    }
}

impl Default for PomModel {
    fn default() -> Self {
        Self::new(ModelConfig::default())
    }
}

impl AspectRegistrator for PomModel {
    fn register(
        &self,
        id: AspectId,
        aspect: Arc<dyn Aspect>,
        dependencies: &[AspectId],
    ) -> ModelResult<()> {
        self.register_aspect(id, aspect, dependencies)
    }

    fn model_aspect(&self, id: AspectId) -> Option<Arc<dyn Aspect>> {
        self.aspect(id)
    }
}

impl fmt::Debug for PomModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PomModel")
            .field("aspects", &self.registered_aspects())
            .field("listeners", &self.listener_count())
            .field("modification_allowed", &self.is_modification_allowed())
            .finish()
    }
}

struct RestoreFlag<'a> {
    flag: &'a AtomicBool,
    previous: bool,
}

impl Drop for RestoreFlag<'_> {
    fn drop(&mut self) {
        self.flag.store(self.previous, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChangeLog;
    use crate::host::FileScope;
    use crate::listener::AspectListener;
    use std::sync::atomic::AtomicU32;

    const TREE: AspectId = AspectId::named("tree");
    const LANGUAGE: AspectId = AspectId::named("language");

    struct Plain;
    impl Aspect for Plain {}

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<&'static str>>,
        no_command: AtomicBool,
        no_write_access: AtomicBool,
        uncommitted: AtomicBool,
    }

    impl TransactionHost for RecordingHost {
        fn is_write_access_allowed(&self) -> bool {
            !self.no_write_access.load(Ordering::SeqCst)
        }

        fn is_command_active(&self) -> bool {
            !self.no_command.load(Ordering::SeqCst)
        }

        fn is_document_uncommitted(&self, _scope: &dyn ChangeScope) -> bool {
            self.uncommitted.load(Ordering::SeqCst)
        }

        fn start_transaction(&self, _scope: &dyn ChangeScope) {
            self.calls.lock().push("start");
        }

        fn commit_transaction(&self, _scope: &dyn ChangeScope) -> bool {
            self.calls.lock().push("commit");
            true
        }

        fn reparse_other_views(&self, _scope: &dyn ChangeScope) {
            self.calls.lock().push("reparse");
        }

        fn after_children_changed(&self, _scope: &dyn ChangeScope) {
            self.calls.lock().push("children");
        }
    }

    fn file_scope(n: u64) -> Arc<dyn ChangeScope> {
        Arc::new(FileScope::file(FileId::from_raw(n)))
    }

    fn model_with(host: Arc<RecordingHost>) -> PomModel {
        let model = PomModel::with_host(ModelConfig::default(), host);
        model.register_aspect(TREE, Arc::new(Plain), &[]).unwrap();
        model.register_aspect(LANGUAGE, Arc::new(Plain), &[TREE]).unwrap();
        model
    }

    fn touch(aspect: AspectId) -> impl FnOnce(&TransactionContext<'_>) -> ModelResult<()> {
        move |ctx| {
            ctx.record(aspect, ChangeLog::single("edit"));
            Ok(())
        }
    }

    #[test]
    fn test_housekeeping_order() {
        let host = Arc::new(RecordingHost::default());
        let model = model_with(host.clone());

        model.run_transaction(Transaction::new(TREE, file_scope(1), touch(TREE))).unwrap();

        assert_eq!(*host.calls.lock(), vec!["start", "commit", "reparse", "children"]);
        assert_eq!(model.transaction_depth(), 0);
    }

    #[test]
    fn test_physical_change_outside_command_rejected() {
        let host = Arc::new(RecordingHost::default());
        host.no_command.store(true, Ordering::SeqCst);
        let model = model_with(host.clone());

        let err = model
            .run_transaction(Transaction::new(TREE, file_scope(1), touch(TREE)))
            .unwrap_err();
        assert!(matches!(err, ModelError::IncorrectOperation(_)));
        assert!(host.calls.lock().is_empty());

        // Non-physical copies are exempt
        let copy: Arc<dyn ChangeScope> = Arc::new(FileScope::file(FileId::from_raw(1)).non_physical());
        model.run_transaction(Transaction::new(TREE, copy, touch(TREE))).unwrap();
    }

    #[test]
    fn test_invalid_scope_and_uncommitted_document_rejected() {
        let host = Arc::new(RecordingHost::default());
        let model = model_with(host.clone());

        let scope = Arc::new(FileScope::file(FileId::from_raw(1)));
        scope.invalidate();
        let err = model
            .run_transaction(Transaction::new(TREE, scope, touch(TREE)))
            .unwrap_err();
        assert!(matches!(err, ModelError::IllegalState(_)));

        host.uncommitted.store(true, Ordering::SeqCst);
        let err = model
            .run_transaction(Transaction::new(TREE, file_scope(1), touch(TREE)))
            .unwrap_err();
        assert!(matches!(err, ModelError::IllegalState(_)));

        let relaxed = PomModel::with_host(ModelConfig::relaxed(), host);
        relaxed
            .run_transaction(Transaction::new(TREE, file_scope(1), |_| Ok(())))
            .unwrap();
    }

    #[test]
    fn test_guard_blocks_and_restores() {
        let model = PomModel::default();
        model.register_aspect(TREE, Arc::new(Plain), &[]).unwrap();

        let inside = model
            .guard_modifications_in(|| {
                model.run_transaction(Transaction::new(TREE, file_scope(1), touch(TREE)))
            })
            .unwrap();
        assert!(matches!(inside, Err(ModelError::ModificationNotAllowed)));
        assert!(model.is_modification_allowed());

        let nested = model
            .guard_modifications_in(|| {
                model.guard_modifications_in(|| ()).unwrap();
                model.is_modification_allowed()
            })
            .unwrap();
        assert!(!nested);
        assert!(model.is_modification_allowed());
    }

    #[test]
    fn test_guard_restores_after_panic() {
        let model = PomModel::default();
        let result = catch_panic(AssertUnwindSafe(|| {
            let _ = model.guard_modifications_in(|| panic!("save listener exploded"));
        }));
        assert!(result.is_err());
        assert!(model.is_modification_allowed());
    }

    #[test]
    fn test_guard_requires_write_access() {
        let host = Arc::new(RecordingHost::default());
        host.no_write_access.store(true, Ordering::SeqCst);
        let model = model_with(host);
        let err = model.guard_modifications_in(|| ()).unwrap_err();
        assert!(matches!(err, ModelError::IllegalState(_)));
    }

    #[test]
    fn test_guards_are_per_model() {
        let first = PomModel::default();
        let second = PomModel::default();
        first
            .guard_modifications_in(|| assert!(second.is_modification_allowed()))
            .unwrap();
    }

    #[test]
    fn test_body_runs_non_cancelable() {
        let token = CancellationToken::new();
        token.cancel();
        let model = PomModel::default().with_cancellation(token.clone());
        model.register_aspect(TREE, Arc::new(Plain), &[]).unwrap();

        model
            .run_transaction(Transaction::new(TREE, file_scope(1), |ctx| {
                assert!(ctx.model().cancellation().in_non_cancelable_section());
                ctx.model().cancellation().check_cancelled()?;
                Ok(())
            }))
            .unwrap();
        assert!(token.check_cancelled().is_err());
    }

    #[test]
    fn test_cancelled_body_still_commits_housekeeping() {
        let host = Arc::new(RecordingHost::default());
        let model = model_with(host.clone());
        let notified = Arc::new(AtomicU32::new(0));
        let n = notified.clone();
        model.add_model_listener(Arc::new(AspectListener::new([TREE], move |_| {
            n.fetch_add(1, Ordering::SeqCst);
        })));

        let err = model
            .run_transaction(Transaction::new(TREE, file_scope(1), |ctx| {
                ctx.record(TREE, ChangeLog::single(1u8));
                Err(ModelError::Cancelled)
            }))
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(notified.load(Ordering::SeqCst), 0);
        assert!(host.calls.lock().contains(&"commit"));
        assert_eq!(model.stats().transactions_cancelled, 1);
    }

    #[test]
    fn test_scoped_listener_removed_on_dispose() {
        let model = PomModel::default();
        let scope = DisposalScope::new("view");
        let listener = Arc::new(AspectListener::new([TREE], |_| {}));
        let id = model.add_model_listener_scoped(listener, &scope);
        assert_eq!(model.listener_count(), 1);

        scope.dispose();
        assert_eq!(model.listener_count(), 0);
        assert!(!model.remove_model_listener(id));
    }

    #[test]
    fn test_removing_scoped_listener_releases_scope_slot() {
        let model = PomModel::default();
        let scope = DisposalScope::new("view");
        let quiet = || Arc::new(AspectListener::new([TREE], |_: &ModelEvent| {}));
        let first = model.add_model_listener_scoped(quiet(), &scope);
        let second = model.add_model_listener_scoped(quiet(), &scope);
        assert_eq!(scope.len(), 2);

        assert!(model.remove_model_listener(first));
        assert_eq!(scope.len(), 1);
        assert_eq!(model.listener_count(), 1);

        scope.dispose();
        assert_eq!(model.listener_count(), 0);
        assert!(!model.remove_model_listener(second));
    }

    #[test]
    fn test_scoped_listener_on_disposed_scope_is_dropped() {
        let model = PomModel::default();
        let scope = DisposalScope::new("closed");
        scope.dispose();

        let listener = Arc::new(AspectListener::new([TREE], |_: &ModelEvent| {}));
        model.add_model_listener_scoped(listener, &scope);
        assert_eq!(model.listener_count(), 0);
    }

    #[test]
    fn test_providers_register_in_order() {
        struct TreeProvider;
        impl AspectProvider for TreeProvider {
            fn register(&self, registrator: &dyn AspectRegistrator) -> ModelResult<()> {
                registrator.register(TREE, Arc::new(Plain), &[])
            }
        }

        struct LanguageProvider;
        impl AspectProvider for LanguageProvider {
            fn register(&self, registrator: &dyn AspectRegistrator) -> ModelResult<()> {
                if registrator.model_aspect(TREE).is_none() {
                    return Err(ModelError::IllegalState("tree aspect missing".into()));
                }
                registrator.register(LANGUAGE, Arc::new(Plain), &[TREE])
            }
        }

        let model = PomModel::default();
        let providers: [&dyn AspectProvider; 2] = [&TreeProvider, &LanguageProvider];
        model.register_providers(providers).unwrap();

        assert_eq!(model.registered_aspects(), vec![TREE, LANGUAGE]);
        assert_eq!(model.incidence(LANGUAGE), vec![TREE, LANGUAGE]);
    }
}
