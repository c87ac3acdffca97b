//! # weft_pom - Program Object Model
//!
//! Transactional updates to an aspect-partitioned program model.
//!
//! ## Key Concepts
//!
//! - **Aspect**: one facet of the model, declaring the aspects it depends on
//! - **Transaction**: a body that changes one aspect within one change scope
//! - **Blocking transaction**: a running outer transaction on a dependant
//!   aspect in the same file; nested transactions merge into it instead of
//!   committing on their own
//! - **Listener**: notified once per committed transaction that touched an
//!   aspect it is interested in
//!
//! ```
//! use std::sync::Arc;
//! use weft_pom::*;
//!
//! struct Tree;
//! impl Aspect for Tree {}
//!
//! let model = PomModel::new(ModelConfig::relaxed());
//! let tree = AspectId::named("tree");
//! model.register_aspect(tree, Arc::new(Tree), &[]).unwrap();
//!
//! let scope: Arc<dyn ChangeScope> = Arc::new(FileScope::file(FileId::from_raw(1)));
//! model
//!     .run_transaction(Transaction::new(tree, scope, |ctx| {
//!         ctx.record(tree, ChangeLog::single("renamed"));
//!         Ok(())
//!     }))
//!     .unwrap();
//! assert_eq!(model.stats().transactions_committed, 1);
//! ```

pub mod aspect;
pub mod config;
pub mod error;
pub mod event;
pub mod host;
pub mod listener;
pub mod model;
pub mod transaction;

pub use aspect::{Aspect, AspectGraph, AspectId, AspectProvider, AspectRegistrator};
pub use config::ModelConfig;
pub use error::{ModelError, ModelResult};
pub use event::{ChangeLog, ChangeSet, ModelEvent};
pub use host::{ChangeScope, FileId, FileScope, NoopHost, TransactionHost};
pub use listener::{AspectListener, ListenerId, PomModelListener};
pub use model::{ModelStats, PomModel};
pub use transaction::{Transaction, TransactionContext, TransactionId};
