//! # weft_core - Weft Core
//!
//! Shared primitives for the message bus and the aspect model:
//! - **Ids**: cheap unique identifiers for buses, connections and listeners
//! - **Disposal scopes**: ownership trees that tear down subscriptions
//! - **Cancellation**: typed cancellation with non-cancelable sections
//! - **Recovery**: panic containment for user callbacks
//!
//! Nothing in here knows about topics or aspects.

pub mod cancel;
pub mod disposer;
pub mod error;
pub mod id;
pub mod logging;
pub mod recovery;

pub use cancel::{CancellationToken, NonCancelableGuard};
pub use disposer::{Disposable, DisposalScope, Registration};
pub use error::{CoreError, Result};
pub use id::{Id, IdGenerator};
pub use logging::{init_logging, init_test_logging};
pub use recovery::{catch_panic, panic_message};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cancel::CancellationToken;
    pub use crate::disposer::{Disposable, DisposalScope};
    pub use crate::error::{CoreError, Result};
    pub use crate::id::{Id, IdGenerator};
}
