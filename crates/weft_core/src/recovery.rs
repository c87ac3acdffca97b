//! Panic containment for user callbacks
//!
//! Listener and handler code is untrusted: a panic in one callback must not
//! unwind through the bus or the transaction runner.

use std::any::Any;
use std::panic::{self, UnwindSafe};

/// Extract a readable message from a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Run `f`, converting a panic into `Err(message)`
pub fn catch_panic<F, R>(f: F) -> Result<R, String>
where
    F: FnOnce() -> R + UnwindSafe,
{
    panic::catch_unwind(f).map_err(|payload| panic_message(payload.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_panic() {
        let result = catch_panic(|| 42);
        assert_eq!(result, Ok(42));

        let result: Result<i32, String> = catch_panic(|| {
            panic!("Test panic");
        });
        assert!(result.unwrap_err().contains("Test panic"));
    }

    #[test]
    fn test_panic_message_formats() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(owned.as_ref()), "owned");

        let other: Box<dyn Any + Send> = Box::new(7u32);
        assert_eq!(panic_message(other.as_ref()), "Unknown panic");
    }
}
