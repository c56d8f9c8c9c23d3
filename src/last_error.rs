//! Last-error slot for callers on the far side of a sentinel boundary.
//!
//! The slot is per thread: a failure on one thread is never reported to
//! another. Every `api` call except [`get_last_error`] and
//! [`clear_last_error`] empties the slot on entry, so after a failure
//! followed by a success the slot is empty again.

use std::cell::RefCell;

thread_local! {
    static LAST_ERROR: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Overwrite the calling thread's slot.
pub fn record(message: impl Into<String>) {
    let message = message.into();
    LAST_ERROR.with(|slot| *slot.borrow_mut() = Some(message));
}

/// The calling thread's pending diagnostic, without clearing it.
pub fn get_last_error() -> Option<String> {
    LAST_ERROR.with(|slot| slot.borrow().clone())
}

pub fn clear_last_error() {
    LAST_ERROR.with(|slot| *slot.borrow_mut() = None);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_get_clear() {
        clear_last_error();
        assert_eq!(get_last_error(), None);

        record("Open failed: no such device");
        assert_eq!(get_last_error().as_deref(), Some("Open failed: no such device"));
        // reading does not clear
        assert!(get_last_error().is_some());

        clear_last_error();
        assert_eq!(get_last_error(), None);
    }

    #[test]
    fn test_slot_is_per_thread() {
        record("Write failed: port not open");
        let other = std::thread::spawn(get_last_error).join().unwrap();
        assert_eq!(other, None);
        assert!(get_last_error().is_some());
        clear_last_error();
    }
}
