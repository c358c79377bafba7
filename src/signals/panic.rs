//! Panic hook feeding the uncaught-error signal.

use std::any::Any;
use std::cell::Cell;
use std::panic::{self, Location};
use std::sync::Arc;

use super::events::{ErrorObject, UncaughtError};
use super::hub::SignalHub;
use crate::types::capture_stack;

thread_local! {
    static FORWARDING: Cell<bool> = const { Cell::new(false) };
}

/// Install a panic hook that dispatches every panic to `hub` as an uncaught
/// error, then runs the previously installed hook.
///
/// Each call chains another hook; install once per process.
pub fn install_panic_hook(hub: Arc<SignalHub>) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        forward_panic(&hub, info.payload(), info.location());
        previous(info);
    }));
}

fn forward_panic(hub: &SignalHub, payload: &(dyn Any + Send), location: Option<&Location<'_>>) {
    // A panic raised while this thread is already forwarding is not forwarded again.
    if FORWARDING.with(|f| f.replace(true)) {
        return;
    }

    let message = panic_message(payload);
    let mut event = UncaughtError::new(message.clone());
    if let Some(location) = location {
        event = event.with_location(location.file(), location.line(), location.column());
    }
    let stack = capture_stack();
    let mut error = ErrorObject::new(message);
    if !stack.is_empty() {
        error = error.with_stack(stack);
    }
    hub.dispatch_uncaught(&event.with_error(error));

    FORWARDING.with(|f| f.set(false));
}

/// Run `f` with panic forwarding disabled on this thread.
///
/// Panics raised by the reporting path itself (transports, subscriber
/// channels) must not come back in as new uncaught errors. The previous
/// state is restored on return and on unwind.
pub(crate) fn without_forwarding<R>(f: impl FnOnce() -> R) -> R {
    struct Restore(bool);

    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0;
            FORWARDING.with(|flag| flag.set(previous));
        }
    }

    let _restore = Restore(FORWARDING.with(|flag| flag.replace(true)));
    f()
}

/// Text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Box<dyn Any>".to_string()
    }
}
