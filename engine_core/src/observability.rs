use std::fmt;
use std::panic::{self, PanicHookInfo};
use std::sync::{Mutex, MutexGuard, OnceLock};

use crate::logging;

/// Last fatal condition seen by the process, kept so a front end can show it
/// after the fact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StickyError {
    pub context: String,
    pub message: String,
}

impl fmt::Display for StickyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.message)
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn sticky_cell() -> &'static Mutex<Option<StickyError>> {
    static STICKY: OnceLock<Mutex<Option<StickyError>>> = OnceLock::new();
    STICKY.get_or_init(|| Mutex::new(None))
}

pub fn set_sticky_error(context: impl Into<String>, message: impl Into<String>) {
    let sticky = StickyError {
        context: context.into(),
        message: message.into(),
    };
    logging::error(sticky.to_string());
    let mut guard = lock_unpoisoned(sticky_cell());
    *guard = Some(sticky);
}

pub fn clear_sticky_error() {
    let mut guard = lock_unpoisoned(sticky_cell());
    *guard = None;
}

pub fn sticky_error() -> Option<StickyError> {
    let guard = lock_unpoisoned(sticky_cell());
    guard.clone()
}

pub fn install_panic_hook() {
    static INSTALLED: OnceLock<()> = OnceLock::new();
    if INSTALLED.set(()).is_err() {
        return;
    }
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        set_sticky_error("panic", format_panic(info));
        default_hook(info);
    }));
}

fn format_panic(info: &PanicHookInfo<'_>) -> String {
    let payload = if let Some(text) = info.payload().downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = info.payload().downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic payload".to_string()
    };
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "<unknown>".to_string());
    format!("at {}: {}", location, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sticky_error_round_trip() {
        set_sticky_error("map load", "cannot open maps/missing.map");
        let sticky = sticky_error().expect("sticky error");
        assert_eq!(sticky.context, "map load");
        assert_eq!(sticky.to_string(), "map load: cannot open maps/missing.map");
        clear_sticky_error();
        assert!(sticky_error().is_none());
    }
}
