use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Once, PoisonError, RwLock,
    },
    thread,
    time::{Duration, SystemTime},
};

use httpdate::HttpDate;
use lazy_static::lazy_static;

use crate::log;

lazy_static! {
    /// Stores updated date and time
    static ref DATE_TIME: RwLock<String> = RwLock::new(now());
}

static TIMER_ONCE: Once = Once::new();
static TIMER_RUNNING: AtomicBool = AtomicBool::new(false);

/// Value for the _Date_ header, e.g. `Mon, 29 Jan 2024 22:13:01 GMT`
///
/// Refreshed once a second by a background thread started on first use.
pub(crate) fn current() -> String {
    TIMER_ONCE.call_once(|| {
        match thread::Builder::new()
            .name("srv-date".into())
            .spawn(timer_thread)
        {
            Ok(_) => TIMER_RUNNING.store(true, Ordering::Release),
            Err(err) => {
                log::warn!("date timer not started: {err}");
                let _ = err;
            }
        }
    });

    if TIMER_RUNNING.load(Ordering::Acquire) {
        DATE_TIME
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    } else {
        now()
    }
}

#[inline]
fn now() -> String {
    HttpDate::from(SystemTime::now()).to_string()
}

fn timer_thread() {
    loop {
        thread::sleep(Duration::from_millis(1000));
        let http_date = now();
        *DATE_TIME.write().unwrap_or_else(PoisonError::into_inner) = http_date;
    }
}
