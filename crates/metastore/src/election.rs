use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Leadership is the handle returned by a successful campaign.
///
/// `is_leader` is a cheap atomic read and must be consulted before every
/// write of a scheduler pass: a pass already in flight may finish, but must
/// not mutate the store once the flag drops.
pub struct Leadership {
    flag: Arc<AtomicBool>,
    stop: Option<tokio::sync::oneshot::Sender<()>>,
}

impl Leadership {
    /// Leadership granted unconditionally, with no lease behind it. Used by
    /// the in-memory backend, where the process is the only writer.
    pub fn granted() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(true)),
            stop: None,
        }
    }

    pub(crate) fn with_keeper(flag: Arc<AtomicBool>, stop: tokio::sync::oneshot::Sender<()>) -> Self {
        Self {
            flag,
            stop: Some(stop),
        }
    }

    pub fn is_leader(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Voluntarily releases leadership. The lease keeper (if any) resigns
    /// the election and revokes its lease.
    pub fn resign(&mut self) {
        self.flag.store(false, Ordering::Relaxed);
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

impl Drop for Leadership {
    fn drop(&mut self) {
        self.resign();
    }
}
