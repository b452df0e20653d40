// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use tokio::sync::Notify;

/// A cancel handle is shared between the scheduler and whatever is sounding a clip. It's the
/// output's responsibility to go quiet once it has been cancelled.
#[derive(Clone, Default)]
pub struct CancelHandle {
    /// Set to true once the underlying operation should be cancelled.
    cancelled: Arc<AtomicBool>,
    /// Wakes async waiters on cancellation.
    notify: Arc<Notify>,
}

impl CancelHandle {
    /// Creates a new cancel handle.
    pub fn new() -> CancelHandle {
        CancelHandle::default()
    }

    /// Returns true if the operation has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Cancels the operation. Cancelling twice does nothing.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.notify.notify_waiters();
        }
    }

    /// Resolves once the handle has been cancelled.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn test_cancel_handle_cancelled() {
        let cancel_handle = CancelHandle::new();
        assert!(!cancel_handle.is_cancelled());

        let join = {
            let cancel_handle = cancel_handle.clone();
            tokio::spawn(async move { cancel_handle.cancelled().await })
        };

        tokio::task::yield_now().await;
        cancel_handle.cancel();
        assert!(tokio::time::timeout(Duration::from_secs(1), join)
            .await
            .is_ok());
        assert!(cancel_handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_handle_already_cancelled() {
        let cancel_handle = CancelHandle::new();
        cancel_handle.cancel();
        cancel_handle.cancel();

        // Waiting after the fact must not hang.
        assert!(
            tokio::time::timeout(Duration::from_secs(1), cancel_handle.cancelled())
                .await
                .is_ok()
        );
    }
}
