use std::{
    mem,
    sync::{Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;

use crate::{AllowlistError, LifecycleState};

#[derive(Debug)]
enum Inner<T> {
    Unstarted,
    Running(T),
    Stopping,
    Stopped,
}

/// Outcome of [`Lifecycle::begin_stop()`].
#[derive(Debug)]
pub(crate) enum StopTransition<T> {
    /// The caller is responsible for releasing running resources and must call [`Lifecycle::finish_stop()`].
    Stop(T),
    /// Another caller is stopping the lifecycle (or has already stopped it); the receiver is flipped to `true`
    /// once it's done.
    Wait(watch::Receiver<bool>),
}

/// Start / stop state machine holding resources of the running allowlist.
///
/// Transitions are performed synchronously under a mutex, so that the state can be inspected
/// from any thread and no lock is held across awaits.
#[derive(Debug)]
pub(crate) struct Lifecycle<T> {
    inner: Mutex<Inner<T>>,
    stopped_sender: watch::Sender<bool>,
}

impl<T> Default for Lifecycle<T> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner::Unstarted),
            stopped_sender: watch::channel(false).0,
        }
    }
}

impl<T> Lifecycle<T> {
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // Transitions never panic midway, so the state is consistent even if the lock is poisoned.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> LifecycleState {
        match &*self.lock() {
            Inner::Unstarted => LifecycleState::Unstarted,
            Inner::Running(_) => LifecycleState::Running,
            Inner::Stopping => LifecycleState::Stopping,
            Inner::Stopped => LifecycleState::Stopped,
        }
    }

    /// Transitions from `Unstarted` to `Running`, initializing running resources with `init`.
    /// `init` is not called if the transition is not allowed.
    pub fn start(&self, init: impl FnOnce() -> T) -> Result<(), AllowlistError> {
        let mut inner = self.lock();
        match *inner {
            Inner::Unstarted => { /* allowed transition */ }
            Inner::Running(_) => return Err(AllowlistError::AlreadyRunning),
            Inner::Stopping | Inner::Stopped => return Err(AllowlistError::AlreadyStopped),
        }
        *inner = Inner::Running(init());
        Ok(())
    }

    /// Transitions from `Running` to `Stopping`, handing running resources to the caller.
    /// Later callers get a completion signal instead.
    pub fn begin_stop(&self) -> Result<StopTransition<T>, AllowlistError> {
        let mut inner = self.lock();
        match mem::replace(&mut *inner, Inner::Stopping) {
            Inner::Running(resources) => Ok(StopTransition::Stop(resources)),
            Inner::Unstarted => {
                *inner = Inner::Unstarted;
                Err(AllowlistError::NotStarted)
            }
            prev @ (Inner::Stopping | Inner::Stopped) => {
                *inner = prev;
                Ok(StopTransition::Wait(self.stopped_sender.subscribe()))
            }
        }
    }

    /// Completes the transition started by [`Self::begin_stop()`] and wakes up waiting callers.
    pub fn finish_stop(&self) {
        *self.lock() = Inner::Stopped;
        self.stopped_sender.send_replace(true);
    }

    /// Waits until the lifecycle is fully stopped.
    pub async fn wait_stopped(mut stopped_receiver: watch::Receiver<bool>) {
        // The sender is owned by the lifecycle, which outlives the receiver's users.
        stopped_receiver.wait_for(|stopped| *stopped).await.ok();
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn lifecycle_transitions() {
        let lifecycle = Lifecycle::<u32>::default();
        assert_eq!(lifecycle.state(), LifecycleState::Unstarted);
        assert_matches!(lifecycle.begin_stop(), Err(AllowlistError::NotStarted));
        assert_eq!(lifecycle.state(), LifecycleState::Unstarted);

        lifecycle.start(|| 42).unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Running);
        let err = lifecycle
            .start(|| panic!("must not be initialized twice"))
            .unwrap_err();
        assert_matches!(err, AllowlistError::AlreadyRunning);

        assert_matches!(lifecycle.begin_stop(), Ok(StopTransition::Stop(42)));
        assert_eq!(lifecycle.state(), LifecycleState::Stopping);
        assert_matches!(lifecycle.start(|| 0), Err(AllowlistError::AlreadyStopped));

        let Ok(StopTransition::Wait(stopped_receiver)) = lifecycle.begin_stop() else {
            panic!("concurrent stop must wait for the first one");
        };
        assert!(!*stopped_receiver.borrow());
        let waiter = tokio::spawn(Lifecycle::<u32>::wait_stopped(stopped_receiver));
        tokio::task::yield_now().await;
        assert!(!waiter.is_finished());

        lifecycle.finish_stop();
        waiter.await.unwrap();
        assert_eq!(lifecycle.state(), LifecycleState::Stopped);
        let Ok(StopTransition::Wait(stopped_receiver)) = lifecycle.begin_stop() else {
            panic!("stopping a stopped lifecycle must be a no-op");
        };
        assert!(*stopped_receiver.borrow());
        assert_matches!(lifecycle.start(|| 0), Err(AllowlistError::AlreadyStopped));
    }
}
