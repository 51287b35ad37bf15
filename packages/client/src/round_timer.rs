use std::time::Duration;

use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::state::ClientPhase;

/// Cancelable countdown gating the chat phase. Decrements once per tick
/// interval while the gate reads `Playing`; reaching zero is observable on
/// the `remaining` channel. Cancellation aborts the driving task so no tick
/// can land afterwards.
pub struct RoundTimer {
    handle: AbortHandle,
    remaining: watch::Receiver<u32>,
}

impl RoundTimer {
    pub fn start(ticks: u32, interval: Duration, gate: watch::Receiver<ClientPhase>) -> Self {
        let (sender, remaining) = watch::channel(ticks);

        let handle = tokio::spawn(async move {
            let mut left = ticks;
            let mut timer = tokio::time::interval(interval);
            // The first interval tick completes immediately.
            timer.tick().await;

            while left > 0 {
                timer.tick().await;
                if *gate.borrow() != ClientPhase::Playing {
                    // Safety net for a gate change the owner has not turned
                    // into a cancel yet; the unit is not consumed.
                    continue;
                }
                left -= 1;
                sender.send_replace(left);
            }
        })
        .abort_handle();

        RoundTimer { handle, remaining }
    }

    pub fn remaining(&self) -> u32 {
        *self.remaining.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.remaining.clone()
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }
}

impl Drop for RoundTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
