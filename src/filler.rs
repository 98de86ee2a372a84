//! Gap filling: speculative completion of positions left behind by slow or failed leaders.
//!
//! Every position below a watermark must eventually be decided, or the log stalls there forever. The filler does not
//! try to tell a dead leader from a slow one: it proposes a placeholder for every position it is told about, once
//! the fill delay has passed, and relies on the round to ignore the proposal if the position was already decided.
//! This runs all the time, not only during failures, so the takeover path is always exercised.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{at, never, select, unbounded, Receiver, Sender};

use crate::Seqn;

/// Spawns the filler thread, returning the channel on which watermarks are sent.
///
/// Positions from `floor` up to, but excluding, each watermark are handed to `fire` once `delay` has elapsed since
/// the watermark arrived. A position is handed over at most once. The thread exits when the sender is dropped,
/// dropping any fill still pending.
pub fn spawn<F>(floor: Seqn, delay: Duration, fire: F) -> Sender<Seqn>
where
    F: FnMut(Seqn) + Send + 'static,
{
    let (fill_until, recv) = unbounded();

    let _ = thread::spawn(move || fill(floor, delay, &recv, fire));

    fill_until
}

fn fill<F>(mut cursor: Seqn, delay: Duration, fill_until: &Receiver<Seqn>, mut fire: F)
where
    F: FnMut(Seqn),
{
    let mut timers: BinaryHeap<Reverse<(Instant, Seqn)>> = BinaryHeap::new();

    loop {
        let deadline = match timers.peek() {
            Some(Reverse((when, _))) => at(*when),
            None => never(),
        };

        select! {
            recv(fill_until) -> next => match next {
                Ok(next) => {
                    let when = Instant::now() + delay;
                    while cursor < next {
                        timers.push(Reverse((when, cursor)));
                        cursor += 1;
                    }
                    // the watermark itself is the proposer's own position
                    cursor = cursor.max(next.saturating_add(1));
                    log::debug!("filler armed until {}, {} pending", next, timers.len());
                }
                Err(_) => return,
            },
            recv(deadline) -> _ => {
                let now = Instant::now();
                while let Some(Reverse((when, seqn))) = timers.peek().copied() {
                    if when > now {
                        break;
                    }
                    timers.pop();
                    log::debug!("filler firing {}", seqn);
                    fire(seqn);
                }
            },
        }
    }
}
