//! The channel registry and rendezvous engine.
//!
//! Every directed pair of task instances is a potential channel, interned
//! lazily into a compact [`ChannelId`] the first time either side addresses
//! it. The registry keeps one waiter set per channel for senders and
//! receivers, plus a global list of wildcard receivers (`x <- ?c`), and
//! commits exactly one match per completed operation.
//!
//! All matching state lives behind a single mutex. A task that cannot match
//! parks on the shared condvar with a waiter token; the committing side
//! moves the rendezvous result into that waiter's completion slot before
//! releasing the lock, so neither side ever observes a half-finished
//! exchange and no third party can claim either participant.

use std::{
    collections::{BTreeMap, HashMap, HashSet, VecDeque},
    io::Write,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::{Condvar, Mutex};

use crate::{
    error::RuntimeError,
    value::{ChannelId, MagicChannel, TaskId, Value},
};

/// How the engine picks among several eligible waiters.
///
/// `Fifo` takes the longest-waiting one, which is deterministic per registry
/// and starvation-free. `Seeded` draws from a splitmix generator so the
/// registry's choices are reproducible for a given seed; it exists for
/// shaking out order-dependent programs.
pub enum TieBreak {
    Fifo,
    Seeded(SplitMix64),
}

pub const SEED_ENV_VAR: &str = "CONKER_SEED";

impl TieBreak {
    pub fn from_env() -> Self {
        match std::env::var(SEED_ENV_VAR) {
            Ok(text) => match text.parse() {
                Ok(seed) => TieBreak::Seeded(SplitMix64::new(seed)),
                Err(_) => {
                    tracing::warn!("{SEED_ENV_VAR} is not an integer; using arrival order");
                    TieBreak::Fifo
                }
            },
            Err(_) => TieBreak::Fifo,
        }
    }

    /// Pick an index into a list of `len` eligible waiters, ordered oldest
    /// arrival first. `len` must be nonzero.
    fn pick(&mut self, len: usize) -> usize {
        match self {
            TieBreak::Fifo => 0,
            TieBreak::Seeded(rng) => (rng.next() % len as u64) as usize,
        }
    }
}

/// Sebastiano Vigna's splitmix64. A tie-break needs reproducibility, not
/// statistical quality, so this stays ten lines instead of a dependency.
pub struct SplitMix64(u64);

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^ (z >> 31)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
struct WaiterId(u64);

struct SendWaiter {
    value: Value,
    waiter: WaiterId,
    arrival: u64,
}

struct RecvWaiter {
    waiter: WaiterId,
}

struct WildcardWaiter {
    task: TaskId,
    waiter: WaiterId,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Shutdown {
    /// A task ran `exit`; the program is over and that's fine.
    Exit,
    /// A task hit a runtime error; everyone else is being torn down.
    Fault,
    /// Every live task is suspended and no rendezvous is possible.
    Deadlock,
}

impl Shutdown {
    fn to_error(self) -> RuntimeError {
        match self {
            Shutdown::Exit | Shutdown::Fault => RuntimeError::ExitRequested,
            Shutdown::Deadlock => RuntimeError::Deadlock,
        }
    }
}

struct RegistryState {
    /// Directed pair -> interned id, and the reverse table.
    pairs: HashMap<(TaskId, TaskId), ChannelId>,
    endpoints: Vec<(TaskId, TaskId)>,

    pending_sends: BTreeMap<ChannelId, VecDeque<SendWaiter>>,
    pending_receives: BTreeMap<ChannelId, VecDeque<RecvWaiter>>,
    wildcards: Vec<WildcardWaiter>,

    /// Completions for parked senders/receivers, keyed by waiter token.
    done_sends: HashSet<WaiterId>,
    done_receives: HashMap<WaiterId, (Value, ChannelId)>,

    live: usize,
    blocked: usize,
    shutdown: Option<Shutdown>,

    tie_break: TieBreak,
    next_waiter: u64,
    next_arrival: u64,
}

impl RegistryState {
    fn ensure_open(&self) -> Result<(), RuntimeError> {
        match self.shutdown {
            Some(s) => Err(s.to_error()),
            None => Ok(()),
        }
    }

    fn new_waiter(&mut self) -> WaiterId {
        self.next_waiter += 1;
        WaiterId(self.next_waiter)
    }

    fn next_arrival(&mut self) -> u64 {
        self.next_arrival += 1;
        self.next_arrival
    }

    fn intern(&mut self, from: TaskId, to: TaskId) -> ChannelId {
        if let Some(&id) = self.pairs.get(&(from, to)) {
            return id;
        }
        let id = ChannelId(self.endpoints.len() as u32);
        self.endpoints.push((from, to));
        self.pairs.insert((from, to), id);
        tracing::trace!(channel = id.0, %from, %to, "channel allocated");
        id
    }

    /// Is any (sender, receiver) pair in the waiter sets mutually
    /// satisfiable? With eager matching this should never be true by the
    /// time it is asked, but deadlock is only declared once it says no.
    fn rendezvous_possible(&self) -> bool {
        for (&channel, queue) in &self.pending_sends {
            if queue.is_empty() {
                continue;
            }
            if self
                .pending_receives
                .get(&channel)
                .is_some_and(|q| !q.is_empty())
            {
                return true;
            }
            let (from, to) = self.endpoints[channel.0 as usize];
            if self.wildcards.iter().any(|w| w.task == to && from != to) {
                return true;
            }
        }
        false
    }
}

pub struct Registry {
    state: Mutex<RegistryState>,
    wake: Condvar,
    stopping: AtomicBool,
    output: Mutex<Box<dyn Write + Send>>,
}

impl Registry {
    pub fn new(tie_break: TieBreak, output: Box<dyn Write + Send>) -> Self {
        Self {
            state: Mutex::new(RegistryState {
                pairs: HashMap::new(),
                endpoints: Vec::new(),
                pending_sends: BTreeMap::new(),
                pending_receives: BTreeMap::new(),
                wildcards: Vec::new(),
                done_sends: HashSet::new(),
                done_receives: HashMap::new(),
                live: 0,
                blocked: 0,
                shutdown: None,
                tie_break,
                next_waiter: 0,
                next_arrival: 0,
            }),
            wake: Condvar::new(),
            stopping: AtomicBool::new(false),
            output: Mutex::new(output),
        }
    }

    pub fn set_tie_break(&self, tie_break: TieBreak) {
        self.state.lock().tie_break = tie_break;
    }

    /// Record how many task instances are about to start. Deadlock
    /// detection compares this against the suspended count.
    pub fn begin(&self, task_count: usize) {
        self.state.lock().live = task_count;
    }

    /// A task's thread is done (normally or not). May tip the remaining
    /// tasks into deadlock.
    pub fn task_finished(&self) {
        let mut st = self.state.lock();
        st.live = st.live.saturating_sub(1);
        self.maybe_deadlock(&mut st);
    }

    /// The interned identity of the directed channel `from -> to`.
    pub fn channel_between(&self, from: TaskId, to: TaskId) -> ChannelId {
        self.state.lock().intern(from, to)
    }

    /// The two endpoints of an interned channel, `(producer, consumer)`.
    pub fn channel_endpoints(&self, id: ChannelId) -> (TaskId, TaskId) {
        self.state.lock().endpoints[id.0 as usize]
    }

    /// Synchronous send: rendezvous with a waiting receiver on `channel`,
    /// or with an eligible wildcard receiver, or suspend until a receiver
    /// arrives.
    pub fn send(&self, channel: ChannelId, value: Value) -> Result<(), RuntimeError> {
        let mut st = self.state.lock();
        st.ensure_open()?;

        // 1. A receiver already waiting on this exact channel
        if let Some(mut queue) = st.pending_receives.remove(&channel) {
            if let Some(receiver) = take_one(&mut queue, &mut st.tie_break) {
                if !queue.is_empty() {
                    st.pending_receives.insert(channel, queue);
                }
                st.blocked -= 1;
                st.done_receives.insert(receiver.waiter, (value, channel));
                tracing::trace!(channel = channel.0, "rendezvous: send met receiver");
                self.wake.notify_all();
                return Ok(());
            }
        }

        // 2. A wildcard receiver for which this send is a legal counterparty
        let (from, to) = st.endpoints[channel.0 as usize];
        let eligible: Vec<usize> = st
            .wildcards
            .iter()
            .enumerate()
            .filter(|(_, w)| w.task == to && from != to)
            .map(|(i, _)| i)
            .collect();
        if !eligible.is_empty() {
            let choice = st.tie_break.pick(eligible.len());
            let wildcard = st.wildcards.remove(eligible[choice]);
            st.blocked -= 1;
            st.done_receives.insert(wildcard.waiter, (value, channel));
            tracing::trace!(channel = channel.0, "rendezvous: send met wildcard");
            self.wake.notify_all();
            return Ok(());
        }

        // 3. Nobody's listening; park until somebody is
        let waiter = st.new_waiter();
        let arrival = st.next_arrival();
        st.pending_sends
            .entry(channel)
            .or_default()
            .push_back(SendWaiter {
                value,
                waiter,
                arrival,
            });
        st.blocked += 1;
        self.maybe_deadlock(&mut st);

        loop {
            if st.done_sends.remove(&waiter) {
                return Ok(());
            }
            if let Some(s) = st.shutdown {
                return Err(s.to_error());
            }
            self.wake.wait(&mut st);
        }
    }

    /// Synchronous receive on an explicit channel.
    pub fn receive(&self, channel: ChannelId) -> Result<Value, RuntimeError> {
        let mut st = self.state.lock();
        st.ensure_open()?;

        if let Some(mut queue) = st.pending_sends.remove(&channel) {
            if let Some(sender) = take_one(&mut queue, &mut st.tie_break) {
                if !queue.is_empty() {
                    st.pending_sends.insert(channel, queue);
                }
                st.blocked -= 1;
                st.done_sends.insert(sender.waiter);
                tracing::trace!(channel = channel.0, "rendezvous: receive met sender");
                self.wake.notify_all();
                return Ok(sender.value);
            }
        }

        let waiter = st.new_waiter();
        st.pending_receives
            .entry(channel)
            .or_default()
            .push_back(RecvWaiter { waiter });
        st.blocked += 1;
        self.maybe_deadlock(&mut st);

        loop {
            if let Some((value, _)) = st.done_receives.remove(&waiter) {
                return Ok(value);
            }
            if let Some(s) = st.shutdown {
                return Err(s.to_error());
            }
            self.wake.wait(&mut st);
        }
    }

    /// Binding receive: match any pending send addressed to `task`,
    /// reporting which channel the rendezvous happened on. If none is
    /// waiting, park as a wildcard.
    pub fn receive_any(&self, task: TaskId) -> Result<(Value, ChannelId), RuntimeError> {
        let mut st = self.state.lock();
        st.ensure_open()?;

        // Candidates are the oldest waiting send on each inbound channel
        let mut candidates: Vec<(ChannelId, u64)> = Vec::new();
        for (&channel, queue) in &st.pending_sends {
            let Some(front) = queue.front() else { continue };
            let (from, to) = st.endpoints[channel.0 as usize];
            if to == task && from != task {
                candidates.push((channel, front.arrival));
            }
        }
        if !candidates.is_empty() {
            candidates.sort_by_key(|&(_, arrival)| arrival);
            let choice = st.tie_break.pick(candidates.len());
            let channel = candidates[choice].0;
            let sender = st
                .pending_sends
                .get_mut(&channel)
                .and_then(|q| q.pop_front());
            if let Some(sender) = sender {
                st.blocked -= 1;
                st.done_sends.insert(sender.waiter);
                tracing::trace!(channel = channel.0, task = %task, "rendezvous: wildcard met sender");
                self.wake.notify_all();
                return Ok((sender.value, channel));
            }
        }

        let waiter = st.new_waiter();
        st.wildcards.push(WildcardWaiter { task, waiter });
        st.blocked += 1;
        self.maybe_deadlock(&mut st);

        loop {
            if let Some(done) = st.done_receives.remove(&waiter) {
                return Ok(done);
            }
            if let Some(s) = st.shutdown {
                return Err(s.to_error());
            }
            self.wake.wait(&mut st);
        }
    }

    /// Send to a magic endpoint. Always completes immediately; `$out` never
    /// blocks a sender.
    pub fn send_magic(&self, magic: MagicChannel, value: &Value) {
        match magic {
            MagicChannel::Out => {
                let mut out = self.output.lock();
                let _ = writeln!(out, "{value}");
                let _ = out.flush();
            }
        }
    }

    /// `exit` ran somewhere: wake every parked task and fail new
    /// operations with the cooperative shutdown signal.
    pub fn request_exit(&self) {
        self.stop(Shutdown::Exit);
    }

    /// A task faulted: tear the rest of the program down.
    pub fn fault(&self) {
        self.stop(Shutdown::Fault);
    }

    fn stop(&self, kind: Shutdown) {
        let mut st = self.state.lock();
        if st.shutdown.is_none() {
            st.shutdown = Some(kind);
            self.stopping.store(true, Ordering::Release);
            tracing::debug!(?kind, "shutting down");
            self.wake.notify_all();
        }
    }

    /// Fast cancellation probe, called between statements. Only touches the
    /// lock once a shutdown has actually been requested.
    pub fn check_shutdown(&self) -> Result<(), RuntimeError> {
        if !self.stopping.load(Ordering::Acquire) {
            return Ok(());
        }
        self.state.lock().ensure_open()
    }

    fn maybe_deadlock(&self, st: &mut RegistryState) {
        if st.shutdown.is_some() || st.live == 0 || st.blocked < st.live {
            return;
        }
        if st.rendezvous_possible() {
            return;
        }
        st.shutdown = Some(Shutdown::Deadlock);
        self.stopping.store(true, Ordering::Release);
        tracing::error!(
            tasks = st.live,
            "deadlock: every task is suspended and no rendezvous is possible"
        );
        self.wake.notify_all();
    }
}

/// Remove one waiter from a queue under the active tie-break policy. The
/// queue is in arrival order, so FIFO takes the front.
fn take_one<T>(queue: &mut VecDeque<T>, tie_break: &mut TieBreak) -> Option<T> {
    if queue.is_empty() {
        return None;
    }
    let index = tie_break.pick(queue.len());
    queue.remove(index)
}
