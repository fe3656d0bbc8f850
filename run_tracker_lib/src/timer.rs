use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Instant,
};

/// Monotonic millisecond source.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        self.origin.elapsed().as_millis() as i64
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, millis: i64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerState {
    Stopped,
    Running { mark: i64 },
    Paused,
}

/// Elapsed time built from actual clock deltas, so a late tick never drifts the total.
pub struct ElapsedTimer {
    clock: Arc<dyn Clock>,
    accumulated: i64,
    state: TimerState,
}

impl ElapsedTimer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            accumulated: 0,
            state: TimerState::Stopped,
        }
    }

    /// Starts from zero.
    pub fn start(&mut self) {
        self.accumulated = 0;
        self.state = TimerState::Running { mark: self.clock.now_millis() };
    }

    /// Folds the time since the last mark into the total.
    pub fn tick(&mut self) {
        if let TimerState::Running { mark } = self.state {
            let now = self.clock.now_millis();
            // A clock that steps backwards contributes nothing
            self.accumulated += (now - mark).max(0);
            self.state = TimerState::Running { mark: now };
        }
    }

    pub fn pause(&mut self) {
        if matches!(self.state, TimerState::Running { .. }) {
            self.tick();
            self.state = TimerState::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.state == TimerState::Paused {
            self.state = TimerState::Running { mark: self.clock.now_millis() };
        }
    }

    pub fn reset(&mut self) {
        self.accumulated = 0;
        self.state = TimerState::Stopped;
    }

    pub fn elapsed_millis(&self) -> i64 {
        match self.state {
            TimerState::Running { mark } => self.accumulated + (self.clock.now_millis() - mark).max(0),
            _ => self.accumulated,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.state, TimerState::Running { .. })
    }
}
