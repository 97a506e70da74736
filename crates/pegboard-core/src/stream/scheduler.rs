//! At-most-one-in-flight publish scheduling.

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SchedulerState {
    #[default]
    Idle,
    Scheduled,
}

/// Coalesces bursts of publish requests into one timer at a time.
///
/// While a timer is armed, further requests only set a pending flag. When
/// the timer fires the driver publishes; a pending request re-arms the timer
/// exactly once.
#[derive(Debug, Default)]
pub struct CoalescingScheduler {
    state: SchedulerState,
    pending: bool,
}

impl CoalescingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a publish request. Returns true when the caller must arm a timer.
    pub fn request(&mut self) -> bool {
        match self.state {
            SchedulerState::Idle => {
                self.state = SchedulerState::Scheduled;
                true
            }
            SchedulerState::Scheduled => {
                self.pending = true;
                false
            }
        }
    }

    /// Called when the armed timer fires. Returns true when the caller must
    /// re-arm because more requests arrived meanwhile.
    pub fn fire(&mut self) -> bool {
        if self.pending {
            self.pending = false;
            self.state = SchedulerState::Scheduled;
            true
        } else {
            self.state = SchedulerState::Idle;
            false
        }
    }

    pub fn cancel(&mut self) {
        self.state = SchedulerState::Idle;
        self.pending = false;
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_scheduled(&self) -> bool {
        self.state == SchedulerState::Scheduled
    }
}
