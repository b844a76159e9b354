use std::time::Duration;

use crate::{
    maneuver::{BodyPose, Maneuver, ManeuverStep},
    posture::otolith,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TreatmentState {
    Step(usize),
    Precautions,
    Done,
    Cancelled,
}

impl TreatmentState {
    pub fn is_finished(self) -> bool {
        matches!(self, TreatmentState::Done | TreatmentState::Cancelled)
    }
}

/// Per-step hold timer. Advisory only; it never gates navigation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Countdown {
    initial: Duration,
    remaining: Duration,
    running: bool,
}

impl Countdown {
    /// A stopped countdown loaded with `duration`.
    pub fn armed(duration: Duration) -> Self {
        Self {
            initial: duration,
            remaining: duration,
            running: false,
        }
    }

    pub fn toggle(&mut self) {
        if self.remaining.is_zero() {
            self.running = false;
            return;
        }
        self.running = !self.running;
    }

    pub fn reset(&mut self) {
        self.remaining = self.initial;
        self.running = false;
    }

    /// Returns `true` on the tick that reaches zero.
    pub fn tick(&mut self, dt: Duration) -> bool {
        if !self.running {
            return false;
        }
        self.remaining = self.remaining.saturating_sub(dt);
        if self.remaining.is_zero() {
            self.running = false;
            return true;
        }
        false
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    /// Whole seconds left, rounded up, for display.
    pub fn remaining_secs(&self) -> u64 {
        let secs = self.remaining.as_secs();
        if self.remaining.subsec_nanos() > 0 { secs + 1 } else { secs }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.remaining.is_zero()
    }

    pub fn elapsed_fraction(&self) -> f32 {
        if self.initial.is_zero() {
            return 1.0;
        }
        1.0 - self.remaining.as_secs_f32() / self.initial.as_secs_f32()
    }
}

/// Walks a maneuver one step per user action, then shows precautions.
#[derive(Clone, Debug)]
pub struct TreatmentSession {
    maneuver: Maneuver,
    state: TreatmentState,
    countdown: Countdown,
}

impl TreatmentSession {
    pub fn new(maneuver: Maneuver) -> Self {
        let first = maneuver.steps.first().map(ManeuverStep::duration);
        let countdown = Countdown::armed(first.unwrap_or_default());
        let state = if maneuver.steps.is_empty() {
            TreatmentState::Precautions
        } else {
            TreatmentState::Step(0)
        };
        log::info!("starting treatment `{}` ({} steps)", maneuver.id, maneuver.steps.len());
        Self {
            maneuver,
            state,
            countdown,
        }
    }

    pub fn maneuver(&self) -> &Maneuver {
        &self.maneuver
    }

    pub fn state(&self) -> TreatmentState {
        self.state
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn current_step(&self) -> Option<&ManeuverStep> {
        match self.state {
            TreatmentState::Step(idx) => self.maneuver.steps.get(idx),
            _ => None,
        }
    }

    fn enter_step(&mut self, idx: usize) {
        self.state = TreatmentState::Step(idx);
        self.countdown = Countdown::armed(self.maneuver.steps[idx].duration());
        log::debug!("treatment step {}/{}", idx + 1, self.maneuver.steps.len());
    }

    pub fn next(&mut self) -> TreatmentState {
        match self.state {
            TreatmentState::Step(idx) if idx + 1 < self.maneuver.steps.len() => self.enter_step(idx + 1),
            TreatmentState::Step(_) => self.state = TreatmentState::Precautions,
            TreatmentState::Precautions => {
                self.state = TreatmentState::Done;
                log::info!("treatment `{}` completed", self.maneuver.id);
            }
            TreatmentState::Done | TreatmentState::Cancelled => {}
        }
        self.state
    }

    pub fn previous(&mut self) -> TreatmentState {
        match self.state {
            TreatmentState::Step(idx) if idx > 0 => self.enter_step(idx - 1),
            TreatmentState::Step(_) => {
                self.state = TreatmentState::Cancelled;
                log::info!("treatment `{}` cancelled", self.maneuver.id);
            }
            TreatmentState::Precautions => {
                if let Some(last) = self.maneuver.steps.len().checked_sub(1) {
                    self.enter_step(last);
                }
            }
            TreatmentState::Done | TreatmentState::Cancelled => {}
        }
        self.state
    }

    pub fn toggle_timer(&mut self) {
        if matches!(self.state, TreatmentState::Step(_)) {
            self.countdown.toggle();
        }
    }

    pub fn reset_timer(&mut self) {
        if matches!(self.state, TreatmentState::Step(_)) {
            self.countdown.reset();
        }
    }

    /// Advances the countdown. Returns `true` when the current step's hold
    /// time has just elapsed.
    pub fn tick(&mut self, dt: Duration) -> bool {
        match self.state {
            TreatmentState::Step(_) => self.countdown.tick(dt),
            _ => false,
        }
    }

    /// Fraction of steps reached, counting the current one.
    pub fn progress(&self) -> f32 {
        let total = self.maneuver.steps.len().max(1) as f32;
        match self.state {
            TreatmentState::Step(idx) => (idx + 1) as f32 / total,
            TreatmentState::Precautions | TreatmentState::Done => 1.0,
            TreatmentState::Cancelled => 0.0,
        }
    }

    /// Pose the figure should move toward right now.
    pub fn target_pose(&self) -> BodyPose {
        self.current_step().map(|step| step.pose).unwrap_or(BodyPose::SEATED)
    }

    /// Where the crystals are along the canal path, from the countdown's
    /// elapsed share of the current step.
    pub fn stone_progress(&self) -> f32 {
        match self.current_step() {
            Some(step) => otolith::stone_progress(step, self.countdown.elapsed_fraction()),
            None => 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        maneuver::{Catalog, Protocol},
        types::{Language, Side},
    };

    fn epley() -> TreatmentSession {
        let catalog = Catalog::new(Language::En);
        TreatmentSession::new(catalog.lookup(Protocol::Epley, Side::Right).unwrap().clone())
    }

    #[test]
    fn test_next_while_timer_running_advances() {
        let mut session = epley();
        session.toggle_timer();
        assert!(session.countdown().is_running());
        session.tick(Duration::from_secs(3));

        assert_eq!(session.next(), TreatmentState::Step(1));
        assert!(!session.countdown().is_running());
        assert_eq!(session.countdown().remaining(), Duration::from_secs(60));
    }

    #[test]
    fn test_walks_through_precautions_to_done() {
        let mut session = epley();
        for expected in 1..5 {
            assert_eq!(session.next(), TreatmentState::Step(expected));
        }
        assert_eq!(session.next(), TreatmentState::Precautions);
        assert!(session.current_step().is_none());
        assert_eq!(session.target_pose(), BodyPose::SEATED);
        assert_eq!(session.progress(), 1.0);
        assert_eq!(session.next(), TreatmentState::Done);
        assert_eq!(session.next(), TreatmentState::Done);
        assert!(session.state().is_finished());
    }

    #[test]
    fn test_previous_from_first_step_cancels() {
        let mut session = epley();
        session.next();
        assert_eq!(session.previous(), TreatmentState::Step(0));
        assert_eq!(session.countdown().remaining(), Duration::from_secs(15));
        assert_eq!(session.previous(), TreatmentState::Cancelled);
        assert_eq!(session.next(), TreatmentState::Cancelled);
    }

    #[test]
    fn test_reset_restores_without_changing_step() {
        let mut session = epley();
        session.next();
        session.toggle_timer();
        session.tick(Duration::from_secs(20));
        assert_eq!(session.countdown().remaining_secs(), 40);

        session.reset_timer();
        assert_eq!(session.state(), TreatmentState::Step(1));
        assert_eq!(session.countdown().remaining(), Duration::from_secs(60));
        assert!(!session.countdown().is_running());
    }

    #[test]
    fn test_countdown_stops_at_zero() {
        let mut countdown = Countdown::armed(Duration::from_secs(2));
        assert!(!countdown.tick(Duration::from_secs(1)));
        countdown.toggle();
        assert!(!countdown.tick(Duration::from_millis(1500)));
        assert_eq!(countdown.remaining_secs(), 1);
        assert!(countdown.tick(Duration::from_secs(1)));
        assert!(countdown.is_finished());
        assert!(!countdown.is_running());

        countdown.toggle();
        assert!(!countdown.is_running());
    }

    #[test]
    fn test_stone_progress_tracks_countdown() {
        let mut session = epley();
        session.next();
        assert!((session.stone_progress() - 0.05).abs() < 1e-6);
        session.toggle_timer();
        session.tick(Duration::from_secs(30));
        assert!((session.stone_progress() - 0.2).abs() < 1e-4);
        assert!((session.progress() - 0.4).abs() < 1e-6);
    }
}
