use crate::domain::models::{PomodoroSettings, SessionStatus, StudySession};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MAX_PHASE_MINUTES: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PomodoroPhase {
    Work,
    ShortBreak,
    LongBreak,
}

impl PomodoroPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Work => "work",
            Self::ShortBreak => "shortBreak",
            Self::LongBreak => "longBreak",
        }
    }

    pub fn is_break(self) -> bool {
        matches!(self, Self::ShortBreak | Self::LongBreak)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroConfig {
    pub work_duration: u32,
    pub short_break: u32,
    pub long_break: u32,
    pub cycles_before_long_break: u32,
}

impl PomodoroConfig {
    pub const DEFAULT: Self = Self {
        work_duration: 25,
        short_break: 5,
        long_break: 15,
        cycles_before_long_break: 4,
    };

    pub fn is_valid(&self) -> bool {
        [self.work_duration, self.short_break, self.long_break]
            .iter()
            .all(|minutes| (1..=MAX_PHASE_MINUTES).contains(minutes))
            && self.cycles_before_long_break > 0
    }

    pub fn phase_seconds(&self, phase: PomodoroPhase) -> u32 {
        let minutes = match phase {
            PomodoroPhase::Work => self.work_duration,
            PomodoroPhase::ShortBreak => self.short_break,
            PomodoroPhase::LongBreak => self.long_break,
        };
        minutes * 60
    }

    /// Builds a config from raw session settings. If any field is missing or
    /// out of range the whole `fallback` is used (or `DEFAULT` if the fallback
    /// is itself invalid).
    pub fn resolve(settings: &PomodoroSettings, fallback: PomodoroConfig) -> ResolvedConfig {
        match Self::from_settings(settings) {
            Some(config) => ResolvedConfig {
                config,
                used_fallback: false,
            },
            None => ResolvedConfig {
                config: if fallback.is_valid() {
                    fallback
                } else {
                    Self::DEFAULT
                },
                used_fallback: true,
            },
        }
    }

    fn from_settings(settings: &PomodoroSettings) -> Option<Self> {
        Some(Self {
            work_duration: positive_minutes(settings.work_duration?)?,
            short_break: positive_minutes(settings.short_break?)?,
            long_break: positive_minutes(settings.long_break?)?,
            cycles_before_long_break: u32::try_from(settings.cycles_before_long_break?)
                .ok()
                .filter(|cycles| *cycles > 0)?,
        })
    }
}

impl Default for PomodoroConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub config: PomodoroConfig,
    pub used_fallback: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PhaseChange {
    pub completed: PomodoroPhase,
    pub phase: PomodoroPhase,
    pub cycle: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PomodoroSnapshot {
    pub phase: PomodoroPhase,
    pub cycle: u32,
    pub time_remaining: u32,
    pub running: bool,
    pub completed_work_intervals: u32,
}

#[derive(Debug, Clone)]
pub struct PomodoroEngine {
    config: PomodoroConfig,
    phase: PomodoroPhase,
    cycle: u32,
    time_remaining: u32,
    running: bool,
    stopped: bool,
    used_fallback: bool,
}

impl PomodoroEngine {
    pub fn new(config: PomodoroConfig, running: bool) -> Self {
        let (config, used_fallback) = if config.is_valid() {
            (config, false)
        } else {
            warn!(?config, "invalid pomodoro configuration; using defaults");
            (PomodoroConfig::DEFAULT, true)
        };

        Self {
            config,
            phase: PomodoroPhase::Work,
            cycle: 1,
            time_remaining: config.phase_seconds(PomodoroPhase::Work),
            running,
            stopped: false,
            used_fallback,
        }
    }

    pub fn for_session(session: &StudySession) -> Self {
        Self::for_session_with_fallback(session, PomodoroConfig::DEFAULT)
    }

    pub fn for_session_with_fallback(session: &StudySession, fallback: PomodoroConfig) -> Self {
        let resolved = PomodoroConfig::resolve(&session.pomodoro, fallback);
        if resolved.used_fallback {
            warn!(
                session_id = session.id,
                config = ?resolved.config,
                "pomodoro configuration missing or invalid; using fallback"
            );
        }

        let mut engine = Self::new(
            resolved.config,
            session.status == SessionStatus::InProgress,
        );
        engine.used_fallback |= resolved.used_fallback;
        engine
    }

    pub fn config(&self) -> PomodoroConfig {
        self.config
    }

    pub fn phase(&self) -> PomodoroPhase {
        self.phase
    }

    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    pub fn time_remaining(&self) -> u32 {
        self.time_remaining
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    pub fn used_fallback(&self) -> bool {
        self.used_fallback
    }

    /// Advances the countdown. Crosses as many phase boundaries as the delta
    /// covers and returns each change in order. Does nothing unless running.
    pub fn tick(&mut self, delta_seconds: u32) -> Vec<PhaseChange> {
        let mut changes = Vec::new();
        let mut pending = delta_seconds;

        while pending > 0 && self.running && !self.stopped {
            let step = pending.min(self.time_remaining);
            self.time_remaining -= step;
            pending -= step;
            if self.time_remaining == 0 {
                changes.push(self.complete_phase());
            }
        }

        changes
    }

    pub fn pause(&mut self) -> bool {
        if self.stopped || !self.running {
            return false;
        }
        self.running = false;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.stopped || self.running {
            return false;
        }
        self.running = true;
        true
    }

    pub fn reset(&mut self) {
        if self.stopped {
            return;
        }
        self.phase = PomodoroPhase::Work;
        self.cycle = 1;
        self.time_remaining = self.config.phase_seconds(PomodoroPhase::Work);
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.stopped = true;
    }

    pub fn completed_work_intervals(&self) -> u32 {
        let finished_before = self.cycle - 1;
        if self.phase.is_break() {
            finished_before + 1
        } else {
            finished_before
        }
    }

    pub fn snapshot(&self) -> PomodoroSnapshot {
        PomodoroSnapshot {
            phase: self.phase,
            cycle: self.cycle,
            time_remaining: self.time_remaining,
            running: self.running,
            completed_work_intervals: self.completed_work_intervals(),
        }
    }

    fn complete_phase(&mut self) -> PhaseChange {
        let completed = self.phase;
        match completed {
            PomodoroPhase::Work if self.cycle >= self.config.cycles_before_long_break => {
                self.phase = PomodoroPhase::LongBreak;
            }
            PomodoroPhase::Work => {
                self.phase = PomodoroPhase::ShortBreak;
            }
            PomodoroPhase::ShortBreak => {
                self.phase = PomodoroPhase::Work;
                self.cycle += 1;
            }
            PomodoroPhase::LongBreak => {
                self.phase = PomodoroPhase::Work;
                self.cycle = 1;
            }
        }
        self.time_remaining = self.config.phase_seconds(self.phase);

        debug!(
            completed = completed.as_str(),
            phase = self.phase.as_str(),
            cycle = self.cycle,
            "pomodoro phase complete"
        );

        PhaseChange {
            completed,
            phase: self.phase,
            cycle: self.cycle,
        }
    }
}

fn positive_minutes(value: i64) -> Option<u32> {
    u32::try_from(value)
        .ok()
        .filter(|minutes| (1..=MAX_PHASE_MINUTES).contains(minutes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::fixtures::sample_pomodoro_session;
    use proptest::prelude::*;

    fn running_engine() -> PomodoroEngine {
        PomodoroEngine::new(PomodoroConfig::DEFAULT, true)
    }

    fn finish_phase(engine: &mut PomodoroEngine) -> PhaseChange {
        let remaining = engine.time_remaining();
        let changes = engine.tick(remaining);
        assert_eq!(changes.len(), 1);
        changes[0]
    }

    #[test]
    fn initial_state_matches_config() {
        let engine = running_engine();
        assert_eq!(engine.phase(), PomodoroPhase::Work);
        assert_eq!(engine.cycle(), 1);
        assert_eq!(engine.time_remaining(), 25 * 60);
        assert!(engine.is_running());
        assert!(!engine.used_fallback());
    }

    #[test]
    fn engine_for_planned_session_starts_idle() {
        let session = sample_pomodoro_session();
        let mut engine = PomodoroEngine::for_session(&session);
        assert!(!engine.is_running());
        assert!(engine.tick(60).is_empty());
        assert_eq!(engine.time_remaining(), 25 * 60);
    }

    #[test]
    fn missing_or_invalid_settings_fall_back_to_defaults() {
        let mut session = sample_pomodoro_session();
        session.status = SessionStatus::InProgress;
        session.pomodoro.short_break = None;
        let engine = PomodoroEngine::for_session(&session);
        assert!(engine.used_fallback());
        assert_eq!(engine.config(), PomodoroConfig::DEFAULT);
        assert!(engine.is_running());

        session.pomodoro.short_break = Some(0);
        assert!(PomodoroEngine::for_session(&session).used_fallback());

        session.pomodoro.short_break = Some(-5);
        assert!(PomodoroEngine::for_session(&session).used_fallback());

        session.pomodoro.short_break = Some(10);
        let engine = PomodoroEngine::for_session(&session);
        assert!(!engine.used_fallback());
        assert_eq!(engine.config().short_break, 10);
    }

    #[test]
    fn invalid_fallback_uses_builtin_default() {
        let broken = PomodoroConfig {
            work_duration: 0,
            ..PomodoroConfig::DEFAULT
        };
        let resolved = PomodoroConfig::resolve(&PomodoroSettings::default(), broken);
        assert!(resolved.used_fallback);
        assert_eq!(resolved.config, PomodoroConfig::DEFAULT);

        let engine = PomodoroEngine::new(broken, true);
        assert!(engine.used_fallback());
        assert_eq!(engine.time_remaining(), 25 * 60);
    }

    #[test]
    fn four_work_phases_lead_to_long_break_then_reset_cycle() {
        let mut engine = running_engine();
        for expected_cycle in 1..=3 {
            assert_eq!(engine.cycle(), expected_cycle);
            let change = finish_phase(&mut engine);
            assert_eq!(change.phase, PomodoroPhase::ShortBreak);
            assert_eq!(engine.time_remaining(), 5 * 60);
            let change = finish_phase(&mut engine);
            assert_eq!(change.phase, PomodoroPhase::Work);
        }

        let change = finish_phase(&mut engine);
        assert_eq!(change.phase, PomodoroPhase::LongBreak);
        assert_eq!(engine.phase(), PomodoroPhase::LongBreak);
        assert_eq!(engine.cycle(), 4);
        assert_eq!(engine.time_remaining(), 15 * 60);
        assert_eq!(engine.completed_work_intervals(), 4);

        let change = finish_phase(&mut engine);
        assert_eq!(change.completed, PomodoroPhase::LongBreak);
        assert_eq!(engine.phase(), PomodoroPhase::Work);
        assert_eq!(engine.cycle(), 1);
        assert_eq!(engine.completed_work_intervals(), 0);
    }

    #[test]
    fn single_large_tick_reports_every_phase_change() {
        let mut engine = running_engine();
        let full_set = 4 * 25 * 60 + 3 * 5 * 60;
        let changes = engine.tick(full_set);
        assert_eq!(changes.len(), 7);
        assert_eq!(changes.last().map(|change| change.phase), Some(PomodoroPhase::LongBreak));
        assert_eq!(engine.cycle(), 4);
    }

    #[test]
    fn one_second_ticks_fire_on_reaching_zero() {
        let mut engine = running_engine();
        for _ in 0..(25 * 60 - 1) {
            assert!(engine.tick(1).is_empty());
        }
        assert_eq!(engine.time_remaining(), 1);
        let changes = engine.tick(1);
        assert_eq!(changes.len(), 1);
        assert_eq!(engine.phase(), PomodoroPhase::ShortBreak);
    }

    #[test]
    fn pause_and_resume_preserve_countdown() {
        let mut engine = running_engine();
        engine.tick(25 * 60 - 712);
        assert_eq!(engine.time_remaining(), 712);

        assert!(engine.pause());
        assert!(engine.tick(30).is_empty());
        assert_eq!(engine.time_remaining(), 712);

        assert!(engine.resume());
        assert_eq!(engine.time_remaining(), 712);
        assert_eq!(engine.phase(), PomodoroPhase::Work);
        assert!(!engine.resume());
    }

    #[test]
    fn stop_is_terminal() {
        let mut engine = running_engine();
        engine.tick(100);
        engine.stop();
        assert!(engine.is_stopped());
        assert!(!engine.resume());
        assert!(engine.tick(10_000).is_empty());
        engine.reset();
        assert_eq!(engine.time_remaining(), 25 * 60 - 100);
    }

    #[test]
    fn reset_returns_to_first_work_phase() {
        let mut engine = running_engine();
        finish_phase(&mut engine);
        finish_phase(&mut engine);
        engine.tick(42);
        engine.reset();
        assert_eq!(engine.phase(), PomodoroPhase::Work);
        assert_eq!(engine.cycle(), 1);
        assert_eq!(engine.time_remaining(), 25 * 60);
        assert!(engine.is_running());
    }

    #[test]
    fn snapshot_serializes_camel_case() {
        let mut engine = running_engine();
        finish_phase(&mut engine);
        let value = serde_json::to_value(engine.snapshot()).expect("serialize snapshot");
        assert_eq!(value["phase"], "shortBreak");
        assert_eq!(value["timeRemaining"], 300);
        assert_eq!(value["completedWorkIntervals"], 1);
    }

    #[test]
    fn phase_names_match_wire_format() {
        for phase in [
            PomodoroPhase::Work,
            PomodoroPhase::ShortBreak,
            PomodoroPhase::LongBreak,
        ] {
            let value = serde_json::to_value(phase).expect("serialize phase");
            assert_eq!(value, phase.as_str());
        }
    }

    proptest! {
        #[test]
        fn pause_resume_without_tick_is_lossless(elapsed in 0u32..(25 * 60 * 4)) {
            let mut engine = running_engine();
            engine.tick(elapsed);
            let before = engine.snapshot();

            engine.pause();
            engine.resume();

            prop_assert_eq!(engine.snapshot(), before);
        }

        #[test]
        fn long_break_follows_configured_cycle_count(cycles in 1u32..8u32) {
            let config = PomodoroConfig {
                work_duration: 1,
                short_break: 1,
                long_break: 2,
                cycles_before_long_break: cycles,
            };
            let mut engine = PomodoroEngine::new(config, true);

            for _ in 1..cycles {
                let change = finish_phase(&mut engine);
                prop_assert_eq!(change.phase, PomodoroPhase::ShortBreak);
                finish_phase(&mut engine);
            }
            let change = finish_phase(&mut engine);
            prop_assert_eq!(change.phase, PomodoroPhase::LongBreak);
            prop_assert_eq!(engine.cycle(), cycles);

            finish_phase(&mut engine);
            prop_assert_eq!(engine.cycle(), 1);
            prop_assert_eq!(engine.phase(), PomodoroPhase::Work);
        }
    }
}
