//! The recognition-and-prompt cycle engine.
//!
//! One background worker thread owns the whole loop: capture, recognition,
//! timed prompts. The controller talks to it through three atomics: a
//! running flag, a cooperative cancel flag, and the cycle counter. Start is
//! idempotent while running; stop is honored at every phase boundary and
//! inside every wait.

pub mod state;
pub mod worker;

pub use state::CyclePhase;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use crate::capture::FrameSource;
use crate::config::{MatchThresholds, RunParams};
use crate::logging::LogSink;
use crate::notify::StatusSink;
use crate::recognition::{Recognition, TemplateSet};
use crate::region::RegionConfig;
use worker::CycleWorker;

/// Fixed delays and tick counts for one cycle.
#[derive(Clone, Debug)]
pub struct CycleTiming {
    /// Delay after the trigger prompt, before the first capture.
    pub settle: Duration,
    /// Ticks in the click-the-target countdown.
    pub click_countdown_ticks: u32,
    /// Length of one countdown tick.
    pub countdown_tick: Duration,
    /// Pause after a mismatched or missing stat detection.
    pub mismatch_pause: Duration,
    /// Sample interval inside the manual press window.
    pub press_tick: Duration,
    /// Ticks in the hold-key countdown.
    pub hold_ticks: u32,
    /// Pause when no key glyph was detected.
    pub key_missing_pause: Duration,
    /// Pause between cycles.
    pub cycle_pause: Duration,
    /// Cancel-flag poll granularity inside every wait.
    pub cancel_poll: Duration,
}

impl Default for CycleTiming {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(600),
            click_countdown_ticks: 5,
            countdown_tick: Duration::from_secs(1),
            mismatch_pause: Duration::from_millis(800),
            press_tick: Duration::from_millis(500),
            hold_ticks: 2,
            key_missing_pause: Duration::from_millis(700),
            cycle_pause: Duration::from_millis(800),
            cancel_poll: Duration::from_millis(50),
        }
    }
}

impl CycleTiming {
    /// The configured press interval becomes the press-window sample tick,
    /// clamped so cancellation latency stays sub-second.
    pub fn for_params(params: &RunParams) -> Self {
        Self {
            press_tick: Duration::from_millis((params.interval_ms as u64).clamp(100, 500)),
            ..Self::default()
        }
    }
}

/// Geometry, thresholds, and timing for the engine.
#[derive(Clone, Debug, Default)]
pub struct CycleSettings {
    pub region: RegionConfig,
    pub thresholds: MatchThresholds,
    pub timing: CycleTiming,
}

/// Everything the worker needs, injected at construction.
#[derive(Clone)]
pub struct EngineDeps {
    pub frames: Arc<dyn FrameSource>,
    pub recognizer: Arc<dyn Recognition>,
    pub word_templates: Arc<TemplateSet>,
    pub key_templates: Arc<TemplateSet>,
    pub status: Arc<dyn StatusSink>,
    pub log: Arc<dyn LogSink>,
}

/// State shared between the controller and the worker thread.
pub struct EngineShared {
    pub running: AtomicBool,
    pub cancel: AtomicBool,
    pub cycles: AtomicU32,
}

impl EngineShared {
    fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            cycles: AtomicU32::new(0),
        }
    }
}

pub struct CycleEngine {
    shared: Arc<EngineShared>,
    deps: EngineDeps,
    params: RunParams,
    settings: CycleSettings,
}

impl CycleEngine {
    pub fn new(deps: EngineDeps, params: RunParams, settings: CycleSettings) -> Self {
        Self {
            shared: Arc::new(EngineShared::new()),
            deps,
            params,
            settings,
        }
    }

    /// Spawns the worker thread. A start request while already running is a
    /// no-op; the running cycle and its counter are untouched.
    pub fn start(&self) {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            self.deps.log.append("Start requested but the cycle is already running");
            return;
        }

        self.shared.cancel.store(false, Ordering::SeqCst);
        self.shared.cycles.store(0, Ordering::SeqCst);

        let shared = Arc::clone(&self.shared);
        let deps = self.deps.clone();
        let params = self.params.clone();
        let settings = self.settings.clone();
        thread::spawn(move || {
            let mut worker = CycleWorker::new(Arc::clone(&shared), deps, params, settings);
            worker.run();
            shared.running.store(false, Ordering::SeqCst);
        });
    }

    /// Requests a cooperative stop. The worker observes the flag within one
    /// poll interval and abandons the rest of the current cycle.
    pub fn request_stop(&self) {
        self.shared.cancel.store(true, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    /// Cycles completed in the current run.
    pub fn cycle_count(&self) -> u32 {
        self.shared.cycles.load(Ordering::SeqCst)
    }
}
