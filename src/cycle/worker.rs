//! Per-cycle state machine, executed on the worker thread.
//!
//! Each `step()` handles one phase: it logs the transition, emits operator
//! prompts, and picks the next phase. Recognition-stage failures degrade to
//! "not detected" and the loop continues; only the cancel flag (or the
//! optional cycle bound) ends the run.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::{Duration, Instant};

use crate::config::{HOLD_KEY, KEY_GLYPHS, RunParams, STAT_NAMES, TRIGGER_KEY};
use crate::notify::StatusEvent;
use crate::recognition::RecognitionOutcome;
use crate::region::CaptureRegion;

use super::state::CyclePhase;
use super::{CycleSettings, EngineDeps, EngineShared};

pub(crate) struct CycleWorker {
    shared: Arc<EngineShared>,
    deps: EngineDeps,
    params: RunParams,
    settings: CycleSettings,
    phase: CyclePhase,
    /// Region computed at the word stage, reused for the key capture of the
    /// same cycle.
    region: Option<CaptureRegion>,
    detected_key: Option<String>,
}

impl CycleWorker {
    pub(crate) fn new(
        shared: Arc<EngineShared>,
        deps: EngineDeps,
        params: RunParams,
        settings: CycleSettings,
    ) -> Self {
        Self {
            shared,
            deps,
            params,
            settings,
            phase: CyclePhase::AwaitTrigger,
            region: None,
            detected_key: None,
        }
    }

    pub(crate) fn run(&mut self) {
        self.log("Worker loop started");
        while self.step() {}
        self.log("Worker loop stopped");
        self.status("Stopped");
    }

    /// Advances the state machine by one phase. Returns false when the loop
    /// is done.
    fn step(&mut self) -> bool {
        if self.cancelled() {
            if self.phase != CyclePhase::Stopped {
                self.log("Stop requested, abandoning the current cycle");
            }
            self.phase = CyclePhase::Stopped;
        }

        match self.phase {
            CyclePhase::Stopped => false,

            CyclePhase::AwaitTrigger => {
                let cycle = self.shared.cycles.load(Ordering::SeqCst) + 1;
                self.log(&format!(
                    "Cycle {}: instruct the operator to press {} once",
                    cycle, TRIGGER_KEY
                ));
                self.status(&format!("Press {} once now (manual step)", TRIGGER_KEY));
                // Give the on-screen UI time to react to the key press.
                self.wait(self.settings.timing.settle);
                self.phase = CyclePhase::DetectWord;
                true
            }

            CyclePhase::DetectWord => {
                let outcome = self.detect_word();
                match outcome.label {
                    Some(word) if word == self.params.target_stat => {
                        self.log(&format!(
                            "Detected stat {} (source: {}), matches target",
                            word, outcome.source
                        ));
                        self.status(&format!(
                            "Target '{}' detected, move the mouse to it and left-click",
                            word
                        ));
                        self.countdown(self.settings.timing.click_countdown_ticks, None, |i| {
                            format!("Move cursor and left-click the target now: {}s", i)
                        });
                        self.log("Ensure the chosen stat was clicked (manual action)");
                    }
                    Some(word) => {
                        self.log(&format!(
                            "Detected stat '{}' does not match target '{}', continuing",
                            word, self.params.target_stat
                        ));
                        self.status(&format!("Detected '{}', not the target. Continuing.", word));
                        self.wait(self.settings.timing.mismatch_pause);
                    }
                    None => {
                        self.log("No stat name detected in the capture region");
                        self.status("No stat detected. Make sure the training UI is open and centered.");
                        self.wait(self.settings.timing.mismatch_pause);
                    }
                }
                self.phase = CyclePhase::DetectKey;
                true
            }

            CyclePhase::DetectKey => {
                // Capture again: by now the key glyph has replaced the stat
                // name on screen.
                let outcome = self.detect_key();
                match &outcome.label {
                    Some(key) => {
                        self.log(&format!("Detected key: {} (source: {})", key, outcome.source));
                        self.status(&format!(
                            "Detected key: {}. Press it manually as instructed.",
                            key
                        ));
                    }
                    None => {
                        self.log("No key glyph detected");
                        self.status("No key detected. Ensure the training bar is visible.");
                        self.wait(self.settings.timing.key_missing_pause);
                    }
                }
                self.detected_key = outcome.label;
                self.phase = CyclePhase::PressWindow;
                true
            }

            CyclePhase::PressWindow => {
                if let Some(key) = self.detected_key.take() {
                    self.press_window(&key);
                } else {
                    self.log("Skipping the press window (no key detected)");
                }
                self.phase = CyclePhase::HoldWindow;
                true
            }

            CyclePhase::HoldWindow => {
                self.log(&format!(
                    "Instruction: hold {} for {} seconds (manual)",
                    HOLD_KEY, self.settings.timing.hold_ticks
                ));
                self.status(&format!(
                    "Hold '{}' for {} seconds now",
                    HOLD_KEY, self.settings.timing.hold_ticks
                ));
                self.countdown(self.settings.timing.hold_ticks, Some(100.0), |i| {
                    format!("Holding {}: {}s", HOLD_KEY, i)
                });
                self.progress(0.0, "");
                self.phase = CyclePhase::CycleDone;
                true
            }

            CyclePhase::CycleDone => {
                let done = self.shared.cycles.fetch_add(1, Ordering::SeqCst) + 1;
                self.log(&format!("Cycle {} finished", done));
                self.status("Cycle complete. Waiting before the next one.");

                if let Some(max) = self.params.max_cycles {
                    if done >= max {
                        self.log(&format!("Reached the configured bound of {} cycles", max));
                        self.phase = CyclePhase::Stopped;
                        return true;
                    }
                }

                self.wait(self.settings.timing.cycle_pause);
                self.phase = CyclePhase::AwaitTrigger;
                true
            }
        }
    }

    /// Recomputes the capture region from the live screen size, captures it,
    /// and recognizes a stat name.
    fn detect_word(&mut self) -> RecognitionOutcome {
        self.region = match self.deps.frames.screen_size() {
            Ok((sw, sh)) => Some(self.settings.region.resolve(sw, sh)),
            Err(e) => {
                self.log(&format!("Screen size query failed: {}", e));
                None
            }
        };
        self.recognize(STAT_NAMES, self.settings.thresholds.word, true)
    }

    fn detect_key(&mut self) -> RecognitionOutcome {
        self.recognize(KEY_GLYPHS, self.settings.thresholds.key, false)
    }

    fn recognize(
        &mut self,
        candidates: &[&str],
        threshold: f32,
        words: bool,
    ) -> RecognitionOutcome {
        let Some(region) = self.region else {
            return RecognitionOutcome::none();
        };
        let image = match self.deps.frames.capture(&region) {
            Ok(image) => image,
            Err(e) => {
                self.log(&format!("Capture failed: {}", e));
                return RecognitionOutcome::none();
            }
        };
        let templates = if words {
            &self.deps.word_templates
        } else {
            &self.deps.key_templates
        };
        self.deps
            .recognizer
            .recognize(&image, templates, candidates, Some(threshold))
    }

    /// Informational window while the operator presses the detected key.
    /// Emits progress at the configured sample tick; sends no input.
    fn press_window(&self, key: &str) {
        let hold = Duration::from_secs_f64(self.params.hold_seconds);
        self.log(&format!(
            "Start manual pressing: key {} for {}s, sampled every {}ms",
            key,
            self.params.hold_seconds,
            self.settings.timing.press_tick.as_millis()
        ));
        self.status(&format!(
            "Manual step: press and release '{}' repeatedly for {}s",
            key, self.params.hold_seconds
        ));

        let started = Instant::now();
        while started.elapsed() < hold && !self.cancelled() {
            let elapsed = started.elapsed();
            let percent = (elapsed.as_secs_f64() / hold.as_secs_f64() * 100.0).min(100.0) as f32;
            let remaining = hold.saturating_sub(elapsed).as_secs();
            self.progress(percent, &format!("Pressing {}: {}s left", key, remaining));
            if !self.wait(self.settings.timing.press_tick) {
                break;
            }
        }
        self.log("Manual pressing window finished");
    }

    /// Emits one status or progress line per tick, counting down. Each tick
    /// is cancellable.
    fn countdown(
        &self,
        ticks: u32,
        progress: Option<f32>,
        label: impl Fn(u32) -> String,
    ) {
        for remaining in (1..=ticks).rev() {
            if self.cancelled() {
                break;
            }
            let text = label(remaining);
            match progress {
                Some(p) => self.progress(p, &text),
                None => self.status(&text),
            }
            if !self.wait(self.settings.timing.countdown_tick) {
                break;
            }
        }
    }

    /// Bounded sleep inside a cancel-poll loop. Returns false when the wait
    /// was interrupted by a stop request.
    fn wait(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(self.settings.timing.cancel_poll));
        }
    }

    fn cancelled(&self) -> bool {
        self.shared.cancel.load(Ordering::SeqCst)
    }

    fn log(&self, msg: &str) {
        self.deps.log.append(msg);
    }

    fn status(&self, text: &str) {
        self.emit(StatusEvent::status(text));
    }

    fn progress(&self, percent: f32, text: &str) {
        self.emit(StatusEvent::progress(percent, text));
    }

    fn emit(&self, event: StatusEvent) {
        match event.progress_percent {
            Some(percent) => self.deps.status.on_progress(percent, &event.text),
            None => self.deps.status.on_status(&event.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::FrameSource;
    use crate::capture::stub::StubFrameSource;
    use crate::cycle::CycleTiming;
    use crate::logging::NullLog;
    use crate::notify::{RecordingSink, StatusSink};
    use crate::recognition::{Recognition, ScriptedRecognizer, TemplateSet};
    use anyhow::{Result, anyhow};
    use image::RgbaImage;

    fn fast_timing() -> CycleTiming {
        CycleTiming {
            settle: Duration::from_millis(1),
            click_countdown_ticks: 5,
            countdown_tick: Duration::from_millis(2),
            mismatch_pause: Duration::from_millis(1),
            press_tick: Duration::from_millis(2),
            hold_ticks: 2,
            key_missing_pause: Duration::from_millis(1),
            cycle_pause: Duration::from_millis(1),
            cancel_poll: Duration::from_millis(1),
        }
    }

    struct FailingFrames;

    impl FrameSource for FailingFrames {
        fn screen_size(&self) -> Result<(u32, u32)> {
            Ok((200, 100))
        }

        fn capture(&self, _region: &CaptureRegion) -> Result<RgbaImage> {
            Err(anyhow!("capture device unavailable"))
        }
    }

    /// Runs `max_cycles` cycles synchronously on the test thread.
    fn run_cycles(
        frames: Arc<dyn FrameSource>,
        word: Option<&'static str>,
        key: Option<&'static str>,
        target: &str,
        max_cycles: u32,
    ) -> (Arc<RecordingSink>, Arc<EngineShared>) {
        let shared = Arc::new(EngineShared {
            running: std::sync::atomic::AtomicBool::new(true),
            cancel: std::sync::atomic::AtomicBool::new(false),
            cycles: std::sync::atomic::AtomicU32::new(0),
        });
        let sink = Arc::new(RecordingSink::new());
        let deps = EngineDeps {
            frames,
            recognizer: Arc::new(ScriptedRecognizer::new(word, key)) as Arc<dyn Recognition>,
            word_templates: Arc::new(TemplateSet::empty()),
            key_templates: Arc::new(TemplateSet::empty()),
            status: Arc::clone(&sink) as Arc<dyn StatusSink>,
            log: Arc::new(NullLog),
        };
        let params = RunParams::validate(target, 0.05, 100.0, Some(max_cycles)).unwrap();
        let settings = CycleSettings {
            timing: fast_timing(),
            ..CycleSettings::default()
        };

        let mut worker = CycleWorker::new(Arc::clone(&shared), deps, params, settings);
        worker.run();
        (sink, shared)
    }

    fn stub() -> Arc<dyn FrameSource> {
        Arc::new(StubFrameSource::new(200, 100))
    }

    #[test]
    fn test_mismatched_target_never_enters_click_countdown() {
        let (sink, shared) = run_cycles(stub(), Some("STAMINA"), None, "STRENGTH", 1);
        assert_eq!(sink.count_containing("left-click"), 0);
        assert_eq!(sink.count_containing("not the target"), 1);
        assert_eq!(shared.cycles.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_matching_target_runs_the_fixed_countdown() {
        let (sink, _shared) = run_cycles(stub(), Some("STAMINA"), None, "STAMINA", 1);
        assert_eq!(
            sink.count_containing("Move cursor and left-click the target now"),
            5
        );
    }

    #[test]
    fn test_no_key_skips_the_press_window() {
        let (sink, _shared) = run_cycles(stub(), None, None, "STAMINA", 1);
        assert_eq!(sink.count_containing("Pressing"), 0);
        assert_eq!(sink.count_containing("No key detected"), 1);
    }

    #[test]
    fn test_detected_key_drives_press_progress() {
        let (sink, _shared) = run_cycles(stub(), None, Some("Q"), "STAMINA", 1);
        let presses: Vec<_> = sink
            .snapshot()
            .into_iter()
            .filter(|e| e.text.contains("Pressing Q"))
            .collect();
        assert!(!presses.is_empty());
        for event in &presses {
            let percent = event.progress_percent.expect("press ticks carry progress");
            assert!((0.0..=100.0).contains(&percent));
        }
    }

    #[test]
    fn test_hold_window_reports_full_progress() {
        let (sink, _shared) = run_cycles(stub(), None, None, "STAMINA", 1);
        let holds: Vec<_> = sink
            .snapshot()
            .into_iter()
            .filter(|e| e.text.contains("Holding"))
            .collect();
        assert_eq!(holds.len(), 2);
        assert!(holds.iter().all(|e| e.progress_percent == Some(100.0)));
    }

    #[test]
    fn test_capture_failure_degrades_and_cycle_completes() {
        let (sink, shared) = run_cycles(Arc::new(FailingFrames), Some("STAMINA"), None, "STAMINA", 1);
        assert_eq!(sink.count_containing("No stat detected"), 1);
        assert_eq!(sink.count_containing("left-click"), 0);
        assert_eq!(shared.cycles.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_counter_tracks_completed_cycles() {
        let (_sink, shared) = run_cycles(stub(), None, None, "STAMINA", 3);
        assert_eq!(shared.cycles.load(Ordering::SeqCst), 3);
    }
}
