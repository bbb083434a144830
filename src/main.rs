//! Fistborn training assistant.
//!
//! Watches a fixed region at the center of the screen, recognizes which
//! stat name and key glyph the training UI shows, and prompts the operator
//! what to do next. Detection only: no key press or click is ever sent.
//!
//! Usage: fistborn-trainer [TARGET_STAT [HOLD_SECONDS [INTERVAL_MS [MAX_CYCLES]]]]
//! Anything not given on the command line comes from config.json next to
//! the executable.

mod capture;
mod config;
mod cycle;
mod logging;
mod notify;
mod paths;
mod recognition;
mod region;

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};

use capture::create_frame_source;
use config::{AppConfig, RunParams, parse_numeric};
use cycle::{CycleEngine, CycleSettings, CycleTiming, EngineDeps};
use logging::{FileLog, LogSink};
use notify::ConsoleStatus;
use recognition::ocr::TesseractReader;
use recognition::{Recognizer, RecognizerConfig, TemplateSet};

fn main() -> Result<()> {
    let log: Arc<dyn LogSink> = Arc::new(FileLog::new(paths::get_log_path()));
    let config = AppConfig::load_or_default(&paths::get_config_path(), log.as_ref());

    let params = run_params_from_args(&config)?;

    let words_dir = paths::get_exe_dir().join(&config.words_dir);
    let keys_dir = paths::get_exe_dir().join(&config.keys_dir);
    let word_templates = Arc::new(TemplateSet::load_from_dir(&words_dir, log.as_ref()));
    let key_templates = Arc::new(TemplateSet::load_from_dir(&keys_dir, log.as_ref()));
    log.append(&format!(
        "Loaded {} word templates from {}, {} key templates from {}",
        word_templates.len(),
        words_dir.display(),
        key_templates.len(),
        keys_dir.display()
    ));
    if word_templates.is_empty() && key_templates.is_empty() {
        log.append("No templates found; recognition relies on the OCR fallback");
    }

    let recognizer = Arc::new(Recognizer::new(
        Box::new(TesseractReader::new()),
        Arc::clone(&log),
        RecognizerConfig {
            default_threshold: config.thresholds.general,
            ocr_cutoff: config.ocr_luminance_cutoff,
            ocr_fallback: config.ocr_fallback,
        },
    ));

    let deps = EngineDeps {
        frames: create_frame_source(),
        recognizer,
        word_templates,
        key_templates,
        status: Arc::new(ConsoleStatus),
        log: Arc::clone(&log),
    };
    let settings = CycleSettings {
        region: config.region,
        thresholds: config.thresholds,
        timing: CycleTiming::for_params(&params),
    };
    let engine = CycleEngine::new(deps, params.clone(), settings);

    log.append(&format!(
        "Monitoring started: target {}, press window {}s, sample interval {}ms",
        params.target_stat, params.hold_seconds, params.interval_ms
    ));
    engine.start();

    if params.max_cycles.is_some() {
        while engine.is_running() {
            std::thread::sleep(Duration::from_millis(50));
        }
    } else {
        println!("Press Enter to stop.");
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        log.append("User requested stop");
        engine.request_stop();
        while engine.is_running() {
            std::thread::sleep(Duration::from_millis(50));
        }
    }

    log.append(&format!("Stopped after {} cycles", engine.cycle_count()));
    Ok(())
}

/// Builds run parameters from the command line, falling back to config.json
/// for anything not given. All validation happens here, before the engine
/// exists.
fn run_params_from_args(config: &AppConfig) -> Result<RunParams> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let target = args
        .first()
        .map(String::as_str)
        .unwrap_or(&config.target_stat);
    let hold_seconds = match args.get(1) {
        Some(raw) => parse_numeric("press duration", raw)?,
        None => config.hold_seconds,
    };
    let interval_ms = match args.get(2) {
        Some(raw) => parse_numeric("press interval", raw)?,
        None => config.interval_ms,
    };
    let max_cycles = match args.get(3) {
        Some(raw) => Some(
            raw.parse::<u32>()
                .map_err(|_| anyhow!("cycle bound must be a whole number, got '{}'", raw))?,
        ),
        None => None,
    };

    RunParams::validate(target, hold_seconds, interval_ms, max_cycles)
}
