//! copartner: desktop AI co-partner.
//!
//! Voice, chat and console input → command gate → intent router → two-pass
//! reply (draft, verify) → console or typed output. Chat replies are gated by
//! auto-reply and the operator's respond hotkeys.

mod console;
#[cfg(feature = "hotkeys")]
mod hotkey;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use copartner_core::config;
use copartner_core::speech;
use copartner_core::Orchestrator;

#[derive(Parser, Debug)]
#[command(name = "copartner", version, about = "Desktop AI co-partner with gated two-pass replies")]
struct Args {
    /// Config file (default: config.json next to the executable)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Start with auto-reply enabled
    #[arg(long)]
    auto_reply: bool,

    /// Don't register global hotkeys
    #[arg(long)]
    no_hotkeys: bool,

    /// Transcribe a WAV file and handle it as voice input before the text loop starts
    #[arg(long, value_name = "WAV")]
    transcribe: Option<PathBuf>,
}

fn init_logging() {
    // Log to both stderr and a file next to the exe for diagnostics.
    let log_file = std::fs::File::create(config::exe_dir().join("copartner.log")).ok();

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    builder.format_timestamp_secs();
    if let Some(file) = log_file {
        use std::io::Write;
        let file = std::sync::Mutex::new(file);
        builder.format(move |buf, record| {
            let line = format!(
                "[{} {} {}] {}\n",
                buf.timestamp_seconds(),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args(),
            );
            let _ = buf.write_all(line.as_bytes());
            if let Ok(mut f) = file.lock() {
                let _ = f.write_all(line.as_bytes());
                let _ = f.flush();
            }
            Ok(())
        });
    }
    builder.init();
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    if let Err(e) = run(args) {
        log::error!("Fatal: {e:#}");
        eprintln!("Error: {e:#}");
        return Err(e);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    log::info!("─── copartner v{} starting ───", env!("CARGO_PKG_VERSION"));

    let mut cfg = config::load_config(args.config.as_deref());
    if args.auto_reply {
        cfg.router.auto_reply = true;
    }
    log::info!(
        "Config: backend={}, offline_only={}, auto_reply={}, stt={}, output={}",
        cfg.backend.backend,
        cfg.backend.offline_only,
        cfg.router.auto_reply,
        cfg.stt.backend,
        cfg.output.backend,
    );

    let orchestrator = Orchestrator::start(&cfg)?;
    let auto_reply = Arc::new(AtomicBool::new(cfg.router.auto_reply));

    if let Some(wav) = &args.transcribe {
        let transcriber = speech::create_transcriber(&cfg.stt);
        if let Err(e) = speech::transcribe_and_publish(transcriber.as_ref(), wav, orchestrator.bus()) {
            log::error!("Transcription of {:?} failed: {e:#}", wav);
        }
    }

    let console_loop = || {
        log::info!("Ready");
        let stdin = std::io::stdin();
        console::run(stdin.lock(), &orchestrator, &cfg.router.operator_name, &auto_reply)
    };

    #[cfg(feature = "hotkeys")]
    let result = if args.no_hotkeys {
        log::info!("Hotkeys disabled by --no-hotkeys");
        console_loop()
    } else {
        hotkey::run_with_console(&cfg.hotkey, orchestrator.bus().clone(), auto_reply.clone(), console_loop)
    };
    #[cfg(not(feature = "hotkeys"))]
    let result = {
        if !args.no_hotkeys {
            log::info!("Built without the `hotkeys` feature; use the text controls");
        }
        console_loop()
    };

    orchestrator.shutdown();
    log::info!("Goodbye");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_flags() {
        let args = Args::parse_from(["copartner", "--auto-reply", "--no-hotkeys", "--config", "c.json"]);
        assert!(args.auto_reply);
        assert!(args.no_hotkeys);
        assert_eq!(args.config, Some(PathBuf::from("c.json")));
        assert_eq!(args.transcribe, None);
    }
}
