//! End-to-end host runs against a real render client.
//!
//! The test binary re-executes itself as a color or shift client when
//! started with `--client <name>`.

use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use mediafx_clients::color::{self, ColorConfig};
use mediafx_clients::shift::{self, ShiftConfig};
use mediafx_core::MediaFxError;
use mediafx_host::config::HostConfig;
use mediafx_host::service::{HostService, test_pattern};

// ── Helpers ──────────────────────────────────────────────────────

fn client_config(name: &str) -> HostConfig {
    let mut cfg = HostConfig::default();
    cfg.client.path = std::env::current_exe()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    cfg.client.args = vec!["--client".into(), name.into()];
    cfg.frames.width = 8;
    cfg.frames.height = 4;
    cfg.run.fps = 200;
    cfg
}

fn temp_output(name: &str) -> std::path::PathBuf {
    std::env::temp_dir().join(format!("mediafx-host-{name}-{}.rgba", std::process::id()))
}

// ── Runs ─────────────────────────────────────────────────────────

async fn color_run_writes_frames() {
    let output = temp_output("color");
    let mut cfg = client_config("color");
    cfg.run.frames = 3;
    cfg.run.digest = true;
    cfg.run.output = output.to_string_lossy().into_owned();

    let summary = HostService::new(cfg).run().await.unwrap();
    assert_eq!(summary.frames, 3);

    // Times 0, 0.005 and 0.01 all truncate to the same cycle color.
    let bytes = std::fs::read(&output).unwrap();
    std::fs::remove_file(&output).ok();
    assert_eq!(bytes.len(), 3 * 8 * 4 * 4);
    for pixel in bytes.chunks_exact(4) {
        assert_eq!(pixel, &[0, 0, 128, 255]);
    }
    let frame = &bytes[..8 * 4 * 4];
    assert_eq!(summary.last_digest, Some(blake3::hash(frame).to_hex().to_string()));
}

async fn shift_run_moves_test_pattern() {
    let output = temp_output("shift");
    let mut cfg = client_config("shift");
    cfg.frames.count = 1;
    cfg.client.param1 = 0.5;
    cfg.run.frames = 1;
    cfg.run.output = output.to_string_lossy().into_owned();

    let summary = HostService::new(cfg).run().await.unwrap();
    assert_eq!(summary.frames, 1);
    assert_eq!(summary.last_digest, None);

    let mut source = vec![0u8; 8 * 4 * 4];
    test_pattern(&mut source, 8, 0, 0);
    let bytes = std::fs::read(&output).unwrap();
    std::fs::remove_file(&output).ok();
    // Destination (0, 0) reads source (4, 0).
    assert_eq!(&bytes[..4], &source[16..20]);
}

async fn stop_handle_ends_unlimited_run() {
    let mut cfg = client_config("color");
    cfg.run.frames = 0;
    let service = HostService::new(cfg);
    let stop = service.stop_handle();

    let started = Instant::now();
    let run = service.run();
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        stop.store(false, Ordering::SeqCst);
    };
    let (summary, ()) = tokio::join!(run, stopper);

    let summary = summary.unwrap();
    assert!(summary.frames > 0);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!service.is_running());
}

async fn stop_before_run_renders_nothing() {
    let mut cfg = client_config("color");
    cfg.run.frames = 0;
    let service = HostService::new(cfg);
    service.stop_handle().store(false, Ordering::SeqCst);

    let summary = tokio::time::timeout(Duration::from_secs(5), service.run())
        .await
        .expect("stopped run did not return")
        .unwrap();
    assert_eq!(summary.frames, 0);
    assert!(!service.is_running());
}

async fn invalid_client_config_is_rejected() {
    let mut cfg = client_config("color");
    cfg.client.config = "mode = \"rainbow\"".into();
    let service = HostService::new(cfg);

    let err = service.run().await.unwrap_err();
    match err.downcast_ref::<MediaFxError>() {
        Some(MediaFxError::ClientRejected(message)) => {
            assert!(message.contains("invalid client config"), "{message}");
        }
        other => panic!("expected rejected handshake, got {other:?}"),
    }
    assert!(!service.is_running());
}

// ── Runner ───────────────────────────────────────────────────────

fn main() -> ExitCode {
    let mut args = std::env::args().skip(1);
    if args.next().as_deref() == Some("--client") {
        let result = match args.next().as_deref() {
            Some("color") => mediafx_clients::run::<ColorConfig, _>(color::render),
            Some("shift") => mediafx_clients::run::<ShiftConfig, _>(shift::render),
            _ => return ExitCode::FAILURE,
        };
        return match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        };
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    println!("\nrunning 5 tests");
    runtime.block_on(async {
        color_run_writes_frames().await;
        println!("test color_run_writes_frames ... ok");
        shift_run_moves_test_pattern().await;
        println!("test shift_run_moves_test_pattern ... ok");
        stop_handle_ends_unlimited_run().await;
        println!("test stop_handle_ends_unlimited_run ... ok");
        stop_before_run_renders_nothing().await;
        println!("test stop_before_run_renders_nothing ... ok");
        invalid_client_config_is_rejected().await;
        println!("test invalid_client_config_is_rejected ... ok");
    });
    println!("\ntest result: ok. 5 passed");
    ExitCode::SUCCESS
}
