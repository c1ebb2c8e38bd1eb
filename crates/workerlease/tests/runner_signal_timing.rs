//! Renewal cadence under a stream of forwarded signals. Kept in its own test
//! binary because it signals the whole test process.
#![cfg(unix)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use workerlease::{
    EngineConfig, Generator, LeaseEngine, LeaseError, LeaseRecord, Runner, RunnerConfig,
};

const INTERVAL: Duration = Duration::from_millis(100);

/// Local engine that counts renewals.
struct CountingGenerator {
    engine: LeaseEngine,
    renews: AtomicUsize,
}

#[async_trait::async_trait]
impl Generator for CountingGenerator {
    async fn acquire(&self) -> Result<LeaseRecord, LeaseError> {
        self.engine.acquire()
    }

    async fn renew(&self, id: i64) -> Result<LeaseRecord, LeaseError> {
        self.renews.fetch_add(1, Ordering::SeqCst);
        self.engine.renew(id)
    }

    async fn release(&self, id: i64) -> Result<(), LeaseError> {
        self.engine.release(id)
    }
}

#[tokio::test]
async fn signal_bursts_do_not_delay_renewals() {
    let generator = Arc::new(CountingGenerator {
        engine: LeaseEngine::new(EngineConfig::default()),
        renews: AtomicUsize::new(0),
    });
    let command = vec![
        "sh".to_string(),
        "-c".to_string(),
        "trap '' HUP; sleep 0.65".to_string(),
    ];
    let config = RunnerConfig::default().with_interval(INTERVAL);

    let started = Instant::now();
    let mut run = tokio::spawn(Runner::new(Arc::clone(&generator), config, command).run());

    // Let the runner install its handlers and the shell ignore HUP.
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Several signals land inside every interval until the command exits.
    let me = Pid::this();
    let status = loop {
        tokio::select! {
            result = &mut run => break result.unwrap().unwrap(),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {
                kill(me, Signal::SIGHUP).unwrap();
                assert!(started.elapsed() < Duration::from_secs(5), "runner did not finish");
            }
        }
    };
    let elapsed = started.elapsed();

    assert!(status.success(), "command should survive ignored HUPs: {status}");
    let renews = generator.renews.load(Ordering::SeqCst);
    let expected = usize::try_from(elapsed.as_millis() / INTERVAL.as_millis()).unwrap();
    assert!(
        renews.abs_diff(expected) <= 1,
        "{renews} renewals in {elapsed:?}, expected about {expected}"
    );
    assert!(renews >= 4, "renewals stalled while signals arrived: {renews}");
    assert_eq!(generator.engine.held_count(), 0);
}
