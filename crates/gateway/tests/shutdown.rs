//! Signal handling runs in its own test binary so no other test shares
//! the process that receives the signal.

#![cfg(unix)]

use std::time::Duration;

use tm_gateway::shutdown::ShutdownSignal;

#[tokio::test]
async fn sigterm_ends_the_wait() {
    let mut shutdown = ShutdownSignal::register().unwrap();

    let status = std::process::Command::new("kill")
        .args(["-TERM", &std::process::id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    let received = tokio::time::timeout(Duration::from_secs(5), shutdown.recv())
        .await
        .unwrap();
    assert_eq!(received, "SIGTERM");
}
