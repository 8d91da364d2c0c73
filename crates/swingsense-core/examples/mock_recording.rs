//! Run the supervisor against the mock transport and record one swing

use std::sync::Arc;
use std::time::Duration;

use swingsense_core::{
    MockTransport, SampleRecord, SessionManager, Supervisor, SupervisorConfig, SupervisorEvent,
};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter("debug").init();

    let dir = std::env::temp_dir().join("swingsense-demo");
    let transport = Arc::new(MockTransport::new());
    let sessions = SessionManager::new(&dir, "demo");
    let mut supervisor =
        Supervisor::new(Arc::clone(&transport), sessions, SupervisorConfig::default())?;
    let mut events = supervisor.subscribe();

    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let task = tokio::spawn(async move {
        supervisor.run(token).await;
    });

    while !matches!(events.recv().await?, SupervisorEvent::Connected { .. }) {}

    transport.emit(&[0x01]);
    for i in 0..5 {
        let t = i as f32 * 0.1;
        transport.emit(&SampleRecord::new(t, -t, 1.0, 10.0 * t, 0.0, -5.0).to_bytes());
    }
    transport.emit(&[0x02]);

    loop {
        if let SupervisorEvent::SessionClosed { path, lines, .. } = events.recv().await? {
            println!("Wrote {} lines to {}", lines, path.display());
            print!("{}", std::fs::read_to_string(path)?);
            break;
        }
    }

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), task).await??;
    Ok(())
}
