//! # Example: ping_pong
//!
//! A handler for `ping` returns pending work that triggers `pong` once it runs.
//! The synchronous tree only holds `ping`; the final tree holds both.
//!
//! Demonstrates how to:
//! - Register closure handlers with [`HandlerFn`].
//! - Sub-trigger from inside a pending reply through a cloned [`Scope`].
//! - Attach the built-in [`LogObserver`] and wait for completion.
//!
//! ## Flow
//! ```text
//! bus.trigger("ping")
//!     ├─► on_ping(scope#0) ─► Reply::Pending
//!     ├─► Dispatch::stack_tree()  = ping
//!     └─► drain
//!           ├─► await on_ping reply
//!           │     └─► scope#0.trigger("pong") ─► on_pong(scope#1) ─► Reply::Ready
//!           ├─► Progress(settled ping#0)
//!           ├─► Progress(settled pong#1)
//!           └─► complete
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example ping_pong --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use callstack_bus::{Bus, BusConfig, HandlerError, HandlerFn, LogObserver, Reply};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Bus with a settle timeout and the logging observer on every task
    let cfg = BusConfig {
        settle_timeout: Duration::from_secs(2),
        ..BusConfig::default()
    };
    let bus: Bus = Bus::builder(cfg)
        .with_observers(vec![Arc::new(LogObserver)])
        .build();

    // 2. ping defers its work and triggers pong from there
    bus.listen(
        "ping",
        HandlerFn::arc("on_ping", |scope, _| {
            let scope = scope.clone();
            Ok(Reply::pending(async move {
                tokio::time::sleep(Duration::from_millis(100)).await;
                scope.trigger("pong", &())?;
                Ok::<(), HandlerError>(())
            }))
        }),
    );
    bus.listen("pong", HandlerFn::arc("on_pong", |_, _| Ok(Reply::done())));

    // 3. Trigger and print both trees
    let mut dispatch = bus.trigger("ping", &())?;
    println!("synchronous tree:\n{}", dispatch.stack_tree());

    let tree = dispatch.wait().await?;
    println!("final tree:\n{tree}");
    Ok(())
}
