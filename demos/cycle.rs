//! # Example: cycle
//!
//! `a` triggers `b`, `b` triggers `a` again. The second `a` is rejected before its
//! handler runs and the error travels back to the top-level trigger.
//!
//! ## Flow
//! ```text
//! bus.trigger("a")
//!     └─► on_a(scope#0) ─► scope#0.trigger("b")
//!           └─► on_b(scope#1) ─► scope#1.trigger("a")
//!                 └─► Err(Circular { path: a ─► b ─► a })
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example cycle
//! ```

use callstack_bus::{Bus, BusError, HandlerFn, Reply};

fn main() {
    let bus: Bus = Bus::new();

    bus.listen(
        "a",
        HandlerFn::arc("on_a", |scope, _| {
            scope.trigger("b", &())?;
            Ok(Reply::done())
        }),
    );
    bus.listen(
        "b",
        HandlerFn::arc("on_b", |scope, _| {
            scope.trigger("a", &())?;
            Ok(Reply::done())
        }),
    );

    // Cycle detection happens before anything is spawned, but trigger still needs
    // a runtime for the drain loop.
    let rt = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("runtime: {e}");
            return;
        }
    };
    let _guard = rt.enter();

    match bus.trigger("a", &()) {
        Err(BusError::Circular { event, path }) => {
            println!("rejected {event}: {}", path.join(" -> "));
        }
        Err(other) => println!("unexpected error [{}]: {other}", other.as_label()),
        Ok(dispatch) => println!("no cycle detected:\n{}", dispatch.stack_tree()),
    }
}
