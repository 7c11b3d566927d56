//! Panic routing through the installed process hook.
//!
//! The panic hook is process-global, so everything runs in one test.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use medplum_server::lifecycle::{FaultHandler, ProcessExit};

#[derive(Default)]
struct RecordingExit(Mutex<Vec<i32>>);

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) {
        self.0.lock().unwrap().push(code);
    }
}

#[tokio::test]
async fn panics_are_classified_by_message() {
    let exit = Arc::new(RecordingExit::default());
    let handler = FaultHandler::new(exit.clone());

    let earlier_hook_calls = Arc::new(AtomicUsize::new(0));
    let calls = earlier_hook_calls.clone();
    std::panic::set_hook(Box::new(move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
    }));

    {
        let _guard = handler.install();

        let transient = std::panic::catch_unwind(|| {
            panic!("Error: Connection terminated unexpectedly");
        });
        assert!(transient.is_err());
        assert!(exit.0.lock().unwrap().is_empty());

        let fatal = std::panic::catch_unwind(|| {
            panic!("invariant broken: {}", 42);
        });
        assert!(fatal.is_err());
        assert_eq!(*exit.0.lock().unwrap(), vec![1]);

        // A failed detached task is logged, never an exit.
        let task = handler.spawn_detached("background", async { Err::<(), _>("boom") });
        task.await.unwrap();
        assert_eq!(exit.0.lock().unwrap().len(), 1);
        assert_eq!(earlier_hook_calls.load(Ordering::SeqCst), 0);
    }

    // Guard dropped: the earlier hook is back and the handler sees nothing.
    let after = std::panic::catch_unwind(|| panic!("after uninstall"));
    assert!(after.is_err());
    assert_eq!(exit.0.lock().unwrap().len(), 1);
    assert_eq!(earlier_hook_calls.load(Ordering::SeqCst), 1);

    let _ = std::panic::take_hook();
}
