use super::descriptor::SessionDescriptor;
use crate::engine::AsrEngine;
use crate::events::{EventSink, RecognitionOutcome, RunEvent};
use crate::progress::ProgressCounter;
use std::sync::Arc;
use tracing::{debug, warn};

/// One admitted recognition session, ready to run on its own thread
pub struct SessionTask {
    descriptor: SessionDescriptor,
    engine: Arc<dyn AsrEngine>,
    progress: Arc<ProgressCounter>,
    events: Arc<dyn EventSink>,
}

impl SessionTask {
    pub fn new(
        descriptor: SessionDescriptor,
        engine: Arc<dyn AsrEngine>,
        progress: Arc<ProgressCounter>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            descriptor,
            engine,
            progress,
            events,
        }
    }

    pub fn descriptor(&self) -> &SessionDescriptor {
        &self.descriptor
    }

    /// Run the session to completion: create, recognize, report, destroy.
    ///
    /// Failures stay inside the task and are reported through the `resulted`
    /// event. The progress counter is decremented exactly once on every path,
    /// including a panicking engine.
    pub fn run(self) -> RecognitionOutcome {
        let SessionTask {
            descriptor,
            engine,
            progress,
            events,
        } = self;

        let _completion = Completion {
            sequence: descriptor.sequence,
            progress,
            events: Arc::clone(&events),
        };

        let mut session = match engine.create_session(&descriptor.profile) {
            Ok(session) => session,
            Err(e) => {
                warn!("Session {} not created: {}", descriptor.sequence, e);
                let outcome = RecognitionOutcome::Failed(e.to_string());
                report(events.as_ref(), &descriptor, &outcome);
                return outcome;
            }
        };

        debug!(
            "Session {} recognizing {}",
            descriptor.sequence,
            descriptor.input.display()
        );

        let outcome = match session.recognize_file(
            &descriptor.grammar,
            &descriptor.input,
            descriptor.params.as_deref(),
        ) {
            Ok(text) => RecognitionOutcome::Text(text),
            Err(e) => {
                warn!("Session {} recognition failed: {}", descriptor.sequence, e);
                RecognitionOutcome::Failed(e.to_string())
            }
        };
        report(events.as_ref(), &descriptor, &outcome);

        session.destroy();
        outcome
    }
}

fn report(events: &dyn EventSink, descriptor: &SessionDescriptor, outcome: &RecognitionOutcome) {
    events.emit(RunEvent::Resulted {
        sequence: descriptor.sequence,
        input: descriptor.input.clone(),
        outcome: outcome.clone(),
    });
}

/// Marks the task finished when dropped
struct Completion {
    sequence: usize,
    progress: Arc<ProgressCounter>,
    events: Arc<dyn EventSink>,
}

impl Drop for Completion {
    fn drop(&mut self) {
        let sequence = self.sequence;
        let events = &self.events;
        self.progress.decrement_then(|after| {
            events.emit(RunEvent::Finished {
                sequence,
                total: after.total,
                active: after.active,
            });
        });
    }
}
