//! Controller behaviour against the scripted engine
//!
//! These tests drive the controller through the in-process engine so
//! that voice loading, playback completion and cancellation can be
//! triggered deterministically.

use speechctl::speech::backends::memory::MemoryEngine;
use speechctl::speech::{SpeechController, UtteranceRequest, VoiceSummary};
use speechctl::SynthesisState;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;

fn voice(name: &str) -> VoiceSummary {
    VoiceSummary::new(name.to_lowercase(), name, "en-US")
}

/// `on_end` callback that counts its calls
fn end_counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let handle = Arc::clone(&count);
    (count, move || {
        handle.fetch_add(1, Ordering::SeqCst);
    })
}

fn hello() -> UtteranceRequest<VoiceSummary> {
    UtteranceRequest::new("hello")
}

#[test]
fn test_unsupported_host_ignores_everything() {
    let (ends, on_end) = end_counter();
    let mut controller: SpeechController<MemoryEngine<VoiceSummary>> =
        SpeechController::unsupported(on_end);

    let changes = Arc::new(AtomicUsize::new(0));
    let sink = Arc::clone(&changes);
    controller.subscribe(move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
    });

    let requests = [
        hello(),
        UtteranceRequest::new(""),
        UtteranceRequest::new("fast").with_rate(10.0).with_volume(0.0),
        UtteranceRequest::new("voiced").with_voice(Some(voice("Alex"))),
    ];
    for request in requests {
        controller.speak(request).unwrap();
        assert!(!controller.speaking());
        controller.cancel().unwrap();
        assert!(!controller.speaking());
    }

    assert!(!controller.supported());
    assert!(controller.voices().is_empty());
    assert_eq!(ends.load(Ordering::SeqCst), 0);
    assert_eq!(changes.load(Ordering::SeqCst), 0);
}

#[test]
fn test_voices_available_immediately() {
    let engine = MemoryEngine::with_voices(vec![voice("Alex"), voice("Samantha")]);
    let (_, on_end) = end_counter();
    let controller = SpeechController::new(Some(engine.clone()), on_end);

    assert!(controller.supported());
    assert_eq!(controller.voices(), vec![voice("Alex"), voice("Samantha")]);
    // No need to wait for a notification
    assert_eq!(engine.listener_count(), 0);
}

#[test]
fn test_voices_arrive_by_notification() {
    let engine = MemoryEngine::<VoiceSummary>::new();
    let (_, on_end) = end_counter();
    let controller = SpeechController::new(Some(engine.clone()), on_end);

    assert!(controller.supported());
    assert!(controller.voices().is_empty());
    assert_eq!(engine.listener_count(), 1);

    engine.publish_voices(vec![voice("Alex"), voice("Daniel")]);
    assert_eq!(controller.voices(), vec![voice("Alex"), voice("Daniel")]);

    // Later changes replace the list
    engine.publish_voices(vec![voice("Karen")]);
    assert_eq!(controller.voices(), vec![voice("Karen")]);
}

#[test]
fn test_voice_notification_reaches_subscribers() {
    let engine = MemoryEngine::<VoiceSummary>::new();
    let (_, on_end) = end_counter();
    let controller = SpeechController::new(Some(engine.clone()), on_end);

    let seen: Arc<Mutex<Vec<usize>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    controller.subscribe(move |state: &SynthesisState<VoiceSummary>| {
        sink.lock().unwrap().push(state.voices.len());
    });

    engine.publish_voices(vec![voice("Alex"), voice("Daniel")]);
    assert_eq!(*seen.lock().unwrap(), vec![2]);
}

#[test]
fn test_speak_then_complete() {
    let engine = MemoryEngine::<VoiceSummary>::new();
    let speaking_at_end = Arc::new(Mutex::new(Vec::new()));
    let ends = Arc::new(AtomicUsize::new(0));

    // Track the order of state change and callback
    let events = Arc::new(Mutex::new(Vec::new()));
    let end_events = Arc::clone(&events);
    let end_count = Arc::clone(&ends);
    let mut controller = SpeechController::new(Some(engine.clone()), move || {
        end_count.fetch_add(1, Ordering::SeqCst);
        end_events.lock().unwrap().push("on_end");
    });

    let state_events = Arc::clone(&events);
    let observed = Arc::clone(&speaking_at_end);
    controller.subscribe(move |state: &SynthesisState<VoiceSummary>| {
        observed.lock().unwrap().push(state.speaking);
        state_events
            .lock()
            .unwrap()
            .push(if state.speaking { "speaking" } else { "idle" });
    });

    controller
        .speak(
            UtteranceRequest::new("hello")
                .with_rate(1.0)
                .with_pitch(1.0)
                .with_volume(1.0),
        )
        .unwrap();
    assert!(controller.speaking());
    assert_eq!(ends.load(Ordering::SeqCst), 0);

    assert!(engine.complete_next());
    assert!(!controller.speaking());
    assert_eq!(ends.load(Ordering::SeqCst), 1);
    assert_eq!(*events.lock().unwrap(), vec!["speaking", "idle", "on_end"]);
    assert_eq!(*speaking_at_end.lock().unwrap(), vec![true, false]);
}

#[test]
fn test_cancel_does_not_call_on_end() {
    let engine = MemoryEngine::<VoiceSummary>::new();
    let (ends, on_end) = end_counter();
    let mut controller = SpeechController::new(Some(engine.clone()), on_end);

    controller.speak(hello()).unwrap();
    assert!(controller.speaking());

    controller.cancel().unwrap();
    assert!(!controller.speaking());
    assert_eq!(engine.cancels(), 1);

    // Cancelled utterance never completes
    assert!(!engine.complete_next());
    assert_eq!(ends.load(Ordering::SeqCst), 0);
}

#[test]
fn test_each_speak_builds_a_fresh_descriptor() {
    let engine = MemoryEngine::<VoiceSummary>::new();
    let (_, on_end) = end_counter();
    let mut controller = SpeechController::new(Some(engine.clone()), on_end);

    controller.speak(hello()).unwrap();
    controller.speak(hello()).unwrap();

    let submitted = engine.submitted();
    assert_eq!(submitted.len(), 2);
    assert_ne!(submitted[0].id, submitted[1].id);
    assert_eq!(submitted[0].text, submitted[1].text);
}

#[test]
fn test_speak_forwards_parameters() {
    let alex = voice("Alex");
    let engine = MemoryEngine::with_voices(vec![alex.clone(), voice("Bruce")]);
    let (ends, on_end) = end_counter();
    let mut controller = SpeechController::new(Some(engine.clone()), on_end);

    controller
        .speak(UtteranceRequest::new("hi").with_voice(Some(alex.clone())))
        .unwrap();

    let submitted = engine.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].voice, Some(alex));
    assert_eq!(submitted[0].text, "hi");
    assert_eq!(submitted[0].rate, 1.0);
    assert_eq!(submitted[0].pitch, 1.0);
    assert_eq!(submitted[0].volume, 1.0);

    engine.complete_next();
    assert_eq!(
        controller.state(),
        SynthesisState {
            supported: true,
            speaking: false,
            voices: vec![voice("Alex"), voice("Bruce")],
        }
    );
    assert_eq!(ends.load(Ordering::SeqCst), 1);
}

#[test]
fn test_parameters_are_not_clamped() {
    let engine = MemoryEngine::<VoiceSummary>::new();
    let (_, on_end) = end_counter();
    let mut controller = SpeechController::new(Some(engine.clone()), on_end);

    controller
        .speak(
            UtteranceRequest::new("odd")
                .with_rate(25.0)
                .with_pitch(-1.0)
                .with_volume(3.0),
        )
        .unwrap();

    let submitted = &engine.submitted()[0];
    assert_eq!(submitted.rate, 25.0);
    assert_eq!(submitted.pitch, -1.0);
    assert_eq!(submitted.volume, 3.0);
}

#[test]
fn test_rejected_submission_resets_speaking() {
    let engine = MemoryEngine::<VoiceSummary>::new();
    let (ends, on_end) = end_counter();
    let mut controller = SpeechController::new(Some(engine.clone()), on_end);

    engine.fail_next_speak("engine busy");
    let result = controller.speak(hello());

    assert!(result.is_err());
    assert!(!controller.speaking());
    assert_eq!(ends.load(Ordering::SeqCst), 0);

    // Next call goes through normally
    controller.speak(hello()).unwrap();
    assert!(controller.speaking());
}

#[test]
fn test_overlapping_speak_completion_race() {
    // Overlapping utterances are not sequenced: the first completion
    // clears `speaking` even though the second is still queued.
    let engine = MemoryEngine::<VoiceSummary>::new();
    let (ends, on_end) = end_counter();
    let mut controller = SpeechController::new(Some(engine.clone()), on_end);

    controller.speak(UtteranceRequest::new("first")).unwrap();
    controller.speak(UtteranceRequest::new("second")).unwrap();

    assert!(engine.complete_next());
    assert!(!controller.speaking());
    assert_eq!(engine.pending(), 1);

    assert!(engine.complete_next());
    assert_eq!(ends.load(Ordering::SeqCst), 2);
}

#[test]
fn test_subscriber_tracks_completion() {
    let engine = MemoryEngine::<VoiceSummary>::new();
    let latest: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(None));
    let (_, on_end) = end_counter();
    let mut controller = SpeechController::new(Some(engine.clone()), on_end);

    let slot = Arc::clone(&latest);
    let reader = controller.subscribe(move |state: &SynthesisState<VoiceSummary>| {
        *slot.lock().unwrap() = Some(state.speaking);
    });

    controller.speak(hello()).unwrap();
    assert_eq!(*latest.lock().unwrap(), Some(true));
    engine.complete_next();
    assert_eq!(*latest.lock().unwrap(), Some(false));

    assert!(controller.unsubscribe(reader));
}

#[test]
fn test_slow_subscriber_ends_on_current_state() {
    // Completion is delivered on a second thread whose subscriber call
    // stalls; a speak on this thread meanwhile must still be the last
    // thing the subscriber sees.
    let engine = MemoryEngine::<VoiceSummary>::new();
    let (_, on_end) = end_counter();
    let mut controller = SpeechController::new(Some(engine.clone()), on_end);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (stalled_tx, stalled_rx) = mpsc::sync_channel::<()>(1);
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let stalled = AtomicBool::new(false);

    let sink = Arc::clone(&seen);
    controller.subscribe(move |state: &SynthesisState<VoiceSummary>| {
        sink.lock().unwrap().push(state.speaking);
        if !state.speaking && !stalled.swap(true, Ordering::SeqCst) {
            stalled_tx.send(()).unwrap();
            release_rx.lock().unwrap().recv().unwrap();
        }
    });

    controller.speak(UtteranceRequest::new("one")).unwrap();

    let completer = {
        let engine = engine.clone();
        thread::spawn(move || engine.complete_next())
    };

    stalled_rx.recv().unwrap();
    controller.speak(UtteranceRequest::new("two")).unwrap();
    release_tx.send(()).unwrap();
    assert!(completer.join().unwrap());

    assert!(controller.speaking());
    assert_eq!(*seen.lock().unwrap(), vec![true, false, true]);
}
