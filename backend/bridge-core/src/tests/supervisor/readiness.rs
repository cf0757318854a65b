// Unit tests for the readiness state machine.

use crate::supervisor::ReadinessState;
use crate::supervisor::readiness::ReadinessCell;

/// **VALUE**: Verifies the legal transition path
/// NotStarted→Starting→Ready→Failed applies in full.
///
/// **WHY THIS MATTERS**: This is the complete lifecycle of a worker that
/// starts, serves, and then dies. Every step must be observable in order.
///
/// **BUG THIS CATCHES**: Would catch a transition table typo locking the
/// cell in an intermediate state.
#[test]
fn given_fresh_cell_when_walking_legal_path_then_every_transition_applies() {
    // GIVEN: A fresh cell
    let cell = ReadinessCell::new();
    assert_eq!(cell.current(), ReadinessState::NotStarted);

    // WHEN/THEN: Each legal step applies
    assert!(cell.transition(ReadinessState::Starting));
    assert_eq!(cell.current(), ReadinessState::Starting);

    assert!(cell.transition(ReadinessState::Ready));
    assert!(cell.is_ready());

    assert!(cell.transition(ReadinessState::Failed));
    assert_eq!(cell.current(), ReadinessState::Failed);
    assert!(!cell.is_ready());
}

/// **VALUE**: Verifies illegal transitions are inert: applied nowhere,
/// state unchanged.
///
/// **WHY THIS MATTERS**: The reachability guarantee - never
/// Ready→Starting→Ready, never anything→NotStarted - is enforced entirely
/// here. A worker exit must also never "un-fail" into an earlier state.
///
/// **BUG THIS CATCHES**: Would catch the legality check being bypassed by
/// a direct store.
#[test]
fn given_each_state_when_attempting_illegal_transitions_then_state_is_unchanged() {
    // GIVEN: A cell in NotStarted
    let cell = ReadinessCell::new();

    // WHEN/THEN: Jumping straight to Ready or Failed is inert
    assert!(!cell.transition(ReadinessState::Ready));
    assert!(!cell.transition(ReadinessState::Failed));
    assert_eq!(cell.current(), ReadinessState::NotStarted);

    // GIVEN: Ready
    assert!(cell.transition(ReadinessState::Starting));
    assert!(cell.transition(ReadinessState::Ready));

    // WHEN/THEN: Reverting to Starting or NotStarted is inert
    assert!(!cell.transition(ReadinessState::Starting));
    assert!(!cell.transition(ReadinessState::NotStarted));
    assert!(cell.is_ready());

    // GIVEN: Failed
    assert!(cell.transition(ReadinessState::Failed));

    // WHEN/THEN: Failed is terminal
    assert!(!cell.transition(ReadinessState::Ready));
    assert!(!cell.transition(ReadinessState::Starting));
    assert_eq!(cell.current(), ReadinessState::Failed);
}

/// **VALUE**: Verifies a second Ready transition reports as not applied.
///
/// **WHY THIS MATTERS**: The readiness marker must flip the state exactly
/// once; duplicate markers (or a replayed signal line) must not look like
/// fresh transitions to the monitor's logging.
///
/// **BUG THIS CATCHES**: Would catch Ready→Ready being added to the legal
/// set.
#[test]
fn given_ready_cell_when_marking_ready_again_then_transition_is_inert() {
    // GIVEN: A Ready cell
    let cell = ReadinessCell::new();
    assert!(cell.transition(ReadinessState::Starting));
    assert!(cell.transition(ReadinessState::Ready));

    // WHEN: Marking Ready again
    let applied = cell.transition(ReadinessState::Ready);

    // THEN: Not applied, still Ready
    assert!(!applied);
    assert!(cell.is_ready());
}

/// **VALUE**: Verifies watch subscribers observe the transition that a
/// concurrent waiter is waiting for.
///
/// **WHY THIS MATTERS**: `wait_until_ready` is built on this subscription;
/// a transition that updates the atomic but skips the notify would leave
/// waiters hanging until timeout.
///
/// **BUG THIS CATCHES**: Would catch the atomic store and the watch send
/// drifting apart.
#[tokio::test]
async fn given_subscribed_waiter_when_cell_becomes_ready_then_waiter_observes_it() {
    // GIVEN: A subscriber on a Starting cell
    let cell = std::sync::Arc::new(ReadinessCell::new());
    cell.transition(ReadinessState::Starting);
    let mut rx = cell.subscribe();

    // WHEN: Another task marks Ready
    let writer = std::sync::Arc::clone(&cell);
    tokio::spawn(async move {
        writer.transition(ReadinessState::Ready);
    });

    // THEN: The subscriber sees Ready
    loop {
        if *rx.borrow_and_update() == ReadinessState::Ready {
            break;
        }
        rx.changed().await.expect("watch channel should stay open");
    }
    assert!(cell.is_ready());
}
