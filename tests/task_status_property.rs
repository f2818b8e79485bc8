//! Property coverage for the AgentTask status state machine (spec.md §3):
//! terminal states never accept a further transition, and no status can
//! transition to itself.

use scanmaster::domain::models::TaskStatus;
use test_strategy::proptest;

fn all_statuses() -> Vec<TaskStatus> {
    vec![
        TaskStatus::Pending,
        TaskStatus::Assigned,
        TaskStatus::Running,
        TaskStatus::Completed,
        TaskStatus::Failed,
        TaskStatus::Cancelled,
    ]
}

#[proptest]
fn terminal_status_has_no_outgoing_transition(
    #[strategy(proptest::sample::select(all_statuses()))] status: TaskStatus,
) {
    if status.is_terminal() {
        for candidate in all_statuses() {
            assert!(!status.can_transition_to(candidate));
        }
    }
}

#[proptest]
fn no_status_transitions_to_itself(#[strategy(proptest::sample::select(all_statuses()))] status: TaskStatus) {
    assert!(!status.can_transition_to(status));
}
