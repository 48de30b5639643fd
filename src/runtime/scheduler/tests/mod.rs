//! Scheduler unit tests
//!
//! Covers task records, pool scheduling behavior, end-count join scopes,
//! and the cooperative blocking hook.


use crate::runtime::scheduler::{TaskId, TaskIdGenerator, TaskState};

#[cfg(test)]
mod task_id_tests {
    use super::*;

    #[test]
    fn test_task_id_inner() {
        let id = TaskId(1);
        assert_eq!(id.inner(), 1);
    }

    #[test]
    fn test_task_id_display() {
        assert_eq!(TaskId(5).to_string(), "Task(5)");
    }

    #[test]
    fn test_task_id_generator_is_monotonic() {
        let ids = TaskIdGenerator::new();
        assert_eq!(ids.next_id(), TaskId(0));
        assert_eq!(ids.next_id(), TaskId(1));
        assert_eq!(ids.next_id(), TaskId(2));
    }
}

#[cfg(test)]
mod task_state_tests {
    use super::*;

    #[test]
    fn test_task_state_round_trip() {
        for state in [
            TaskState::Ready,
            TaskState::Running,
            TaskState::Finished,
            TaskState::Failed,
        ] {
            assert_eq!(TaskState::from_u8(state.as_u8()), state);
        }
    }

    #[test]
    fn test_task_state_unknown_byte_is_ready() {
        assert_eq!(TaskState::from_u8(200), TaskState::Ready);
    }
}
