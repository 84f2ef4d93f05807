use serde::{Deserialize, Serialize};

use crate::domain::draft::InteractionDraft;

/// Stages of one conversation-to-record run. A single user message enters at
/// `Start` and the run converges to `Done` in one pass; there is no path
/// back to an earlier stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Start,
    Extract,
    Summarize,
    Comply,
    Route,
    Done,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Pure transition function. The only conditional edge is out of `Extract`:
/// `Summarize` runs iff the draft has no summary yet. `Done` is terminal.
pub fn next_state(current: PipelineState, draft: &InteractionDraft) -> PipelineState {
    match current {
        PipelineState::Start => PipelineState::Extract,
        PipelineState::Extract => {
            if draft.has_summary() {
                PipelineState::Comply
            } else {
                PipelineState::Summarize
            }
        }
        PipelineState::Summarize => PipelineState::Comply,
        PipelineState::Comply => PipelineState::Route,
        PipelineState::Route => PipelineState::Done,
        PipelineState::Done => PipelineState::Done,
    }
}

#[cfg(test)]
mod tests {
    use super::{next_state, PipelineState};
    use crate::domain::draft::InteractionDraft;

    fn walk(mut state: PipelineState, draft: &InteractionDraft) -> Vec<PipelineState> {
        let mut visited = vec![state];
        while !state.is_terminal() {
            state = next_state(state, draft);
            visited.push(state);
        }
        visited
    }

    #[test]
    fn draft_without_summary_visits_summarize() {
        let visited = walk(PipelineState::Start, &InteractionDraft::default());
        assert_eq!(
            visited,
            vec![
                PipelineState::Start,
                PipelineState::Extract,
                PipelineState::Summarize,
                PipelineState::Comply,
                PipelineState::Route,
                PipelineState::Done,
            ]
        );
    }

    #[test]
    fn draft_with_summary_skips_summarize() {
        let draft = InteractionDraft {
            summary: Some("already summarized".to_string()),
            ..InteractionDraft::default()
        };

        let visited = walk(PipelineState::Start, &draft);
        assert!(!visited.contains(&PipelineState::Summarize));
        assert_eq!(visited.last(), Some(&PipelineState::Done));
    }

    #[test]
    fn done_is_terminal() {
        let draft = InteractionDraft::default();
        assert!(PipelineState::Done.is_terminal());
        assert_eq!(next_state(PipelineState::Done, &draft), PipelineState::Done);
    }

    #[test]
    fn transitions_are_deterministic_for_the_same_draft() {
        let draft = InteractionDraft::default();
        let first = walk(PipelineState::Start, &draft);
        let second = walk(PipelineState::Start, &draft);
        assert_eq!(first, second);
    }
}
