//! View-state machine for the batch map
//!
//! One state value drives both the map rendering and the table-row
//! highlighting; there are no parallel selection flags. The eye gesture
//! cycles highlight → detail → overview on the same result, and switches
//! the highlight when it lands on a different one. The cycle is load-bearing
//! UX; do not reorder the transitions.

use crate::model::ResultId;

/// What the map is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    /// Overview of every parcel, optionally with one emphasized.
    Merged { highlight: Option<ResultId> },
    /// Detail view of one parcel's points, track and polygon.
    Single { selected: ResultId },
}

impl Default for ViewState {
    fn default() -> Self {
        Self::Merged { highlight: None }
    }
}

/// User gestures driving view transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gesture {
    /// Eye toggle on a table row, or a click on the parcel itself.
    Inspect(ResultId),
    /// Return to the plain overview.
    ShowAll,
    /// Escalate the current highlight to the detail view.
    ZoomDetail,
}

impl ViewState {
    /// The highlighted result in merged mode, if any.
    pub fn highlight(&self) -> Option<&ResultId> {
        match self {
            ViewState::Merged { highlight } => highlight.as_ref(),
            ViewState::Single { .. } => None,
        }
    }

    /// The result whose details the side panel shows: the merged highlight
    /// or the single-view selection.
    pub fn selected(&self) -> Option<&ResultId> {
        match self {
            ViewState::Merged { highlight } => highlight.as_ref(),
            ViewState::Single { selected } => Some(selected),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, ViewState::Single { .. })
    }

    /// Compute the next state for a gesture.
    ///
    /// Inspect on the already-highlighted result escalates to the detail
    /// view; inspect on the result already in detail view returns to the
    /// plain overview; inspect on anything else highlights it in the
    /// overview. ShowAll resets unconditionally. ZoomDetail only acts on an
    /// active merged highlight.
    pub fn next(&self, gesture: &Gesture) -> ViewState {
        match (self, gesture) {
            (_, Gesture::ShowAll) => ViewState::Merged { highlight: None },

            (ViewState::Merged { highlight: Some(h) }, Gesture::Inspect(r)) if h == r => {
                ViewState::Single { selected: r.clone() }
            }
            (ViewState::Single { selected }, Gesture::Inspect(r)) if selected == r => {
                ViewState::Merged { highlight: None }
            }
            (_, Gesture::Inspect(r)) => ViewState::Merged { highlight: Some(r.clone()) },

            (ViewState::Merged { highlight: Some(h) }, Gesture::ZoomDetail) => {
                ViewState::Single { selected: h.clone() }
            }
            (_, Gesture::ZoomDetail) => self.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inspect(id: &str) -> Gesture {
        Gesture::Inspect(id.to_string())
    }

    #[test]
    fn test_triple_click_cycle() {
        let s0 = ViewState::default();
        let s1 = s0.next(&inspect("A"));
        assert_eq!(s1, ViewState::Merged { highlight: Some("A".to_string()) });

        let s2 = s1.next(&inspect("A"));
        assert_eq!(s2, ViewState::Single { selected: "A".to_string() });

        let s3 = s2.next(&inspect("A"));
        assert_eq!(s3, ViewState::Merged { highlight: None });
    }

    #[test]
    fn test_inspect_other_from_single_goes_to_merged_highlight() {
        let single_a = ViewState::Single { selected: "A".to_string() };
        let next = single_a.next(&inspect("B"));
        // Straight to the overview highlight, never through Single(B)
        assert_eq!(next, ViewState::Merged { highlight: Some("B".to_string()) });
    }

    #[test]
    fn test_inspect_other_from_merged_switches_highlight() {
        let merged_a = ViewState::Merged { highlight: Some("A".to_string()) };
        let next = merged_a.next(&inspect("B"));
        assert_eq!(next, ViewState::Merged { highlight: Some("B".to_string()) });
    }

    #[test]
    fn test_show_all_from_any_state() {
        let states = [
            ViewState::Merged { highlight: None },
            ViewState::Merged { highlight: Some("B".to_string()) },
            ViewState::Single { selected: "A".to_string() },
        ];
        for state in states {
            assert_eq!(state.next(&Gesture::ShowAll), ViewState::Merged { highlight: None });
        }
    }

    #[test]
    fn test_zoom_detail_requires_merged_highlight() {
        let highlighted = ViewState::Merged { highlight: Some("A".to_string()) };
        assert_eq!(
            highlighted.next(&Gesture::ZoomDetail),
            ViewState::Single { selected: "A".to_string() }
        );

        let plain = ViewState::Merged { highlight: None };
        assert_eq!(plain.next(&Gesture::ZoomDetail), plain);

        let single = ViewState::Single { selected: "A".to_string() };
        assert_eq!(single.next(&Gesture::ZoomDetail), single);
    }

    #[test]
    fn test_selected_follows_highlight_and_detail() {
        assert_eq!(ViewState::default().selected(), None);
        let merged = ViewState::Merged { highlight: Some("A".to_string()) };
        assert_eq!(merged.selected().map(String::as_str), Some("A"));
        let single = ViewState::Single { selected: "A".to_string() };
        assert_eq!(single.selected().map(String::as_str), Some("A"));
    }
}
