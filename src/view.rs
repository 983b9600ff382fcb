//! What the voice panel shows, computed from controller state alone.

use crate::audio_toolkit::audio::visualizer::MIN_BAR_HEIGHT;
use crate::catalog::{LocationCatalog, SelectOption};
use crate::error::RecognitionError;
use crate::managers::workflow::WorkflowState;
use crate::notifications::ToastLevel;
use crate::reconciler::{ReconcileMode, ResultReconciler};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemRow {
    pub index: usize,
    pub name: String,
    pub included: bool,
    pub complete: bool,
    pub conventional: bool,
    pub location_info: Option<String>,
    /// Select lists; empty for the flat flow.
    pub zone_options: Vec<SelectOption>,
    pub furniture_options: Vec<SelectOption>,
    pub drawer_options: Vec<SelectOption>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultsView {
    Hidden,
    /// Recognition succeeded but found nothing.
    Empty(String),
    Items(Vec<ItemRow>),
    Message {
        level: ToastLevel,
        message: String,
        detail: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderView {
    pub state: &'static str,
    pub status_text: String,
    pub timer_text: String,
    pub bars: Vec<u32>,
    pub start_label: &'static str,
    pub start_enabled: bool,
    pub cancel_enabled: bool,
    pub submit_enabled: bool,
    pub voice_available: bool,
    pub results: ResultsView,
}

/// Snapshot of everything the view depends on.
pub struct ViewInput<'a> {
    pub state: &'a WorkflowState,
    pub voice_available: bool,
    pub elapsed_secs: u64,
    pub levels: &'a [u32],
    pub reconciler: &'a ResultReconciler,
    pub catalog: &'a LocationCatalog,
}

pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

fn error_status(error: &RecognitionError) -> &'static str {
    match error {
        RecognitionError::MalformedResponse(_) => "Invalid response format",
        RecognitionError::NoValidItems => "No valid items",
        _ => "Analysis failed. Please try again.",
    }
}

fn error_block(error: &RecognitionError) -> ResultsView {
    let level = match error {
        RecognitionError::MalformedResponse(_) | RecognitionError::NoValidItems => {
            ToastLevel::Warning
        }
        _ => ToastLevel::Danger,
    };
    ResultsView::Message {
        level,
        message: error.user_message().to_string(),
        detail: error.detail().map(str::to_string),
    }
}

fn item_rows(reconciler: &ResultReconciler, catalog: &LocationCatalog) -> Vec<ItemRow> {
    let with_locations = reconciler.mode() == ReconcileMode::Location;
    reconciler
        .items()
        .iter()
        .enumerate()
        .map(|(index, item)| {
            let (zone_options, furniture_options, drawer_options) = if with_locations {
                (
                    catalog.zone_options(item.zone_id),
                    catalog.furniture_options(item.zone_id, item.furniture_id),
                    catalog.drawer_options(item.furniture_id, item.drawer_id),
                )
            } else {
                (Vec::new(), Vec::new(), Vec::new())
            };
            ItemRow {
                index,
                name: item.name.clone(),
                included: item.included,
                complete: reconciler.is_complete(item),
                conventional: item.is_conventional,
                location_info: item.location_info.clone(),
                zone_options,
                furniture_options,
                drawer_options,
            }
        })
        .collect()
}

pub fn render(input: &ViewInput<'_>) -> RenderView {
    let idle_bars = || vec![MIN_BAR_HEIGHT as u32; input.levels.len()];

    let (state, status_text, results) = match input.state {
        WorkflowState::Ready => {
            let status = if input.voice_available {
                "Ready to record"
            } else {
                "Voice recognition is not available"
            };
            ("ready", status, ResultsView::Hidden)
        }
        WorkflowState::Recording => ("recording", "Recording...", ResultsView::Hidden),
        WorkflowState::Processing => ("processing", "Processing audio...", ResultsView::Hidden),
        WorkflowState::Results => {
            let results = if input.reconciler.is_empty() {
                ResultsView::Empty("No item detected. Please try again.".to_string())
            } else {
                ResultsView::Items(item_rows(input.reconciler, input.catalog))
            };
            ("results", "Recognition complete", results)
        }
        WorkflowState::Error(error) => ("error", error_status(error), error_block(error)),
    };

    let recording = matches!(input.state, WorkflowState::Recording);

    RenderView {
        state,
        status_text: status_text.to_string(),
        timer_text: format_elapsed(if recording { input.elapsed_secs } else { 0 }),
        bars: if recording {
            input.levels.to_vec()
        } else {
            idle_bars()
        },
        start_label: if recording {
            "Stop recording"
        } else {
            "Start recording"
        },
        start_enabled: input.voice_available
            && matches!(input.state, WorkflowState::Ready | WorkflowState::Recording),
        cancel_enabled: recording,
        submit_enabled: matches!(input.state, WorkflowState::Results)
            && !input.reconciler.is_empty(),
        voice_available: input.voice_available,
        results,
    }
}

fn selected_label(options: &[SelectOption]) -> &str {
    options
        .iter()
        .find(|o| o.selected && o.value.is_some())
        .map(|o| o.label.as_str())
        .unwrap_or("-")
}

impl fmt::Display for RenderView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bars: String = self
            .bars
            .iter()
            .map(|h| match *h {
                0..=12 => '▁',
                13..=24 => '▃',
                25..=36 => '▅',
                37..=48 => '▆',
                _ => '█',
            })
            .collect();
        writeln!(f, "[{}] {} {} {}", self.state, self.status_text, self.timer_text, bars)?;

        match &self.results {
            ResultsView::Hidden => {}
            ResultsView::Empty(message) => writeln!(f, "  {}", message)?,
            ResultsView::Message {
                level,
                message,
                detail,
            } => {
                writeln!(f, "  ({}) {}", level.as_str(), message)?;
                if let Some(detail) = detail {
                    writeln!(f, "      {}", detail)?;
                }
            }
            ResultsView::Items(rows) => {
                writeln!(f, "  {} item(s) identified", rows.len())?;
                for row in rows {
                    let mark = if row.included { "x" } else { " " };
                    let flag = if row.complete { "" } else { " (incomplete)" };
                    write!(f, "  {} [{}] {}{}", row.index, mark, row.name, flag)?;
                    if !row.zone_options.is_empty() {
                        write!(
                            f,
                            "  zone={} furniture={} drawer={}",
                            selected_label(&row.zone_options),
                            selected_label(&row.furniture_options),
                            selected_label(&row.drawer_options)
                        )?;
                    } else if let Some(info) = &row.location_info {
                        write!(f, "  {}", info)?;
                    }
                    writeln!(f)?;
                }
            }
        }

        if self.submit_enabled {
            writeln!(f, "  submit to confirm, reset to start over")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::models::RecognizedItem;

    fn view(state: &WorkflowState, reconciler: &ResultReconciler) -> RenderView {
        let catalog = sample_catalog();
        render(&ViewInput {
            state,
            voice_available: true,
            elapsed_secs: 75,
            levels: &[30; 4],
            reconciler,
            catalog: &catalog,
        })
    }

    #[test]
    fn test_recording_view() {
        let reconciler = ResultReconciler::new(ReconcileMode::Flat);
        let v = view(&WorkflowState::Recording, &reconciler);
        assert_eq!(v.status_text, "Recording...");
        assert_eq!(v.timer_text, "01:15");
        assert_eq!(v.bars, vec![30; 4]);
        assert_eq!(v.start_label, "Stop recording");
        assert!(v.cancel_enabled);
        assert!(!v.submit_enabled);
    }

    #[test]
    fn test_ready_view_resets_meter() {
        let reconciler = ResultReconciler::new(ReconcileMode::Flat);
        let v = view(&WorkflowState::Ready, &reconciler);
        assert_eq!(v.status_text, "Ready to record");
        assert_eq!(v.timer_text, "00:00");
        assert_eq!(v.bars, vec![6; 4]);
        assert_eq!(v.results, ResultsView::Hidden);
        assert!(!v.submit_enabled);
    }

    #[test]
    fn test_results_submit_needs_items() {
        let mut reconciler = ResultReconciler::new(ReconcileMode::Location);
        let v = view(&WorkflowState::Results, &reconciler);
        assert!(!v.submit_enabled);
        assert!(matches!(v.results, ResultsView::Empty(_)));

        let mut item = RecognizedItem::named("Vis");
        item.zone_id = Some(1);
        reconciler.load(vec![item]);
        let v = view(&WorkflowState::Results, &reconciler);
        assert!(v.submit_enabled);
        match v.results {
            ResultsView::Items(rows) => {
                assert!(!rows[0].complete);
                assert_eq!(rows[0].furniture_options.len(), 3);
                assert_eq!(rows[0].drawer_options.len(), 1);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_view_carries_message() {
        let reconciler = ResultReconciler::new(ReconcileMode::Flat);
        let state = WorkflowState::Error(RecognitionError::MalformedResponse("x".into()));
        let v = view(&state, &reconciler);
        assert_eq!(v.state, "error");
        assert_eq!(v.status_text, "Invalid response format");
        assert!(!v.submit_enabled);
        assert!(matches!(
            v.results,
            ResultsView::Message {
                level: ToastLevel::Warning,
                ..
            }
        ));
        assert!(v.to_string().contains("The response format is invalid"));
    }
}
