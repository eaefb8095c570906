use orchestrator_protocol::{InboundEvent, OutboundEvent};

use crate::error::OrchestratorApiError;

const FRAME_PREVIEW_CHARS: usize = 200;

/// Decode one text frame from the agent channel.
///
/// Frames that are not JSON objects, lack a `type` tag, or carry an unknown tag
/// are reported as [`OrchestratorApiError::MalformedFrame`] with a truncated
/// copy of the frame for logging.
pub fn parse_frame(text: &str) -> Result<InboundEvent, OrchestratorApiError> {
    serde_json::from_str::<InboundEvent>(text).map_err(|error| {
        OrchestratorApiError::MalformedFrame {
            message: error.to_string(),
            frame: frame_preview(text),
        }
    })
}

/// Encode one outbound event as a text frame.
pub fn encode_frame(event: &OutboundEvent) -> Result<String, OrchestratorApiError> {
    Ok(serde_json::to_string(event)?)
}

fn frame_preview(text: &str) -> String {
    if text.chars().count() <= FRAME_PREVIEW_CHARS {
        return text.to_string();
    }

    let mut preview: String = text.chars().take(FRAME_PREVIEW_CHARS).collect();
    preview.push('…');
    preview
}
