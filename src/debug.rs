use crate::playback::Advancement;
#[cfg(feature = "debug")]
use serde_json::json;

#[cfg(feature = "debug")]
thread_local!(
    static DEBUG_FRAME: std::cell::RefCell<Vec<serde_json::Value>> = Default::default();
);

#[allow(unused)]
pub fn record_advancement(advancement: &Advancement) {
    #[cfg(feature = "debug")]
    DEBUG_FRAME.with(|frame| {
        frame.borrow_mut().push(json!({
            "type": "advancement",
            "index": advancement.new_index,
            "progress": advancement.progress_percent,
            "speed_kmh": advancement.speed_kmh,
            "cleared_signals": advancement.cleared_signals,
            "arrived": advancement.arrived,
        }))
    })
}

#[cfg(feature = "debug")]
pub fn take_debug_frame() -> serde_json::Value {
    json!(DEBUG_FRAME.with(|frame| frame.take()))
}
