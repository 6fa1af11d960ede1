use tracing::debug;

use crate::device::{classify, DeviceClassification, DeviceType, ViewportHints};

/// Re-classifies the device as the viewport changes and reports only the
/// transitions that cross a device-type boundary.
#[derive(Debug, Clone)]
pub struct ViewportTracker {
    user_agent: String,
    current: DeviceClassification,
}

impl ViewportTracker {
    pub fn new(user_agent: impl Into<String>, hints: &ViewportHints) -> Self {
        let user_agent = user_agent.into();
        let current = classify(&user_agent, hints);
        Self { user_agent, current }
    }

    pub fn current(&self) -> &DeviceClassification {
        &self.current
    }

    pub fn device_type(&self) -> DeviceType {
        self.current.device_type
    }

    /// Feed a resize. Returns the new classification when the device type
    /// changed, `None` otherwise.
    pub fn resize(&mut self, hints: &ViewportHints) -> Option<&DeviceClassification> {
        let next = classify(&self.user_agent, hints);
        let changed = next.device_type != self.current.device_type;
        self.current = next;

        if changed {
            debug!("Viewport now classifies as {}", self.current.device_type);
            Some(&self.current)
        } else {
            None
        }
    }
}
