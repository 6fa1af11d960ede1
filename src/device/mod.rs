//! Device classification and device-aware page delivery.

pub mod classifier;
pub mod handlers;
pub mod hints;
pub mod responder;

pub use classifier::{
    classify, DeviceClassification, DeviceType, OperatingSystem, ViewportHints, MOBILE_MAX_WIDTH,
    TABLET_MAX_WIDTH,
};
pub use responder::{CacheLifetimes, DeviceResponder, MarkupVariant, ResponsePlan};
