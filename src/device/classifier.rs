use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest viewport still treated as a phone.
pub const MOBILE_MAX_WIDTH: u32 = 768;
/// Widest viewport still treated as a tablet.
pub const TABLET_MAX_WIDTH: u32 = 1024;

const GENERIC_MOBILE_MARKERS: &[&str] = &[
    "mobile",
    "iemobile",
    "opera mini",
    "blackberry",
    "webos",
    "windows phone",
    "kindle",
    "silk",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Mobile => "mobile",
            DeviceType::Tablet => "tablet",
            DeviceType::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperatingSystem {
    Ios,
    Android,
    Windows,
    Macos,
    Linux,
    Unknown,
}

/// What the client told us about its viewport, if anything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewportHints {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub touch: Option<bool>,
    /// Form-factor hint (`Sec-CH-UA-Mobile`), distinct from touch support.
    pub mobile: Option<bool>,
}

impl ViewportHints {
    pub fn width(width: u32) -> Self {
        Self {
            width: Some(width),
            ..Self::default()
        }
    }

    pub fn touch_width(width: u32) -> Self {
        Self {
            width: Some(width),
            touch: Some(true),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceClassification {
    #[serde(rename = "type")]
    pub device_type: DeviceType,
    pub os: OperatingSystem,
    pub touch_capable: bool,
    pub screen_width: Option<u32>,
    pub screen_height: Option<u32>,
}

fn in_tablet_range(width: Option<u32>) -> bool {
    matches!(width, Some(w) if w > MOBILE_MAX_WIDTH && w <= TABLET_MAX_WIDTH)
}

fn desktop_os(ua: &str) -> OperatingSystem {
    if ua.contains("windows") {
        OperatingSystem::Windows
    } else if ua.contains("mac os") || ua.contains("macintosh") {
        OperatingSystem::Macos
    } else if ua.contains("linux") || ua.contains("x11") {
        OperatingSystem::Linux
    } else {
        OperatingSystem::Unknown
    }
}

/// Classify a client from its user-agent and optional viewport hints.
///
/// Rules are tried in order and the first match wins:
///
/// 1. iPhone / iPod: mobile, iOS
/// 2. iPad: tablet, iOS
/// 3. Android with a tablet-range width or a tablet marker: tablet, Android
/// 4. Any other Android: mobile, Android
/// 5. Generic mobile user-agent, touch, width at most 768: mobile
/// 6. Touch and width in 769..=1024: tablet
/// 7. Everything else: desktop, OS from the user-agent
///
/// An Android user-agent without the `Mobile` token counts as a tablet
/// marker only when no width was reported. A `mobile` form-factor hint makes
/// any user-agent count as generic mobile. When no touch hint is supplied, touch is assumed for the mobile platforms
/// and generic mobile user-agents; when no width is supplied, rule 5 relies
/// on the user-agent alone.
///
/// The result depends only on the arguments, so the server (before render)
/// and the client (after a viewport change) always agree.
pub fn classify(user_agent: &str, hints: &ViewportHints) -> DeviceClassification {
    let ua = user_agent.to_ascii_lowercase();
    let width = hints.width;

    let generic_mobile =
        hints.mobile == Some(true) || GENERIC_MOBILE_MARKERS.iter().any(|m| ua.contains(m));
    let is_android = ua.contains("android");
    let is_iphone = ua.contains("iphone") || ua.contains("ipod");
    let is_ipad = ua.contains("ipad");

    let touch = hints
        .touch
        .unwrap_or(is_iphone || is_ipad || is_android || generic_mobile);

    let android_tablet_guess = width.is_none() && !ua.contains("mobile");

    let (device_type, os) = if is_iphone {
        (DeviceType::Mobile, OperatingSystem::Ios)
    } else if is_ipad {
        (DeviceType::Tablet, OperatingSystem::Ios)
    } else if is_android && (in_tablet_range(width) || ua.contains("tablet") || android_tablet_guess) {
        (DeviceType::Tablet, OperatingSystem::Android)
    } else if is_android {
        (DeviceType::Mobile, OperatingSystem::Android)
    } else if generic_mobile && touch && width.map_or(true, |w| w <= MOBILE_MAX_WIDTH) {
        (DeviceType::Mobile, OperatingSystem::Unknown)
    } else if touch && in_tablet_range(width) {
        (DeviceType::Tablet, OperatingSystem::Unknown)
    } else {
        (DeviceType::Desktop, desktop_os(&ua))
    };

    DeviceClassification {
        device_type,
        os,
        touch_capable: touch,
        screen_width: width,
        screen_height: hints.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const IPHONE: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1";
    const IPAD: &str = "Mozilla/5.0 (iPad; CPU OS 14_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/14.0 Mobile/15E148 Safari/604.1";
    const ANDROID_PHONE: &str = "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.91 Mobile Safari/537.36";
    const ANDROID_TABLET: &str = "Mozilla/5.0 (Linux; Android 11; SM-T870) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.91 Safari/537.36";
    const WINDOWS_PHONE: &str = "Mozilla/5.0 (Windows Phone 10.0; Android 6.0.1; Microsoft; Lumia 950) Mobile Safari/537.36 Edge/15.15063";
    const OPERA_MINI: &str = "Opera/9.80 (J2ME/MIDP; Opera Mini/9.80 (S60; SymbOS; Opera Mobi/23.348; U; en) Presto/2.5.25 Version/10.54";
    const WINDOWS_DESKTOP: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
    const MAC_DESKTOP: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15";
    const LINUX_DESKTOP: &str = "Mozilla/5.0 (X11; Linux x86_64; rv:121.0) Gecko/20100101 Firefox/121.0";

    #[test]
    fn test_iphone_is_mobile_ios() {
        let c = classify(IPHONE, &ViewportHints::default());
        assert_eq!(c.device_type, DeviceType::Mobile);
        assert_eq!(c.os, OperatingSystem::Ios);
        assert!(c.touch_capable);
    }

    #[test]
    fn test_iphone_wins_over_width() {
        // A landscape phone reporting a wide viewport is still a phone.
        let c = classify(IPHONE, &ViewportHints::width(900));
        assert_eq!(c.device_type, DeviceType::Mobile);
    }

    #[test]
    fn test_ipad_is_tablet_ios() {
        let c = classify(IPAD, &ViewportHints::width(1366));
        assert_eq!(c.device_type, DeviceType::Tablet);
        assert_eq!(c.os, OperatingSystem::Ios);
    }

    #[test]
    fn test_android_phone_and_tablet() {
        let phone = classify(ANDROID_PHONE, &ViewportHints::width(412));
        assert_eq!(phone.device_type, DeviceType::Mobile);
        assert_eq!(phone.os, OperatingSystem::Android);

        let tablet = classify(ANDROID_TABLET, &ViewportHints::default());
        assert_eq!(tablet.device_type, DeviceType::Tablet);
        assert_eq!(tablet.os, OperatingSystem::Android);

        // A phone user-agent in a tablet-sized viewport
        let wide = classify(ANDROID_PHONE, &ViewportHints::width(800));
        assert_eq!(wide.device_type, DeviceType::Tablet);
    }

    #[test]
    fn test_reported_width_overrides_android_tablet_guess() {
        // Reduced Chrome user agent: no model and no "Mobile" token.
        let reduced = "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

        let phone = classify(reduced, &ViewportHints::width(360));
        assert_eq!(phone.device_type, DeviceType::Mobile);
        assert_eq!(phone.os, OperatingSystem::Android);

        assert_eq!(classify(reduced, &ViewportHints::width(900)).device_type, DeviceType::Tablet);
        assert_eq!(classify(reduced, &ViewportHints::default()).device_type, DeviceType::Tablet);
    }

    #[test]
    fn test_form_factor_hint_does_not_override_touch() {
        let hints = ViewportHints {
            width: Some(900),
            mobile: Some(false),
            ..ViewportHints::default()
        };
        let c = classify(ANDROID_TABLET, &hints);
        assert_eq!(c.device_type, DeviceType::Tablet);
        assert!(c.touch_capable);
    }

    #[test]
    fn test_form_factor_hint_marks_generic_mobile() {
        let hints = ViewportHints {
            width: Some(400),
            mobile: Some(true),
            ..ViewportHints::default()
        };
        let c = classify("Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/121.0", &hints);
        assert_eq!(c.device_type, DeviceType::Mobile);
        assert!(c.touch_capable);
    }

    #[test]
    fn test_generic_mobile_user_agents() {
        let c = classify(OPERA_MINI, &ViewportHints::default());
        assert_eq!(c.device_type, DeviceType::Mobile);
        assert_eq!(c.os, OperatingSystem::Unknown);

        // Windows Phone carries an Android token and follows the Android rules.
        let c = classify(WINDOWS_PHONE, &ViewportHints::width(360));
        assert_eq!(c.device_type, DeviceType::Mobile);
    }

    #[test]
    fn test_width_boundaries() {
        let generic = "Mozilla/5.0 (Mobile; rv:48.0) Gecko/48.0 Firefox/48.0";
        assert_eq!(classify(generic, &ViewportHints::touch_width(768)).device_type, DeviceType::Mobile);
        assert_eq!(classify(generic, &ViewportHints::touch_width(769)).device_type, DeviceType::Tablet);
        assert_eq!(classify(generic, &ViewportHints::touch_width(1024)).device_type, DeviceType::Tablet);
        assert_eq!(classify(generic, &ViewportHints::touch_width(1025)).device_type, DeviceType::Desktop);
    }

    #[test]
    fn test_touch_laptop_in_tablet_range() {
        let hints = ViewportHints::touch_width(1000);
        assert_eq!(classify(WINDOWS_DESKTOP, &hints).device_type, DeviceType::Tablet);

        // Without touch the same width is a desktop window.
        let hints = ViewportHints::width(1000);
        let c = classify(WINDOWS_DESKTOP, &hints);
        assert_eq!(c.device_type, DeviceType::Desktop);
        assert!(!c.touch_capable);
    }

    #[test]
    fn test_desktop_operating_systems() {
        let none = ViewportHints::default();
        assert_eq!(classify(WINDOWS_DESKTOP, &none).os, OperatingSystem::Windows);
        assert_eq!(classify(MAC_DESKTOP, &none).os, OperatingSystem::Macos);
        assert_eq!(classify(LINUX_DESKTOP, &none).os, OperatingSystem::Linux);
        assert_eq!(classify("curl/8.4.0", &none).os, OperatingSystem::Unknown);
        assert_eq!(classify("", &none).device_type, DeviceType::Desktop);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let agents = [IPHONE, IPAD, ANDROID_PHONE, ANDROID_TABLET, OPERA_MINI, WINDOWS_DESKTOP, ""];
        let widths = [None, Some(320), Some(768), Some(769), Some(1024), Some(1025), Some(2560)];
        for ua in agents {
            for width in widths {
                let hints = ViewportHints { width, height: Some(700), ..ViewportHints::default() };
                assert_eq!(classify(ua, &hints), classify(ua, &hints));
            }
        }
    }

    #[test]
    fn test_hints_are_echoed() {
        let hints = ViewportHints { width: Some(390), height: Some(844), touch: Some(true), mobile: None };
        let c = classify(IPHONE, &hints);
        assert_eq!(c.screen_width, Some(390));
        assert_eq!(c.screen_height, Some(844));
    }

    #[test]
    fn test_serializes_with_type_key() {
        let c = classify(IPHONE, &ViewportHints::default());
        let json = serde_json::to_value(c).unwrap();
        assert_eq!(json["type"], "mobile");
        assert_eq!(json["os"], "ios");
        assert_eq!(json["touchCapable"], true);
    }
}
