use actix_web::http::header::{HeaderMap, USER_AGENT};
use actix_web::HttpRequest;
use tracing::debug;

use crate::device::classifier::ViewportHints;

// Anything wider than an 8K display is noise.
const MAX_VIEWPORT_DIMENSION: u32 = 7680;

fn parse_dimension(raw: &str) -> Option<u32> {
    // Client hints may be fractional CSS pixels.
    let value: f64 = raw.trim().parse().ok()?;
    if value.is_finite() && value > 0.0 && value <= MAX_VIEWPORT_DIMENSION as f64 {
        Some(value.round() as u32)
    } else {
        None
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "?1" => Some(true),
        "0" | "false" | "no" | "?0" => Some(false),
        _ => None,
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Hints from the query string: `vw`, `vh` and `touch`.
pub fn hints_from_query(query: &str) -> ViewportHints {
    let mut hints = ViewportHints::default();
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            "vw" => hints.width = parse_dimension(&value).or(hints.width),
            "vh" => hints.height = parse_dimension(&value).or(hints.height),
            "touch" => hints.touch = parse_flag(&value).or(hints.touch),
            _ => {}
        }
    }
    hints
}

/// Hints from standard client-hint headers.
pub fn hints_from_headers(headers: &HeaderMap) -> ViewportHints {
    ViewportHints {
        width: header(headers, "sec-ch-viewport-width")
            .or_else(|| header(headers, "viewport-width"))
            .and_then(parse_dimension),
        height: header(headers, "sec-ch-viewport-height").and_then(parse_dimension),
        touch: None,
        mobile: header(headers, "sec-ch-ua-mobile").and_then(parse_flag),
    }
}

/// Query hints take precedence over headers; malformed values are ignored.
pub fn viewport_hints(req: &HttpRequest) -> ViewportHints {
    let query = hints_from_query(req.query_string());
    let headers = hints_from_headers(req.headers());
    let hints = ViewportHints {
        width: query.width.or(headers.width),
        height: query.height.or(headers.height),
        touch: query.touch.or(headers.touch),
        mobile: query.mobile.or(headers.mobile),
    };
    debug!("Viewport hints: {:?}", hints);
    hints
}

pub fn user_agent(req: &HttpRequest) -> &str {
    req.headers()
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::classifier::{classify, DeviceType};
    use actix_web::test::TestRequest;

    #[test]
    fn test_query_hints() {
        let hints = hints_from_query("vw=390&vh=844&touch=1&ref=promo");
        assert_eq!(
            hints,
            ViewportHints { width: Some(390), height: Some(844), touch: Some(true), mobile: None }
        );
    }

    #[test]
    fn test_malformed_hints_are_ignored() {
        let hints = hints_from_query("vw=wide&vh=-3&touch=maybe");
        assert_eq!(hints, ViewportHints::default());
        assert_eq!(hints_from_query("vw=99999").width, None);
    }

    #[test]
    fn test_client_hint_headers() {
        let req = TestRequest::default()
            .insert_header(("Sec-CH-Viewport-Width", "1023.6"))
            .insert_header(("Sec-CH-UA-Mobile", "?0"))
            .to_http_request();
        let hints = hints_from_headers(req.headers());
        assert_eq!(hints.width, Some(1024));
        assert_eq!(hints.touch, None);
        assert_eq!(hints.mobile, Some(false));
    }

    #[test]
    fn test_android_tablet_reporting_not_mobile_keeps_touch() {
        let req = TestRequest::default()
            .insert_header((
                "User-Agent",
                "Mozilla/5.0 (Linux; Android 11; SM-T870) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/90.0.4430.91 Safari/537.36",
            ))
            .insert_header(("Sec-CH-Viewport-Width", "900"))
            .insert_header(("Sec-CH-UA-Mobile", "?0"))
            .to_http_request();
        let c = classify(user_agent(&req), &viewport_hints(&req));
        assert_eq!(c.device_type, DeviceType::Tablet);
        assert!(c.touch_capable);
    }

    #[test]
    fn test_query_overrides_headers() {
        let req = TestRequest::with_uri("/?vw=700")
            .insert_header(("Viewport-Width", "1200"))
            .insert_header(("User-Agent", "curl/8.4.0"))
            .to_http_request();
        assert_eq!(viewport_hints(&req).width, Some(700));
        assert_eq!(user_agent(&req), "curl/8.4.0");
    }

    #[test]
    fn test_missing_user_agent_is_empty() {
        let req = TestRequest::default().to_http_request();
        assert_eq!(user_agent(&req), "");
    }
}
