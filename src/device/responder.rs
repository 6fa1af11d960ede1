use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::config::DeviceConfig;
use crate::device::classifier::{DeviceClassification, DeviceType};

/// Asset tree used when a device-specific file is missing.
pub const DEFAULT_ASSET_TREE: &str = "default";

const FALLBACK_PAGE: &str = "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n<title>Bingo</title>\n\
<link rel=\"stylesheet\" href=\"{{asset_base}}/app.css\">\n</head>\n\
<body class=\"device-{{device_type}}\">\n<main id=\"app\"></main>\n\
<script src=\"{{asset_base}}/app.js\" defer></script>\n</body>\n</html>\n";

/// Which of the three markup templates to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkupVariant {
    Mobile,
    Tablet,
    Desktop,
}

impl MarkupVariant {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkupVariant::Mobile => "mobile",
            MarkupVariant::Tablet => "tablet",
            MarkupVariant::Desktop => "desktop",
        }
    }
}

impl From<DeviceType> for MarkupVariant {
    fn from(device_type: DeviceType) -> Self {
        match device_type {
            DeviceType::Mobile => MarkupVariant::Mobile,
            DeviceType::Tablet => MarkupVariant::Tablet,
            DeviceType::Desktop => MarkupVariant::Desktop,
        }
    }
}

/// Everything the HTTP layer needs to answer one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponsePlan {
    pub markup: MarkupVariant,
    /// Directory name under the assets root searched first.
    pub asset_variant: &'static str,
    pub cache_control: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheLifetimes {
    pub mobile: u32,
    pub tablet: u32,
    pub desktop: u32,
}

/// A resolved asset on disk and the tree it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAsset {
    pub path: PathBuf,
    pub from_fallback: bool,
}

/// Picks markup, assets and cache headers for a classified request.
#[derive(Debug, Clone)]
pub struct DeviceResponder {
    templates_dir: PathBuf,
    assets_dir: PathBuf,
    lifetimes: CacheLifetimes,
}

impl DeviceResponder {
    pub fn new(templates_dir: impl Into<PathBuf>, assets_dir: impl Into<PathBuf>, lifetimes: CacheLifetimes) -> Self {
        Self {
            templates_dir: templates_dir.into(),
            assets_dir: assets_dir.into(),
            lifetimes,
        }
    }

    pub fn from_config(config: &DeviceConfig) -> Self {
        Self::new(
            &config.templates_dir,
            &config.assets_dir,
            CacheLifetimes {
                mobile: config.mobile_max_age,
                tablet: config.tablet_max_age,
                desktop: config.desktop_max_age,
            },
        )
    }

    /// Plan the response. No classification means desktop.
    pub fn respond(&self, classification: Option<&DeviceClassification>) -> ResponsePlan {
        let device_type = classification.map_or(DeviceType::Desktop, |c| c.device_type);
        let markup = MarkupVariant::from(device_type);
        let max_age = match markup {
            MarkupVariant::Mobile => self.lifetimes.mobile,
            MarkupVariant::Tablet => self.lifetimes.tablet,
            MarkupVariant::Desktop => self.lifetimes.desktop,
        };

        ResponsePlan {
            markup,
            asset_variant: markup.as_str(),
            cache_control: format!("public, max-age={}", max_age),
        }
    }

    /// Markup for `page`, trying the variant template, then the desktop one,
    /// then a built-in shell.
    pub async fn render_page(&self, page: &str, plan: &ResponsePlan) -> String {
        let mut candidates = vec![plan.markup];
        if plan.markup != MarkupVariant::Desktop {
            candidates.push(MarkupVariant::Desktop);
        }

        let mut template = None;
        for variant in candidates {
            let path = self.templates_dir.join(format!("{}.{}.html", page, variant.as_str()));
            match tokio::fs::read_to_string(&path).await {
                Ok(contents) => {
                    debug!("Rendering {} for {}", path.display(), plan.markup.as_str());
                    template = Some(contents);
                    break;
                }
                Err(e) => debug!("Template {} unavailable: {}", path.display(), e),
            }
        }

        let template = template.unwrap_or_else(|| {
            warn!("No template found for page {}, serving built-in shell", page);
            FALLBACK_PAGE.to_string()
        });

        template
            .replace("{{device_type}}", plan.markup.as_str())
            .replace("{{asset_base}}", &format!("/assets/{}", plan.asset_variant))
    }

    /// Locate an asset for the plan's variant, falling back to the default
    /// tree. Paths that try to leave the assets root resolve to nothing.
    pub async fn resolve_asset(&self, plan: &ResponsePlan, relative: &str) -> Option<ResolvedAsset> {
        let relative = sanitize_relative(relative)?;

        for (tree, from_fallback) in [(plan.asset_variant, false), (DEFAULT_ASSET_TREE, true)] {
            let path = self.assets_dir.join(tree).join(&relative);
            if tokio::fs::metadata(&path).await.map(|m| m.is_file()).unwrap_or(false) {
                return Some(ResolvedAsset { path, from_fallback });
            }
        }
        None
    }
}

fn sanitize_relative(relative: &str) -> Option<PathBuf> {
    let path = Path::new(relative);
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

/// Content type from a file extension.
pub fn mime_type(path: &Path) -> &'static str {
    match path.extension().and_then(|s| s.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js") | Some("mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("mp3") => "audio/mpeg",
        _ => "application/octet-stream",
    }
}
