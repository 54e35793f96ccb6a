use crate::error::{Result, ScannerError};
use footprint_catalog::SiteDefinition;
use std::collections::BTreeMap;

/// Placeholder values for one probe, keyed by placeholder name.
pub type ProbeParams = BTreeMap<String, String>;

const COMPONENT: &str = "URL Builder";

/// Render the site's URL template with `params`.
///
/// Values are form-encoded (spaces become `+`) when the site asks for it.
/// Every placeholder the template uses must have a value.
pub fn build_probe_url(site: &SiteDefinition, params: &ProbeParams) -> Result<String> {
    let mut url = site.url_template.clone();

    for name in &site.placeholders {
        let value = params.get(name).ok_or_else(|| {
            ScannerError::invalid_input(
                COMPONENT,
                format!("site '{}' needs a value for {{{name}}}", site.id),
            )
        })?;

        url = url.replace(&format!("{{{name}}}"), &render_value(site, value));
    }

    // Advanced placeholders are optional and collapse to nothing when unset
    for name in &site.advanced_placeholders {
        if site.placeholders.contains(name) {
            continue;
        }
        let value = params.get(name).map(String::as_str).unwrap_or_default();
        url = url.replace(&format!("{{{name}}}"), &render_value(site, value));
    }

    Ok(url)
}

fn render_value(site: &SiteDefinition, value: &str) -> String {
    if site.url_encode {
        url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
    } else {
        value.to_string()
    }
}

/// Parameters for a site keyed only by the username placeholder.
#[must_use]
pub fn username_params(username: &str) -> ProbeParams {
    BTreeMap::from([(
        footprint_catalog::definition::DEFAULT_PLACEHOLDER.to_string(),
        username.to_string(),
    )])
}
