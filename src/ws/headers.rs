//! Upgrade-request header merge.

use crate::network::{DEFAULT_HEADERS, DEFAULT_ORIGIN};
use crate::ws::ConnectOptions;

/// Headers for the upgrade request of a connect call.
///
/// Starts from the browser defaults, lets caller headers replace them by
/// name (case-insensitive) and appends the rest. `Origin` is added from
/// `opts.origin` or the default origin; `Host` only when `opts.host` is set.
/// An explicit caller header always beats both.
pub fn merge_headers(opts: &ConnectOptions) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = DEFAULT_HEADERS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect();

    for (name, value) in &opts.headers {
        set_header(&mut merged, name, value);
    }

    if !contains(&opts.headers, "Origin") {
        let origin = opts.origin.as_deref().unwrap_or(DEFAULT_ORIGIN);
        set_header(&mut merged, "Origin", origin);
    }

    if let Some(host) = &opts.host {
        if !contains(&opts.headers, "Host") {
            set_header(&mut merged, "Host", host);
        }
    }

    merged
}

/// Case-insensitive header lookup.
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

fn contains(headers: &[(String, String)], name: &str) -> bool {
    header_value(headers, name).is_some()
}

fn set_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers.iter_mut().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        Some(existing) => existing.1 = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}
