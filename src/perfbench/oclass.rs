use regex::Regex;

use super::error::{Error, Result};

// Recognized redundancy specifiers, tried in order. First pattern with a
// match wins and only its first occurrence is summed; object classes carry a
// single specifier.
const PATTERNS: &'static [&'static str] = &["EC_([0-9]+)P([0-9]+)", "RP_([0-9]+)"];

/// Minimum number of hosts implied by an object class: the sum of the numeric
/// groups of its redundancy specifier (`EC_<data>P<parity>` or
/// `RP_<replicas>`). `None` for classes with no specifier (e.g. `SX`); those
/// carry no host requirement.
pub fn min_hosts(oclass: &str) -> Option<usize> {
    for pattern in PATTERNS {
        let re = Regex::new(pattern).expect("hard-coded oclass pattern");
        if let Some(caps) = re.captures(oclass) {
            let min = caps.iter()
                .skip(1)
                .filter_map(|group| group)
                .filter_map(|group| group.as_str().parse::<usize>().ok())
                .sum();
            return Some(min);
        }
    }
    None
}

/// Fail if the object class needs more hosts than are available. Classes
/// matching neither pattern pass silently; this check is advisory, not a full
/// object-class validator.
pub fn verify_compat(oclass: &str, num_hosts: usize) -> Result<()> {
    if let Some(min) = min_hosts(oclass) {
        if num_hosts < min {
            return Err(Error::Capacity {
                min: min,
                oclass: oclass.to_string(),
            });
        }
    }
    Ok(())
}
