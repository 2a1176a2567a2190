use keystone_store::Coordinate;

/// Group prefixes of host framework artifacts. Extensions never get their own copy of
/// these; the host's definitions are used instead.
pub const EXCLUSIONS: [&str; 2] = ["io.keystone", "com.keystone.framework"];

/// Returns the exclusion prefix matching `group`, if any.
///
/// Matching is done on whole `.`-separated segments, so `io.keystone` covers
/// `io.keystone.core` but not `io.keystonex`.
pub fn excluded_by(group: &str) -> Option<&'static str> {
    EXCLUSIONS.into_iter().find(|prefix| {
        group == *prefix
            || group
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

pub fn is_excluded(coordinate: &Coordinate) -> bool {
    excluded_by(coordinate.group()).is_some()
}
