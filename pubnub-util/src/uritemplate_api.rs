//! Thin helper over the `uritemplate` crate for the handful of endpoints
//! whose path shape is easier to express as a template than to `format!`
//! by hand (channel-group administration, which has optional trailing
//! segments).

use uritemplate::UriTemplate;

/// Expand `template` (RFC 6570 syntax) with `vars`, where each var is
/// already in its final percent-encoded form — `uritemplate` is used here
/// purely for segment assembly, not for its own encoding pass, since
/// PubNub's encoding rules (comma-preserving for lists) differ from the
/// template spec's defaults.
#[must_use]
pub fn expand(template: &str, vars: &[(&str, &str)]) -> String {
    let mut tpl = UriTemplate::new(template);
    for (key, value) in vars {
        tpl.set(key, *value);
    }
    tpl.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_simple_template() {
        let out = expand(
            "/v1/channel-registration/sub-key/{sub_key}/channel-group/{group}",
            &[("sub_key", "demo"), ("group", "g1")],
        );
        assert_eq!(
            out,
            "/v1/channel-registration/sub-key/demo/channel-group/g1"
        );
    }
}
