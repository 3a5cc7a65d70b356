//! `%(key)s` references between configuration values

use super::ConfigError;
use std::collections::BTreeMap;

/// Deeper chains than this are treated as a reference cycle
pub const MAX_DEPTH: usize = 10;

/// Expand every value of `raw` against the other values of `raw`
pub fn resolve_all(raw: &BTreeMap<String, String>) -> Result<BTreeMap<String, String>, ConfigError> {
    raw.iter()
        .map(|(key, value)| Ok((key.clone(), expand(raw, key, value, 0)?)))
        .collect()
}

fn expand(
    raw: &BTreeMap<String, String>,
    key: &str,
    value: &str,
    depth: usize,
) -> Result<String, ConfigError> {
    if depth > MAX_DEPTH {
        return Err(ConfigError::InterpolationDepth {
            key: key.to_string(),
            max: MAX_DEPTH,
        });
    }

    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(at) = rest.find('%') {
        out.push_str(&rest[..at]);
        let tail = &rest[at..];

        if let Some(after) = tail.strip_prefix("%%") {
            out.push('%');
            rest = after;
            continue;
        }

        // %(name)s
        let reference = tail
            .strip_prefix("%(")
            .and_then(|inner| inner.split_once(")s"))
            .filter(|(name, _)| !name.is_empty() && !name.contains('('));
        match reference {
            Some((name, after)) => {
                let name = name.to_lowercase();
                let referenced = raw
                    .get(&name)
                    .ok_or_else(|| ConfigError::UnresolvedReference {
                        key: key.to_string(),
                        reference: name.clone(),
                    })?;
                out.push_str(&expand(raw, &name, referenced, depth + 1)?);
                rest = after;
            }
            None => {
                // A lone percent sign is kept as written
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_nested_references() {
        let raw = map(&[
            ("pki_root_prefix", "/tmp/root"),
            ("pki_path", "%(pki_root_prefix)s/var/lib/pki"),
            ("pki_instance_path", "%(pki_path)s/%(pki_instance_name)s"),
            ("pki_instance_name", "pki-tomcat"),
        ]);
        let resolved = resolve_all(&raw).unwrap();
        assert_eq!(resolved["pki_instance_path"], "/tmp/root/var/lib/pki/pki-tomcat");
    }

    #[test]
    fn test_literal_percent() {
        let raw = map(&[("pki_pin", "100%% sure"), ("other", "%(pki_pin)s!")]);
        let resolved = resolve_all(&raw).unwrap();
        assert_eq!(resolved["pki_pin"], "100% sure");
        assert_eq!(resolved["other"], "100% sure!");
    }

    #[test]
    fn test_reference_is_case_insensitive() {
        let raw = map(&[("pki_user", "pkiuser"), ("owner", "%(PKI_USER)s")]);
        assert_eq!(resolve_all(&raw).unwrap()["owner"], "pkiuser");
    }

    #[test]
    fn test_lone_percent_kept() {
        let raw = map(&[("pki_pin", "50%off")]);
        assert_eq!(resolve_all(&raw).unwrap()["pki_pin"], "50%off");
    }

    #[test]
    fn test_unresolved_reference() {
        let raw = map(&[("pki_path", "%(pki_missing)s/x")]);
        assert!(matches!(
            resolve_all(&raw),
            Err(ConfigError::UnresolvedReference { reference, .. }) if reference == "pki_missing"
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let raw = map(&[("a", "%(b)s"), ("b", "%(a)s")]);
        assert!(matches!(
            resolve_all(&raw),
            Err(ConfigError::InterpolationDepth { .. })
        ));
    }
}
