use std::collections::BTreeMap;

/// Parse `KEY1=VALUE1,KEY2=VALUE2` into an ordered map.
///
/// The value is everything after the first `=`, so values may contain `=`.
/// Empty input yields an empty map.
pub fn parse_env_vars(input: &str) -> crate::Result<BTreeMap<String, String>> {
    let mut vars = BTreeMap::new();

    for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| crate::Error::InvalidEnvVar {
                entry: entry.to_owned(),
            })?;

        let key = key.trim();
        if key.is_empty() {
            return Err(crate::Error::InvalidEnvVar {
                entry: entry.to_owned(),
            });
        }
        vars.insert(key.to_owned(), value.to_owned());
    }

    Ok(vars)
}

/// Render a map back into the `KEY=VALUE,...` form gcloud flags expect.
pub fn format_env_vars(vars: &BTreeMap<String, String>) -> String {
    vars.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}
