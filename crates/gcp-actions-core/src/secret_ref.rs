use std::fmt;

/// A Secret Manager secret bound to an output name, written as `output:ref`.
///
/// Accepted reference forms:
///
/// - `projects/<p>/secrets/<s>/versions/<v>`
/// - `projects/<p>/secrets/<s>` (version `latest`)
/// - `<p>/<s>/<v>`
/// - `<p>/<s>` (version `latest`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretReference {
    pub output: String,
    pub project: String,
    pub name: String,
    pub version: String,
}

impl SecretReference {
    pub fn parse(s: &str) -> crate::Result<Self> {
        let invalid = |reason| crate::Error::InvalidSecretRef {
            reference: s.to_owned(),
            reason,
        };

        let (output, reference) = s.split_once(':').ok_or_else(|| invalid("missing destination"))?;
        let output = output.trim();
        if output.is_empty() {
            return Err(invalid("missing destination"));
        }

        let parts: Vec<&str> = reference.trim().split('/').collect();
        let (project, name, version) = match parts.as_slice() {
            ["projects", p, "secrets", s, "versions", v] => (*p, *s, *v),
            ["projects", p, "secrets", s] => (*p, *s, "latest"),
            [p, s, v] => (*p, *s, *v),
            [p, s] => (*p, *s, "latest"),
            _ => return Err(invalid("unknown format")),
        };

        if [project, name, version].iter().any(|part| part.is_empty()) {
            return Err(invalid("empty path segment"));
        }

        Ok(Self {
            output: output.to_owned(),
            project: project.to_owned(),
            name: name.to_owned(),
            version: version.to_owned(),
        })
    }

    /// Full resource name of the secret version.
    pub fn self_link(&self) -> String {
        format!(
            "projects/{}/secrets/{}/versions/{}",
            self.project, self.name, self.version
        )
    }
}

impl fmt::Display for SecretReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.output, self.self_link())
    }
}

/// Parse a newline- and/or comma-separated list of references.
/// Blank entries are skipped.
pub fn parse_secret_refs(input: &str) -> crate::Result<Vec<SecretReference>> {
    input
        .lines()
        .flat_map(|line| line.split(','))
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .map(SecretReference::parse)
        .collect()
}
