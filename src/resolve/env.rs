//! Environment variable expansion against an explicit snapshot.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::sync::LazyLock;

use regex::{Captures, Regex};

static ENV_VAR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
        .expect("valid env var regex")
});

/// A frozen copy of environment variables used for path expansion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvSnapshot {
    vars: BTreeMap<String, String>,
}

impl EnvSnapshot {
    /// Captures the current process environment.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn capture() -> Self {
        Self::from_os_vars(std::env::vars_os())
    }

    /// Builds a snapshot from raw OS pairs, skipping non-UTF-8 entries.
    pub fn from_os_vars<I: IntoIterator<Item = (OsString, OsString)>>(vars: I) -> Self {
        Self {
            vars: vars
                .into_iter()
                .filter_map(|(name, value)| Some((name.into_string().ok()?, value.into_string().ok()?)))
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

impl FromIterator<(String, String)> for EnvSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().collect(),
        }
    }
}

/// Expands `$VAR`, `${VAR}` and a leading `~` using `env`.
///
/// Unset variables are left verbatim, as is `~` when `HOME` is unset.
pub fn expand(input: &str, env: &EnvSnapshot) -> String {
    let with_home = match (input.strip_prefix('~'), env.get("HOME")) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", home, rest)
        }
        _ => input.to_string(),
    };

    ENV_VAR_RE
        .replace_all(&with_home, |caps: &Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            env.get(name)
                .map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expands_both_forms() {
        let env = EnvSnapshot::empty()
            .with_var("CODE", "/home/u/code")
            .with_var("TEMP_PIPE_LOCS", "validation-value");
        assert_eq!(expand("$CODE/atac.py", &env), "/home/u/code/atac.py");
        assert_eq!(expand("${CODE}/atac.py", &env), "/home/u/code/atac.py");
        assert_eq!(
            expand("path/to/$TEMP_PIPE_LOCS", &env),
            "path/to/validation-value"
        );
    }

    #[test]
    fn test_unset_variables_left_verbatim() {
        let env = EnvSnapshot::empty();
        assert_eq!(expand("$NOPE/x/${ALSO_NOPE}", &env), "$NOPE/x/${ALSO_NOPE}");
        assert_eq!(expand("./arbitrary-test-pipelines", &env), "./arbitrary-test-pipelines");
    }

    #[test]
    fn test_home_expansion() {
        let env = EnvSnapshot::empty()
            .with_var("HOME", "/home/u")
            .with_var("TEMPORARY_SUBFOLDER", "tmp");
        assert_eq!(expand("~/code_home", &env), "/home/u/code_home");
        assert_eq!(expand("~/$TEMPORARY_SUBFOLDER/leaf", &env), "/home/u/tmp/leaf");
        assert_eq!(expand("~other/x", &env), "~other/x");
        assert_eq!(expand("~/x", &EnvSnapshot::empty()), "~/x");
    }

    #[cfg(unix)]
    #[test]
    fn test_non_utf8_variables_skipped() {
        use std::os::unix::ffi::OsStringExt;

        let env = EnvSnapshot::from_os_vars(vec![
            (OsString::from("CODE"), OsString::from("/opt/code")),
            (OsString::from("BADVAR"), OsString::from_vec(vec![0xff, 0xfe])),
            (OsString::from_vec(vec![0xc3, 0x28]), OsString::from("x")),
        ]);
        assert_eq!(env.get("CODE"), Some("/opt/code"));
        assert_eq!(env.get("BADVAR"), None);
        assert_eq!(expand("$CODE/$BADVAR", &env), "/opt/code/$BADVAR");
    }

    #[test]
    fn test_capture_does_not_panic() {
        let env = EnvSnapshot::capture();
        assert_eq!(env, EnvSnapshot::capture());
    }

    #[test]
    fn test_snapshot_is_isolated_from_process() {
        let env: EnvSnapshot = vec![("ONLY".to_string(), "here".to_string())]
            .into_iter()
            .collect();
        assert_eq!(expand("$ONLY", &env), "here");
        assert_eq!(expand("$PATH", &env), "$PATH");
    }
}
