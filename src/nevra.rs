// src/nevra.rs

//! Package naming: NEVRA parsing, display forms and version comparison

use crate::error::{Error, Result};
use regex::RegexBuilder;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A fully qualified package build: name, epoch, version, release, arch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nevra {
    pub name: String,
    pub epoch: i64,
    pub version: String,
    pub release: String,
    pub arch: String,
}

impl Nevra {
    pub fn new(name: &str, epoch: i64, version: &str, release: &str, arch: &str) -> Self {
        Self {
            name: name.to_string(),
            epoch,
            version: version.to_string(),
            release: release.to_string(),
            arch: arch.to_string(),
        }
    }

    /// Compare two builds: epoch outranks version; release does not
    /// participate in the ordering. Version segments are compared
    /// numerically; non-numeric segments count as zero and a missing
    /// segment compares as zero, so `1.0` and `1.0.0` are equal.
    pub fn cmp_evr(&self, other: &Nevra) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }
        cmp_segments(&self.version, &other.version)
    }

    /// Every form a user may type to mean this package.
    pub fn spec_forms(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            format!("{}.{}", self.name, self.arch),
            format!("{}-{}-{}.{}", self.name, self.version, self.release, self.arch),
            format!("{}-{}", self.name, self.version),
            format!("{}-{}-{}", self.name, self.version, self.release),
            format!(
                "{}:{}-{}-{}.{}",
                self.epoch, self.name, self.version, self.release, self.arch
            ),
            format!(
                "{}-{}-{}-{}-{}",
                self.name, self.epoch, self.version, self.release, self.arch
            ),
        ]
    }

    /// Case-insensitive regex match of a pattern against any spec form.
    pub fn matches(&self, pattern: &str) -> Result<bool> {
        let re = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| Error::ParseError(e.to_string()))?;
        Ok(self.spec_forms().iter().any(|form| re.is_match(form)))
    }
}

impl fmt::Display for Nevra {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch == 0 {
            write!(
                f,
                "{}-{}-{}.{}",
                self.name, self.version, self.release, self.arch
            )
        } else {
            write!(
                f,
                "{}-{}:{}-{}.{}",
                self.name, self.epoch, self.version, self.release, self.arch
            )
        }
    }
}

impl FromStr for Nevra {
    type Err = String;

    /// Parse `name-[epoch:]version-release.arch`. The name may itself
    /// contain dashes; the version and release may not.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let (rest, arch) = s
            .rsplit_once('.')
            .ok_or_else(|| format!("missing arch in {s}"))?;
        let (rest, release) = rest
            .rsplit_once('-')
            .ok_or_else(|| format!("missing release in {s}"))?;
        let (name, evr) = rest
            .rsplit_once('-')
            .ok_or_else(|| format!("missing version in {s}"))?;
        let (epoch, version) = match evr.split_once(':') {
            Some((epoch, version)) => (
                epoch
                    .parse::<i64>()
                    .map_err(|_| format!("invalid epoch in {s}"))?,
                version,
            ),
            None => (0, evr),
        };
        if name.is_empty() || version.is_empty() || release.is_empty() || arch.is_empty() {
            return Err(format!("malformed nevra {s}"));
        }
        Ok(Nevra::new(name, epoch, version, release, arch))
    }
}

fn segment_value(segment: &str) -> i64 {
    segment.parse().unwrap_or(0)
}

fn cmp_segments(a: &str, b: &str) -> Ordering {
    let mut left = a.split('.');
    let mut right = b.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = l.map(segment_value).unwrap_or(0);
                let r = r.map(segment_value).unwrap_or(0);
                match l.cmp(&r) {
                    Ordering::Equal => {}
                    ord => return ord,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nevra(s: &str) -> Nevra {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_basic() {
        let n = nevra("tour-4-6.noarch");
        assert_eq!(n.name, "tour");
        assert_eq!(n.epoch, 0);
        assert_eq!(n.version, "4");
        assert_eq!(n.release, "6");
        assert_eq!(n.arch, "noarch");
    }

    #[test]
    fn test_parse_with_epoch_and_dotted_version() {
        let n = nevra("foo-1:2.3-4.noarch");
        assert_eq!(n.epoch, 1);
        assert_eq!(n.version, "2.3");
        assert_eq!(n.release, "4");
    }

    #[test]
    fn test_parse_dashed_name() {
        let n = nevra("dep-lib-1.0-1.x86_64");
        assert_eq!(n.name, "dep-lib");
        assert_eq!(n.version, "1.0");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!("tour".parse::<Nevra>().is_err());
        assert!("tour.noarch".parse::<Nevra>().is_err());
        assert!("tour-x:4-6.noarch".parse::<Nevra>().is_err());
    }

    #[test]
    fn test_display_omits_zero_epoch() {
        assert_eq!(nevra("tour-4-6.noarch").to_string(), "tour-4-6.noarch");
        assert_eq!(nevra("foo-1:2.3-4.noarch").to_string(), "foo-1:2.3-4.noarch");
    }

    #[test]
    fn test_cmp_epoch_outranks_version() {
        let old = nevra("tour-9.0-1.noarch");
        let new = nevra("tour-1:1.0-1.noarch");
        assert_eq!(old.cmp_evr(&new), Ordering::Less);
    }

    #[test]
    fn test_cmp_version_segments() {
        assert_eq!(
            nevra("a-1.2-1.noarch").cmp_evr(&nevra("a-1.10-1.noarch")),
            Ordering::Less
        );
        assert_eq!(
            nevra("a-2.0-1.noarch").cmp_evr(&nevra("a-1.9-1.noarch")),
            Ordering::Greater
        );
        assert_eq!(
            nevra("a-1.0-1.noarch").cmp_evr(&nevra("a-1.0.0-1.noarch")),
            Ordering::Equal
        );
    }

    #[test]
    fn test_cmp_ignores_release() {
        assert_eq!(
            nevra("a-1.0-1.noarch").cmp_evr(&nevra("a-1.0-2.noarch")),
            Ordering::Equal
        );
    }

    #[test]
    fn test_non_numeric_segments_count_as_zero() {
        assert_eq!(
            nevra("a-1.beta-1.noarch").cmp_evr(&nevra("a-1.0-1.noarch")),
            Ordering::Equal
        );
    }

    #[test]
    fn test_spec_form_matching() {
        let n = nevra("foo-1:2.3-4.noarch");
        assert!(n.matches("FOO").unwrap());
        assert!(n.matches("foo-2.3").unwrap());
        assert!(n.matches("^foo\\.noarch$").unwrap());
        assert!(!n.matches("^bar$").unwrap());
        assert!(n.matches("foo[").is_err());
    }
}
