//! Course run keys (`course-v1:Org+Course+Run`).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use lmsops_core::DomainError;

const PREFIX: &str = "course-v1:";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CourseKey {
    pub org: String,
    pub course: String,
    pub run: String,
}

impl CourseKey {
    pub fn new(
        org: impl Into<String>,
        course: impl Into<String>,
        run: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let key = Self {
            org: org.into(),
            course: course.into(),
            run: run.into(),
        };
        for part in [&key.org, &key.course, &key.run] {
            validate_part(part)?;
        }
        Ok(key)
    }

    /// Case-insensitive identity used for duplicate detection.
    pub fn folded(&self) -> (String, String, String) {
        (
            self.org.to_lowercase(),
            self.course.to_lowercase(),
            self.run.to_lowercase(),
        )
    }
}

fn validate_part(part: &str) -> Result<(), DomainError> {
    if part.is_empty() {
        return Err(DomainError::invalid_id("course key part is empty"));
    }
    if let Some(bad) = part
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '~')))
    {
        return Err(DomainError::invalid_id(format!(
            "unexpected character {bad:?} in course key part {part:?}"
        )));
    }
    Ok(())
}

impl fmt::Display for CourseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}+{}+{}", self.org, self.course, self.run)
    }
}

impl FromStr for CourseKey {
    type Err = DomainError;

    /// Accepts `course-v1:Org+Course+Run` and the older `Org/Course/Run`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parts: Vec<&str> = match s.strip_prefix(PREFIX) {
            Some(rest) => rest.split('+').collect(),
            None => s.split('/').collect(),
        };
        match parts.as_slice() {
            [org, course, run] => Self::new(*org, *course, *run),
            _ => Err(DomainError::invalid_id(format!("malformed course key: {s:?}"))),
        }
    }
}

impl Serialize for CourseKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CourseKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_current_format() {
        let key: CourseKey = "course-v1:edX+DemoX+2024_T1".parse().unwrap();
        assert_eq!(key.org, "edX");
        assert_eq!(key.course, "DemoX");
        assert_eq!(key.run, "2024_T1");
        assert_eq!(key.to_string(), "course-v1:edX+DemoX+2024_T1");
    }

    #[test]
    fn parses_slash_format() {
        let key: CourseKey = "MITx/6.002x/2012_Fall".parse().unwrap();
        assert_eq!(key.course, "6.002x");
    }

    #[test]
    fn rejects_malformed_keys() {
        for raw in ["", "course-v1:edX+DemoX", "course-v1:edX++run", "edX/Demo X/run", "a/b/c/d"] {
            assert!(raw.parse::<CourseKey>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn folded_ignores_case() {
        let a: CourseKey = "course-v1:edX+DemoX+T1".parse().unwrap();
        let b: CourseKey = "course-v1:EDX+demox+t1".parse().unwrap();
        assert_ne!(a, b);
        assert_eq!(a.folded(), b.folded());
    }

    proptest! {
        #[test]
        fn display_parses_back(
            org in "[A-Za-z0-9_]{1,8}",
            course in "[A-Za-z0-9.]{1,8}",
            run in "[A-Za-z0-9_-]{1,8}",
        ) {
            let key = CourseKey::new(org, course, run).unwrap();
            prop_assert_eq!(key.to_string().parse::<CourseKey>().unwrap(), key);
        }
    }
}
