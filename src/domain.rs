//! # Domain: Closed Value Sets and Boundary Validation
//!
//! Every enumerated column in the schema is stored as `TEXT` guarded by a
//! `CHECK (col IN (...))` constraint. The Rust side mirrors each set as a
//! plain enum with an ordered `ALL` list, so the boundary (admin gateway,
//! repository calls) rejects bad values before they reach PostgreSQL, and the
//! constraint rejects them again if something bypasses the boundary.
//!
//! `check_clause` renders the exact SQL fragment used by the migrations; the
//! tests below pin the migration files to these lists.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    #[error("invalid {kind} '{value}' (allowed: {allowed})")]
    InvalidVariant {
        kind: &'static str,
        value: String,
        allowed: String,
    },
    #[error("invalid phone number '{0}': expected 10-15 digits with an optional leading '+'")]
    InvalidPhone(String),
    #[error("invalid url '{0}': must be an absolute http or https address")]
    InvalidUrl(String),
}

/// Render `CHECK (column IN ('a', 'b'))` for a closed set.
pub fn render_check_clause(column: &str, values: &[&str]) -> String {
    let quoted: Vec<String> = values.iter().map(|v| format!("'{}'", v)).collect();
    format!("CHECK ({} IN ({}))", column, quoted.join(", "))
}

macro_rules! closed_set {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $($variant:ident => $text:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "&'static str")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }

            pub fn parse(value: &str) -> Result<Self, DomainError> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(DomainError::InvalidVariant {
                        kind: $kind,
                        value: other.to_string(),
                        allowed: Self::VALUES.join(", "),
                    }),
                }
            }

            pub fn check_clause(column: &str) -> String {
                render_check_clause(column, Self::VALUES)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = DomainError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;
            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for &'static str {
            fn from(value: $name) -> Self {
                value.as_str()
            }
        }
    };
}

closed_set! {
    /// Enrollment status of a student.
    StudentStatus, "student status" {
        Active => "active",
        Inactive => "inactive",
        Graduated => "graduated",
        Expelled => "expelled",
    }
}

closed_set! {
    /// Kind of course material: lecture notes, assignment text, or methodical guidance.
    MaterialCategory, "material category" {
        Lecture => "lecture",
        Assignment => "assignment",
        Methodical => "methodical",
    }
}

closed_set! {
    ProgressStatus, "progress status" {
        NotStarted => "not_started",
        InProgress => "in_progress",
        Completed => "completed",
    }
}

closed_set! {
    /// Who authored a message in the student's conversation log.
    SenderRole, "sender role" {
        Student => "student",
        Bot => "bot",
        Admin => "admin",
    }
}

closed_set! {
    ScheduleKind, "schedule kind" {
        Lecture => "lecture",
        Practice => "practice",
        SelfStudy => "self_study",
        Attestation => "attestation",
    }
}

closed_set! {
    AttestationKind, "attestation kind" {
        Intermediate => "intermediate",
        Final => "final",
    }
}

closed_set! {
    FeedbackKind, "feedback kind" {
        Course => "course",
        Module => "module",
        Bot => "bot",
    }
}

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("phone pattern is valid"));

/// Validate and normalize a phone number. Surrounding whitespace is trimmed;
/// the stored form must match `^\+?[0-9]{10,15}$`, same as the column check.
pub fn validate_phone(raw: &str) -> Result<String, DomainError> {
    let phone = raw.trim();
    if PHONE_RE.is_match(phone) {
        Ok(phone.to_string())
    } else {
        Err(DomainError::InvalidPhone(raw.to_string()))
    }
}

/// External material links must be absolute http(s) URLs.
pub fn validate_url(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    match url::Url::parse(trimmed) {
        Ok(u) if (u.scheme() == "http" || u.scheme() == "https") && u.host().is_some() => {
            Ok(trimmed.to_string())
        }
        _ => Err(DomainError::InvalidUrl(raw.to_string())),
    }
}

/// Derive the progress status from topic counts.
pub fn progress_status(completed: i32, total: i32) -> ProgressStatus {
    if completed <= 0 {
        ProgressStatus::NotStarted
    } else if total > 0 && completed >= total {
        ProgressStatus::Completed
    } else {
        ProgressStatus::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORE: &str = include_str!("../migrations/20251015000001_core_schema.up.sql");
    const LEARNING: &str = include_str!("../migrations/20251015000002_learning_records.up.sql");
    const ATTESTATION: &str = include_str!("../migrations/20251016000001_attestation.up.sql");

    #[test]
    fn migration_checks_match_closed_sets() {
        let cases = [
            (CORE, StudentStatus::check_clause("status")),
            (CORE, MaterialCategory::check_clause("category")),
            (LEARNING, ProgressStatus::check_clause("status")),
            (LEARNING, SenderRole::check_clause("sender_role")),
            (LEARNING, ScheduleKind::check_clause("kind")),
            (ATTESTATION, AttestationKind::check_clause("kind")),
            (ATTESTATION, FeedbackKind::check_clause("kind")),
        ];
        for (sql, clause) in cases {
            assert!(sql.contains(&clause), "migration is missing `{}`", clause);
        }
    }

    #[test]
    fn parse_round_trips_every_variant() {
        for status in StudentStatus::ALL {
            assert_eq!(StudentStatus::parse(status.as_str()), Ok(*status));
        }
        for kind in ScheduleKind::ALL {
            assert_eq!(kind.as_str().parse::<ScheduleKind>(), Ok(*kind));
        }
    }

    #[test]
    fn parse_is_case_sensitive_and_closed() {
        for bad in ["Active", "ACTIVE", "", " active", "deleted"] {
            let err = StudentStatus::parse(bad).unwrap_err();
            match err {
                DomainError::InvalidVariant { kind, allowed, .. } => {
                    assert_eq!(kind, "student status");
                    assert_eq!(allowed, "active, inactive, graduated, expelled");
                }
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn serde_rejects_unknown_variant() {
        let ok: MaterialCategory = serde_json::from_str("\"methodical\"").unwrap();
        assert_eq!(ok, MaterialCategory::Methodical);
        assert!(serde_json::from_str::<MaterialCategory>("\"video\"").is_err());
        assert_eq!(
            serde_json::to_string(&SenderRole::Bot).unwrap(),
            "\"bot\""
        );
    }

    #[test]
    fn check_clause_format() {
        assert_eq!(
            AttestationKind::check_clause("kind"),
            "CHECK (kind IN ('intermediate', 'final'))"
        );
    }

    #[test]
    fn phone_validation() {
        assert_eq!(validate_phone("+79001234567").unwrap(), "+79001234567");
        assert_eq!(validate_phone(" 79001234567 ").unwrap(), "79001234567");
        for bad in ["", "+7900", "+7 900 123 45 67", "phone", "++79001234567", "+1234567890123456"] {
            assert!(validate_phone(bad).is_err(), "accepted {:?}", bad);
        }
    }

    #[test]
    fn url_validation() {
        assert!(validate_url("https://example.org/lecture.pdf").is_ok());
        assert!(validate_url("http://example.org").is_ok());
        assert!(validate_url("ftp://example.org/file").is_err());
        assert!(validate_url("javascript:alert(1)").is_err());
        assert!(validate_url("/relative/path").is_err());
    }

    #[test]
    fn progress_status_from_counts() {
        assert_eq!(progress_status(0, 5), ProgressStatus::NotStarted);
        assert_eq!(progress_status(2, 5), ProgressStatus::InProgress);
        assert_eq!(progress_status(5, 5), ProgressStatus::Completed);
        assert_eq!(progress_status(1, 0), ProgressStatus::InProgress);
    }
}
