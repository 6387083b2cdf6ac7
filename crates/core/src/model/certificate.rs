use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ids::{CertificateId, CourseId, UserId};

/// Certificate about to be persisted; storage assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCertificate {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub code: Uuid,
    pub issued_at: DateTime<Utc>,
}

impl NewCertificate {
    /// Draft a certificate with a fresh random verification code.
    #[must_use]
    pub fn issue(user_id: UserId, course_id: CourseId, issued_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            course_id,
            code: Uuid::new_v4(),
            issued_at,
        }
    }

    #[must_use]
    pub fn assign_id(self, id: CertificateId) -> Certificate {
        Certificate {
            id,
            user_id: self.user_id,
            course_id: self.course_id,
            code: self.code,
            issued_at: self.issued_at,
        }
    }
}

/// Proof that a user completed a course. At most one per (user, course).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: CertificateId,
    pub user_id: UserId,
    pub course_id: CourseId,
    #[serde(rename = "certificateCode")]
    pub code: Uuid,
    pub issued_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn issued_drafts_get_distinct_codes() {
        let a = NewCertificate::issue(UserId::new(1), CourseId::new(2), fixed_now());
        let b = NewCertificate::issue(UserId::new(1), CourseId::new(2), fixed_now());
        assert_ne!(a.code, b.code);

        let cert = a.clone().assign_id(CertificateId::new(5));
        assert_eq!(cert.id, CertificateId::new(5));
        assert_eq!(cert.code, a.code);
    }
}
