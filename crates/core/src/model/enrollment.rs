use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::course::Course;
use crate::model::ids::{CourseId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Free,
}

impl PaymentStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Free => "free",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending" => Some(Self::Pending),
            "paid" => Some(Self::Paid),
            "free" => Some(Self::Free),
            _ => None,
        }
    }
}

/// Grants a user access to a course's lessons. Unique per (user, course).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub user_id: UserId,
    pub course_id: CourseId,
    pub enrolled_at: DateTime<Utc>,
    pub payment_status: PaymentStatus,
}

impl Enrollment {
    /// Free courses need no payment; priced ones wait for the gateway.
    #[must_use]
    pub fn for_course(user_id: UserId, course: &Course, enrolled_at: DateTime<Utc>) -> Self {
        let payment_status = if course.is_free() {
            PaymentStatus::Free
        } else {
            PaymentStatus::Pending
        };
        Self {
            user_id,
            course_id: course.id(),
            enrolled_at,
            payment_status,
        }
    }
}
