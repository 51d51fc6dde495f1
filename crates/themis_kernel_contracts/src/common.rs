#![forbid(unsafe_code)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimeNs(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReasonCodeId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Failure families of refused operations. Every refusal names exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RefuseKind {
    Authorization,
    Lifecycle,
    RateLimit,
    Config,
    Integrity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    pub schema_version: SchemaVersion,
    pub kind: RefuseKind,
    pub reason_code: ReasonCodeId,
    pub message: String,
}

impl Refusal {
    pub fn v1(
        kind: RefuseKind,
        reason_code: ReasonCodeId,
        message: impl Into<String>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            schema_version: SchemaVersion(1),
            kind,
            reason_code,
            message: message.into(),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for Refusal {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != SchemaVersion(1) {
            return Err(ContractViolation::InvalidValue {
                field: "refusal.schema_version",
                reason: "must be 1",
            });
        }
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "refusal.reason_code",
                reason: "must be > 0",
            });
        }
        if self.message.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "refusal.message",
                reason: "must not be empty",
            });
        }
        if self.message.len() > 512 {
            return Err(ContractViolation::InvalidValue {
                field: "refusal.message",
                reason: "must be <= 512 chars",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refusal_requires_nonzero_reason_code() {
        let out = Refusal::v1(RefuseKind::Authorization, ReasonCodeId(0), "not owner");
        assert!(matches!(
            out,
            Err(ContractViolation::InvalidValue {
                field: "refusal.reason_code",
                ..
            })
        ));
    }

    #[test]
    fn refusal_rejects_empty_message() {
        let out = Refusal::v1(RefuseKind::Lifecycle, ReasonCodeId(1), "   ");
        assert!(out.is_err());
    }
}
