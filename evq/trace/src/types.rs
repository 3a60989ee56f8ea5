//! Trace record types and filter groups

/// Record types emitted by the event queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Session marker (not maskable)
    Empty = 0,

    /// Event accepted: id, deadline, period
    Post = 1,
    /// Post rejected: error code
    PostAttempt = 2,
    /// Event removed before firing: id
    Cancel = 3,
    /// Cancel of an unknown or stale id: raw id
    CancelAttempt = 4,
    /// Callback about to run: id, deadline
    Fire = 5,
    /// Periodic event re-inserted: id, next deadline
    Rearm = 6,

    /// Dispatch pass started: timeout ticks (`u32::MAX` = forever)
    DispatchBegin = 7,
    /// Dispatch pass returned: callbacks run
    DispatchEnd = 8,
    /// Break requested
    Break = 9,

    /// Target description (not maskable)
    TargetInfo = 31,
}

impl RecordType {
    /// Get the record type name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY",
            Self::Post => "POST",
            Self::PostAttempt => "POST_ATTEMPT",
            Self::Cancel => "CANCEL",
            Self::CancelAttempt => "CANCEL_ATTEMPT",
            Self::Fire => "FIRE",
            Self::Rearm => "REARM",
            Self::DispatchBegin => "DISPATCH_BEGIN",
            Self::DispatchEnd => "DISPATCH_END",
            Self::Break => "BREAK",
            Self::TargetInfo => "TARGET_INFO",
        }
    }

    /// Map a raw record byte back to its type
    pub const fn from_raw(raw: u8) -> Option<Self> {
        Some(match raw {
            0 => Self::Empty,
            1 => Self::Post,
            2 => Self::PostAttempt,
            3 => Self::Cancel,
            4 => Self::CancelAttempt,
            5 => Self::Fire,
            6 => Self::Rearm,
            7 => Self::DispatchBegin,
            8 => Self::DispatchEnd,
            9 => Self::Break,
            31 => Self::TargetInfo,
            _ => return None,
        })
    }

    /// Bit of this record in the global filter
    pub const fn mask(self) -> u32 {
        1 << (self as u8)
    }

    /// Check if record is non-maskable (always passes filters)
    pub const fn is_non_maskable(self) -> bool {
        matches!(self, Self::Empty | Self::TargetInfo)
    }
}

/// Record group filters
pub mod filters {
    use super::RecordType;

    /// All records
    pub const ALL_RECORDS: u32 = u32::MAX;

    /// Post and cancel records, including rejected attempts
    pub const LIFECYCLE_RECORDS: u32 = RecordType::Post.mask()
        | RecordType::PostAttempt.mask()
        | RecordType::Cancel.mask()
        | RecordType::CancelAttempt.mask();

    /// Callback execution records
    pub const FIRE_RECORDS: u32 = RecordType::Fire.mask() | RecordType::Rearm.mask();

    /// Dispatcher loop records
    pub const DISPATCH_RECORDS: u32 = RecordType::DispatchBegin.mask()
        | RecordType::DispatchEnd.mask()
        | RecordType::Break.mask();

    /// Rejected operations only
    pub const ATTEMPT_RECORDS: u32 =
        RecordType::PostAttempt.mask() | RecordType::CancelAttempt.mask();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_round_trip() {
        for record in [
            RecordType::Post,
            RecordType::Fire,
            RecordType::DispatchEnd,
            RecordType::TargetInfo,
        ] {
            assert_eq!(RecordType::from_raw(record as u8), Some(record));
        }
        assert_eq!(RecordType::from_raw(200), None);
    }

    #[test]
    fn test_filter_groups_are_disjoint() {
        assert_eq!(filters::LIFECYCLE_RECORDS & filters::FIRE_RECORDS, 0);
        assert_eq!(filters::FIRE_RECORDS & filters::DISPATCH_RECORDS, 0);
        assert_eq!(
            filters::ATTEMPT_RECORDS & filters::LIFECYCLE_RECORDS,
            filters::ATTEMPT_RECORDS
        );
    }
}
