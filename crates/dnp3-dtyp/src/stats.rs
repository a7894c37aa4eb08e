//! Statistics counters tracked per channel.

/// One kind of monotone counter tracked by a channel's [`Statistics`][crate::stats] registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatisticsKind {
    BytesSent,
    BytesReceived,
    FramesSent,
    FramesReceived,
    ConfirmationsSent,
    ConfirmationsReceived,
    ChecksumErrors,
    FrameFormatErrors,
    UnexpectedBytesReceived,
    SucceededConnections,
    FailedConnections,
    LostConnections,
}

impl StatisticsKind {
    pub const ALL: [StatisticsKind; 12] = [
        StatisticsKind::BytesSent,
        StatisticsKind::BytesReceived,
        StatisticsKind::FramesSent,
        StatisticsKind::FramesReceived,
        StatisticsKind::ConfirmationsSent,
        StatisticsKind::ConfirmationsReceived,
        StatisticsKind::ChecksumErrors,
        StatisticsKind::FrameFormatErrors,
        StatisticsKind::UnexpectedBytesReceived,
        StatisticsKind::SucceededConnections,
        StatisticsKind::FailedConnections,
        StatisticsKind::LostConnections,
    ];
}
