//! Metrics definitions for the email store.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

pub const SUBMISSION_RECEIVED: MetricDef = MetricDef {
    name: "submission.received",
    metric_type: MetricType::Counter,
    description: "Number of submissions received",
};

pub const SUBMISSION_INVALID: MetricDef = MetricDef {
    name: "submission.invalid",
    metric_type: MetricType::Counter,
    description: "Number of submissions rejected by validation",
};

pub const SUBMISSION_STORED: MetricDef = MetricDef {
    name: "submission.stored",
    metric_type: MetricType::Counter,
    description: "Number of submissions stored. Tagged with tier.",
};

pub const SUBMISSION_FAILED: MetricDef = MetricDef {
    name: "submission.failed",
    metric_type: MetricType::Counter,
    description: "Number of submissions lost because both tiers failed",
};

pub const REMOTE_APPEND_FAILURE: MetricDef = MetricDef {
    name: "remote.append.failure",
    metric_type: MetricType::Counter,
    description: "Number of failed remote appends that fell back to the local tier",
};

pub const REMOTE_APPEND_DURATION: MetricDef = MetricDef {
    name: "remote.append.duration",
    metric_type: MetricType::Histogram,
    description: "Time to complete a remote append in seconds",
};

pub const LOCAL_APPEND_DURATION: MetricDef = MetricDef {
    name: "local.append.duration",
    metric_type: MetricType::Histogram,
    description: "Time to rewrite the local workbook in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SUBMISSION_RECEIVED,
    SUBMISSION_INVALID,
    SUBMISSION_STORED,
    SUBMISSION_FAILED,
    REMOTE_APPEND_FAILURE,
    REMOTE_APPEND_DURATION,
    LOCAL_APPEND_DURATION,
];
