use std::fmt;

use crate::app::TubechanError;

/// Steps of the per-item delivery state machine, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Normalize,
    FetchInfo,
    SelectVariant,
    Download,
    Transcode,
    FetchThumbnail,
    Publish,
    CommitCursor,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Normalize => "normalize",
            Stage::FetchInfo => "fetch info",
            Stage::SelectVariant => "select variant",
            Stage::Download => "download",
            Stage::Transcode => "transcode",
            Stage::FetchThumbnail => "fetch thumbnail",
            Stage::Publish => "publish",
            Stage::CommitCursor => "commit cursor",
        };
        f.write_str(name)
    }
}

/// Result of pushing one item through the pipeline.
#[derive(Debug)]
pub enum DeliveryOutcome {
    Delivered,
    /// Unreachable for good; the cursor still advances past it.
    SkippedPermanently(String),
    /// Not available yet; the cursor stays put and the item is retried.
    SkippedTransiently(String),
    Failed { stage: Stage, error: TubechanError },
}

impl DeliveryOutcome {
    pub fn failed(stage: Stage, error: impl Into<TubechanError>) -> Self {
        DeliveryOutcome::Failed {
            stage,
            error: error.into(),
        }
    }

    /// Whether the feed's remaining items may be processed in this cycle.
    pub fn continues_batch(&self) -> bool {
        matches!(
            self,
            DeliveryOutcome::Delivered | DeliveryOutcome::SkippedPermanently(_)
        )
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryOutcome::Delivered => f.write_str("delivered"),
            DeliveryOutcome::SkippedPermanently(reason) => {
                write!(f, "skipped permanently: {}", reason)
            }
            DeliveryOutcome::SkippedTransiently(reason) => {
                write!(f, "skipped for now: {}", reason)
            }
            DeliveryOutcome::Failed { stage, error } => {
                write!(f, "failed at {}: {}", stage, error)
            }
        }
    }
}
