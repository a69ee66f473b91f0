/// Attempts at converting an artifact into an editable view: one try plus one automatic retry.
pub const MAX_CONVERSION_ATTEMPTS: u32 = 2;

/// Progress of turning the finished artifact into an editable representation.
///
/// A failed conversion never affects the job stage; the artifact stays downloadable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConversionState {
    #[default]
    NotStarted,
    Pending {
        attempt: u32,
    },
    Ready {
        html: String,
    },
    Failed {
        message: String,
        attempts: u32,
    },
}

/// What the caller should do after a conversion attempt finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStep {
    Retry { attempt: u32 },
    Ready,
    DownloadOnly,
    /// The result did not belong to a pending attempt.
    Ignored,
}

impl ConversionState {
    /// Start the first attempt; `None` if one was already started.
    pub fn begin(&mut self) -> Option<u32> {
        match self {
            ConversionState::NotStarted => {
                *self = ConversionState::Pending { attempt: 1 };
                Some(1)
            }
            _ => None,
        }
    }

    pub fn record(&mut self, result: Result<String, String>) -> ConversionStep {
        let ConversionState::Pending { attempt } = *self else {
            return ConversionStep::Ignored;
        };
        match result {
            Ok(html) => {
                *self = ConversionState::Ready { html };
                ConversionStep::Ready
            }
            Err(_) if attempt < MAX_CONVERSION_ATTEMPTS => {
                let next = attempt + 1;
                *self = ConversionState::Pending { attempt: next };
                ConversionStep::Retry { attempt: next }
            }
            Err(message) => {
                *self = ConversionState::Failed {
                    message,
                    attempts: attempt,
                };
                ConversionStep::DownloadOnly
            }
        }
    }

    pub fn html(&self) -> Option<&str> {
        match self {
            ConversionState::Ready { html } => Some(html),
            _ => None,
        }
    }

    /// User-facing note once the editable view has been given up on.
    pub fn warning(&self) -> Option<String> {
        match self {
            ConversionState::Failed { message, attempts } => Some(format!(
                "editable view unavailable after {attempts} attempt(s): {message}; download the file instead"
            )),
            _ => None,
        }
    }
}
