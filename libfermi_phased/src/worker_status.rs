/// Which part of the transfer a status message refers to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferStage {
    #[default]
    Connecting,
    Uploading,
    Submitting,
    Done,
}

impl std::fmt::Display for TransferStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStage::Connecting => write!(f, "Connecting"),
            TransferStage::Uploading => write!(f, "Uploading"),
            TransferStage::Submitting => write!(f, "Submitting"),
            TransferStage::Done => write!(f, "Done"),
        }
    }
}

/// Progress message sent from the transfer worker to the UI.
#[derive(Debug, Clone, Default)]
pub struct TransferStatus {
    pub progress: f32,
    pub stage: TransferStage,
    pub message: String,
}

impl TransferStatus {
    pub fn new(progress: f32, stage: TransferStage, message: &str) -> Self {
        Self {
            progress,
            stage,
            message: message.to_string(),
        }
    }
}
