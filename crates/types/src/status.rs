use crate::energy::Energy;
use crate::instance_id::InstanceId;

/// Result status codes, verbatim from spec §6/§7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxStatus {
    Success,
    Failed,
    FailedOutOfEnergy,
    FailedOutOfStack,
    FailedCallDepthLimitExceeded,
    FailedRevert,
    FailedInvalid,
    FailedAbort,
    FailedException,
}

impl TxStatus {
    pub fn is_success(self) -> bool {
        matches!(self, TxStatus::Success)
    }
}

/// `{ statusCode, returnData, energyUsed, storageRootHash, uncaughtException? }`
/// from spec §6.
#[derive(Debug, Clone)]
pub struct TransactionResult {
    pub status: TxStatus,
    pub return_data: Vec<u8>,
    pub energy_used: Energy,
    pub storage_root_hash: [u8; 32],
    pub uncaught_exception: Option<InstanceId>,
}

impl TransactionResult {
    pub fn success(return_data: Vec<u8>, energy_used: Energy, storage_root_hash: [u8; 32]) -> Self {
        Self {
            status: TxStatus::Success,
            return_data,
            energy_used,
            storage_root_hash,
            uncaught_exception: None,
        }
    }

    pub fn failed(
        status: TxStatus,
        energy_used: Energy,
        storage_root_hash: [u8; 32],
        uncaught_exception: Option<InstanceId>,
    ) -> Self {
        debug_assert!(!matches!(status, TxStatus::Success));
        Self {
            status,
            return_data: Vec::new(),
            energy_used,
            storage_root_hash,
            uncaught_exception,
        }
    }
}
