use thiserror::Error;

/// Errors surfaced by the public client API.
#[derive(Debug, Error)]
pub enum Cep18Error {
    /// Bad caller input: empty role lists, mismatched address generation, unbound contract.
    #[error("validation error: {0}")]
    Validation(String),

    /// A point lookup found nothing. Absorbed by balance and allowance reads.
    #[error("not found: {0}")]
    NotFound(String),

    /// The execution result matched neither known schema generation.
    #[error("unrecognized execution result schema: {0}")]
    Schema(String),

    /// The contract reverted with `User error: <code>`.
    #[error("contract error {code}")]
    Contract { code: u32 },

    /// Node, network or plain execution failure, message only.
    #[error("{0}")]
    Infra(String),

    /// Misuse of the listener API.
    #[error("usage error: {0}")]
    Usage(String),

    /// Malformed bytes or JSON returned by the node.
    #[error("codec error: {0:#}")]
    Codec(#[from] anyhow::Error),
}

impl Cep18Error {
    /// Typed view of a contract error code, when it is one of the token's own codes.
    pub fn contract_error_code(&self) -> Option<ContractErrorCode> {
        match self {
            Cep18Error::Contract { code } => ContractErrorCode::from_code(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for Cep18Error {
    fn from(error: reqwest::Error) -> Self {
        Cep18Error::Infra(error.to_string())
    }
}

impl From<serde_json::Error> for Cep18Error {
    fn from(error: serde_json::Error) -> Self {
        Cep18Error::Codec(error.into())
    }
}

/// Error codes raised by the CEP-18 contract through `ApiError::User`.
#[repr(u16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContractErrorCode {
    InvalidContext = 60000,
    InsufficientBalance = 60001,
    InsufficientAllowance = 60002,
    Overflow = 60003,
    PackageHashMissing = 60004,
    PackageHashNotPackage = 60005,
    InvalidEventsMode = 60006,
    MissingEventsMode = 60007,
    Phantom = 60008,
    FailedToGetArgBytes = 60009,
    InsufficientRights = 60010,
    InvalidAdminList = 60011,
    InvalidMinterList = 60012,
    InvalidNoneList = 60013,
    InvalidEnableMBFlag = 60014,
    AlreadyInitialized = 60015,
    MintBurnDisabled = 60016,
    CannotTargetSelfUser = 60017,
    InvalidBurnTarget = 60018,
    MissingPackageHashForUpgrade = 60019,
    MissingContractHashForUpgrade = 60020,
    InvalidKeyType = 60021,
    KeyTypeMigrationMismatch = 60022,
    FailedToWriteMessage = 60023,
    FailedToReturnEntryPointResult = 60024,
    FailedToRetrieveImmediateCaller = 60025,
    FailedToCreateDictionary = 60026,
    FailedToWriteToDictionary = 60027,
    FailedToConvertBytes = 60028,
    FailedToChangeBalance = 60029,
    FailedToChangeAllowance = 60030,
    FailedToChangeTotalSupply = 60031,
    FailedToGetDictionaryValue = 60032,
    FailedToReadFromStorage = 60033,
    FailedToGetKey = 60034,
    FailedToDisableContractVersion = 60035,
    FailedToInsertToSecurityList = 60036,
    UrefNotFound = 60037,
    InvalidLegacyKeyCompat = 60038,
    FailedToGetOldPackageKey = 60039,
    FailedToGetPackageKey = 60040,
    FailedToGetOldContractHashKey = 60041,
}

impl ContractErrorCode {
    const ALL: [ContractErrorCode; 42] = [
        ContractErrorCode::InvalidContext,
        ContractErrorCode::InsufficientBalance,
        ContractErrorCode::InsufficientAllowance,
        ContractErrorCode::Overflow,
        ContractErrorCode::PackageHashMissing,
        ContractErrorCode::PackageHashNotPackage,
        ContractErrorCode::InvalidEventsMode,
        ContractErrorCode::MissingEventsMode,
        ContractErrorCode::Phantom,
        ContractErrorCode::FailedToGetArgBytes,
        ContractErrorCode::InsufficientRights,
        ContractErrorCode::InvalidAdminList,
        ContractErrorCode::InvalidMinterList,
        ContractErrorCode::InvalidNoneList,
        ContractErrorCode::InvalidEnableMBFlag,
        ContractErrorCode::AlreadyInitialized,
        ContractErrorCode::MintBurnDisabled,
        ContractErrorCode::CannotTargetSelfUser,
        ContractErrorCode::InvalidBurnTarget,
        ContractErrorCode::MissingPackageHashForUpgrade,
        ContractErrorCode::MissingContractHashForUpgrade,
        ContractErrorCode::InvalidKeyType,
        ContractErrorCode::KeyTypeMigrationMismatch,
        ContractErrorCode::FailedToWriteMessage,
        ContractErrorCode::FailedToReturnEntryPointResult,
        ContractErrorCode::FailedToRetrieveImmediateCaller,
        ContractErrorCode::FailedToCreateDictionary,
        ContractErrorCode::FailedToWriteToDictionary,
        ContractErrorCode::FailedToConvertBytes,
        ContractErrorCode::FailedToChangeBalance,
        ContractErrorCode::FailedToChangeAllowance,
        ContractErrorCode::FailedToChangeTotalSupply,
        ContractErrorCode::FailedToGetDictionaryValue,
        ContractErrorCode::FailedToReadFromStorage,
        ContractErrorCode::FailedToGetKey,
        ContractErrorCode::FailedToDisableContractVersion,
        ContractErrorCode::FailedToInsertToSecurityList,
        ContractErrorCode::UrefNotFound,
        ContractErrorCode::InvalidLegacyKeyCompat,
        ContractErrorCode::FailedToGetOldPackageKey,
        ContractErrorCode::FailedToGetPackageKey,
        ContractErrorCode::FailedToGetOldContractHashKey,
    ];

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|known| *known as u32 == code)
    }

    pub fn code(&self) -> u32 {
        *self as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_contract_codes() {
        assert_eq!(
            ContractErrorCode::from_code(60001),
            Some(ContractErrorCode::InsufficientBalance)
        );
        assert_eq!(
            ContractErrorCode::from_code(60041),
            Some(ContractErrorCode::FailedToGetOldContractHashKey)
        );
        assert_eq!(ContractErrorCode::from_code(5), None);
        assert_eq!(ContractErrorCode::InsufficientRights.code(), 60010);
    }

    #[test]
    fn test_contract_error_keeps_raw_code() {
        let error = Cep18Error::Contract { code: 60002 };
        assert_eq!(
            error.contract_error_code(),
            Some(ContractErrorCode::InsufficientAllowance)
        );

        let unknown = Cep18Error::Contract { code: 5 };
        assert_eq!(unknown.contract_error_code(), None);
        assert_eq!(unknown.to_string(), "contract error 5");
    }
}
