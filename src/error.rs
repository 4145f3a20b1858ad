use thiserror::Error;

use crate::types::Pocket;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("not found")]
    NotFound,

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("corrupt stored value: {0}")]
    Corrupt(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("invalid permission: {0}")]
    InvalidPermission(String),

    #[error("archive already deleted")]
    ArchiveAlreadyDeleted,

    #[error("{0}")]
    ArchiveDependency(String),

    #[error("{0}")]
    ArchiveNotPrivate(String),

    #[error("{0}")]
    AlreadySubscribed(String),

    #[error("A token cannot be created for a team.")]
    NoTokensForTeams,

    #[error("{0}")]
    DuplicateTokenName(String),

    #[error("{0}")]
    CannotSwitchPrivacy(String),

    #[error("{0}")]
    CannotModifyArchiveProcessor(String),

    #[error("the 'version' filter can be used only together with the 'name' filter")]
    VersionRequiresName,

    #[error("no such pocket: '{0}'")]
    PocketNotFound(String),

    #[error("no such component: '{0}'")]
    ComponentNotFound(String),

    #[error("no such distro series: '{0}'")]
    SeriesNotFound(String),

    #[error("no such PPA: '{0}'")]
    NoSuchPPA(String),

    #[error("{0}")]
    CannotCopy(String),

    #[error("phased_update_percentage must be between 0 and 100 (inclusive), got {0}")]
    InvalidPhasedUpdatePercentage(i64),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid token format")]
    InvalidTokenFormat,
}

pub type Result<T> = std::result::Result<T, Error>;

/// Expected upload denials. These are returned as values so callers can show
/// them to end users without treating them as faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadDenial {
    #[error("{archive} is disabled.")]
    ArchiveDisabled { archive: String },

    #[error("{series} is obsolete and will not accept new uploads.")]
    CannotUploadToSeries { series: String },

    #[error("Signer has no upload rights to this PPA.")]
    CannotUploadToPPA,

    #[error(
        "The signer of this package has no upload rights to this distribution's primary archive. Did you mean to upload to a PPA?"
    )]
    NoRightsForArchive,

    #[error(
        "The signer of this package is lacking the upload rights for the source package, component or package set in question."
    )]
    InsufficientUploadRights,

    #[error("Signer is not permitted to upload to the component '{component}'.")]
    NoRightsForComponent { component: String },

    #[error("Partner uploads must be for the RELEASE or PROPOSED pocket.")]
    InvalidPocketForPartnerArchive,

    #[error("PPA uploads must be for the RELEASE pocket.")]
    InvalidPocketForPPA,

    #[error("Not permitted to upload to the {pocket} pocket in a series in the '{status}' state.")]
    CannotUploadToPocket { pocket: Pocket, status: String },

    #[error("Not permitted to upload directly to {suite}; try {redirect_suite} instead.")]
    RedirectedPocket {
        suite: String,
        redirect_suite: String,
        redirect: Pocket,
    },
}
