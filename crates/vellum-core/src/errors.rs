use thiserror::Error;
use vellum_core_types::{RequestContext, RequestId, TraceId};

use crate::model::{Branch, ContainerKind, EntityId, LogId, PackageId, RecordId, VersionId};

/// Result type alias for the pure, storage-free parts of the core.
pub type Result<T> = std::result::Result<T, VellumError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Every failure surfaced by the store or the engine carries exactly one of
/// these kinds. Each kind maps to a stable `ERR_*` code for programmatic
/// handling and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Lookup
    NotFound,
    AlreadyExists,

    // Versioning
    /// Another writer created the requested version number first
    VersionConflict,

    // Validation (checked before any write)
    InvalidInput,
    InvalidKey,
    InvalidTitle,
    InvalidChildType,
    CrossPackageReference,
    PinnedVersionMismatch,

    // Structural
    ConstraintViolation,
    CycleDetected,

    // Integration
    Io,
    Serialization,
    Persistence,
    Concurrency,
    Config,

    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::AlreadyExists => "ERR_ALREADY_EXISTS",
            ExErrorKind::VersionConflict => "ERR_VERSION_CONFLICT",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidKey => "ERR_INVALID_KEY",
            ExErrorKind::InvalidTitle => "ERR_INVALID_TITLE",
            ExErrorKind::InvalidChildType => "ERR_INVALID_CHILD_TYPE",
            ExErrorKind::CrossPackageReference => "ERR_CROSS_PACKAGE_REFERENCE",
            ExErrorKind::PinnedVersionMismatch => "ERR_PINNED_VERSION_MISMATCH",
            ExErrorKind::ConstraintViolation => "ERR_CONSTRAINT_VIOLATION",
            ExErrorKind::CycleDetected => "ERR_CYCLE_DETECTED",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Config => "ERR_CONFIG",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Validation kinds are rejected before anything is written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ExErrorKind::InvalidInput
                | ExErrorKind::InvalidKey
                | ExErrorKind::InvalidTitle
                | ExErrorKind::InvalidChildType
                | ExErrorKind::CrossPackageReference
                | ExErrorKind::PinnedVersionMismatch
        )
    }
}

/// Canonical structured error type
///
/// Carries a classification for programmatic handling plus whatever
/// identifiers were in scope when the failure happened.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    package_id: Option<PackageId>,
    entity_id: Option<EntityId>,
    version_id: Option<VersionId>,
    log_id: Option<LogId>,
    key: Option<String>,
    request_id: Option<RequestId>,
    trace_id: Option<TraceId>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            package_id: None,
            entity_id: None,
            version_id: None,
            log_id: None,
            key: None,
            request_id: None,
            trace_id: None,
            message: String::new(),
        }
    }

    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    pub fn with_package_id(mut self, id: PackageId) -> Self {
        self.package_id = Some(id);
        self
    }

    pub fn with_entity_id(mut self, id: EntityId) -> Self {
        self.entity_id = Some(id);
        self
    }

    pub fn with_version_id(mut self, id: VersionId) -> Self {
        self.version_id = Some(id);
        self
    }

    pub fn with_log_id(mut self, id: LogId) -> Self {
        self.log_id = Some(id);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Attach the correlation ids of the request that failed.
    pub fn with_context(mut self, ctx: &RequestContext) -> Self {
        self.request_id = Some(ctx.request_id.clone());
        self.trace_id = ctx.trace_id.clone();
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn package_id(&self) -> Option<PackageId> {
        self.package_id
    }

    pub fn entity_id(&self) -> Option<EntityId> {
        self.entity_id
    }

    pub fn version_id(&self) -> Option<VersionId> {
        self.version_id
    }

    pub fn log_id(&self) -> Option<LogId> {
        self.log_id
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    pub fn request_id(&self) -> Option<&RequestId> {
        self.request_id.as_ref()
    }

    pub fn trace_id(&self) -> Option<&TraceId> {
        self.trace_id.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether the caller may retry after re-reading state.
    ///
    /// Only a lost version-number race qualifies: the loser re-reads the
    /// latest version and tries again with the next number.
    pub fn is_retryable(&self) -> bool {
        self.kind == ExErrorKind::VersionConflict
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(id) = self.package_id {
            write!(f, " (package_id: {})", id)?;
        }
        if let Some(id) = self.entity_id {
            write!(f, " (entity_id: {})", id)?;
        }
        if let Some(id) = self.version_id {
            write!(f, " (version_id: {})", id)?;
        }
        if let Some(id) = self.log_id {
            write!(f, " (log_id: {})", id)?;
        }
        if let Some(key) = &self.key {
            write!(f, " (key: {})", key)?;
        }
        if let Some(id) = &self.request_id {
            write!(f, " (request_id: {})", id)?;
        }
        if let Some(id) = &self.trace_id {
            write!(f, " (trace_id: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Domain failures of the publishing core
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VellumError {
    // ===== Lookup =====
    #[error("Package not found: {package_id}")]
    PackageNotFound { package_id: PackageId },

    #[error("Package not found for key: {key}")]
    PackageKeyNotFound { key: String },

    #[error("Entity not found: {entity_id}")]
    EntityNotFound { entity_id: EntityId },

    #[error("Entity not found for key {key} in package {package_id}")]
    EntityKeyNotFound { package_id: PackageId, key: String },

    #[error("Version not found: {version_id}")]
    VersionNotFound { version_id: VersionId },

    #[error("{branch} log not found: {log_id}")]
    LogNotFound { branch: Branch, log_id: LogId },

    #[error("Entity {entity_id} is not a container")]
    NotAContainer { entity_id: EntityId },

    #[error("Entity {entity_id} is not a component")]
    NotAComponent { entity_id: EntityId },

    /// The container has never been published, or its branch version was soft-deleted
    #[error("Entity {entity_id} has no {branch} version")]
    NoBranchVersion { entity_id: EntityId, branch: Branch },

    #[error("Key {key} already exists in package {package_id}")]
    EntityAlreadyExists { package_id: PackageId, key: String },

    #[error("Package key already exists: {key}")]
    PackageAlreadyExists { key: String },

    // ===== Versioning =====
    #[error("Version conflict on entity {entity_id}: expected version {expected}, got {requested}")]
    VersionConflict {
        entity_id: EntityId,
        expected: u32,
        requested: u32,
    },

    // ===== Validation =====
    #[error("Invalid key: {reason}")]
    InvalidKey { reason: String },

    #[error("Invalid title: {reason}")]
    InvalidTitle { reason: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Child {child_id} belongs to package {child_package_id}, container package is {package_id}")]
    CrossPackageReference {
        package_id: PackageId,
        child_id: EntityId,
        child_package_id: PackageId,
    },

    #[error("Pinned version {version_id} does not belong to entity {entity_id}")]
    PinnedVersionMismatch {
        entity_id: EntityId,
        version_id: VersionId,
    },

    #[error("{kind} cannot contain entity {child_id}: {reason}")]
    InvalidChildType {
        kind: ContainerKind,
        child_id: EntityId,
        reason: String,
    },

    // ===== Structural =====
    #[error("Dependency cycle detected at log record {record_id}")]
    DependencyCycle { record_id: RecordId },

    // ===== Generic =====
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl From<VellumError> for ExError {
    fn from(err: VellumError) -> Self {
        let message = err.to_string();
        match err {
            VellumError::PackageNotFound { package_id } => {
                ExError::new(ExErrorKind::NotFound).with_package_id(package_id)
            }
            VellumError::PackageKeyNotFound { key } => {
                ExError::new(ExErrorKind::NotFound).with_key(key)
            }
            VellumError::EntityNotFound { entity_id } => {
                ExError::new(ExErrorKind::NotFound).with_entity_id(entity_id)
            }
            VellumError::EntityKeyNotFound { package_id, key } => {
                ExError::new(ExErrorKind::NotFound)
                    .with_package_id(package_id)
                    .with_key(key)
            }
            VellumError::VersionNotFound { version_id } => {
                ExError::new(ExErrorKind::NotFound).with_version_id(version_id)
            }
            VellumError::LogNotFound { log_id, .. } => {
                ExError::new(ExErrorKind::NotFound).with_log_id(log_id)
            }
            VellumError::NotAContainer { entity_id }
            | VellumError::NotAComponent { entity_id }
            | VellumError::NoBranchVersion { entity_id, .. } => {
                ExError::new(ExErrorKind::NotFound).with_entity_id(entity_id)
            }
            VellumError::EntityAlreadyExists { package_id, key } => {
                ExError::new(ExErrorKind::AlreadyExists)
                    .with_package_id(package_id)
                    .with_key(key)
            }
            VellumError::PackageAlreadyExists { key } => {
                ExError::new(ExErrorKind::AlreadyExists).with_key(key)
            }
            VellumError::VersionConflict { entity_id, .. } => {
                ExError::new(ExErrorKind::VersionConflict).with_entity_id(entity_id)
            }
            VellumError::InvalidKey { .. } => ExError::new(ExErrorKind::InvalidKey),
            VellumError::InvalidTitle { .. } => ExError::new(ExErrorKind::InvalidTitle),
            VellumError::InvalidInput { .. } => ExError::new(ExErrorKind::InvalidInput),
            VellumError::CrossPackageReference {
                package_id,
                child_id,
                ..
            } => ExError::new(ExErrorKind::CrossPackageReference)
                .with_package_id(package_id)
                .with_entity_id(child_id),
            VellumError::PinnedVersionMismatch {
                entity_id,
                version_id,
            } => ExError::new(ExErrorKind::PinnedVersionMismatch)
                .with_entity_id(entity_id)
                .with_version_id(version_id),
            VellumError::InvalidChildType { child_id, .. } => {
                ExError::new(ExErrorKind::InvalidChildType).with_entity_id(child_id)
            }
            VellumError::DependencyCycle { .. } => ExError::new(ExErrorKind::CycleDetected),
            VellumError::Internal { .. } => ExError::new(ExErrorKind::Internal),
        }
        .with_message(message)
    }
}
