pub use crate::core::app::App;
pub use crate::error::{Error, TgResult};
pub use crate::store::{
	AccessTokenRepo, AssignmentRepo, AuthCodeRepo, ClientRepo, CredentialRepo, IdentityRepo,
	RefreshTokenRepo, RoleRepo, SessionRepo, SigningKeyRepo, TenantRepo,
};
pub use crate::types::{TenantId, Timestamp, UserId};

pub use tracing::{debug, debug_span, error, error_span, info, info_span, warn, warn_span};

// vim: ts=4
