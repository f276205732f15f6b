//! Database schema initialization and migrations

use sqlx::SqlitePool;

/// Initialize the database schema. Idempotent; runs inside one
/// transaction at boot and from the `migrate` subcommand.
pub(crate) async fn init_db(db: &SqlitePool) -> Result<(), sqlx::Error> {
	let mut tx = db.begin().await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS identities (
			id text NOT NULL,
			tenant_id text,
			email text NOT NULL,
			email_verified integer NOT NULL DEFAULT 0,
			profile text NOT NULL DEFAULT '{}',
			failed_login_attempts integer NOT NULL DEFAULT 0,
			locked_until integer,
			created_at integer NOT NULL,
			updated_at integer NOT NULL,
			deleted_at integer,
			PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_identities_tenant_email
			ON identities (tenant_id, email) WHERE tenant_id IS NOT NULL AND deleted_at IS NULL",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_identities_platform_email
			ON identities (email) WHERE tenant_id IS NULL AND deleted_at IS NULL",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS credentials (
			user_id text NOT NULL,
			password_hash text NOT NULL,
			updated_at integer NOT NULL,
			PRIMARY KEY(user_id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS sessions (
			id text NOT NULL,
			tenant_id text,
			user_id text NOT NULL,
			ip_address text,
			user_agent text,
			expires_at integer NOT NULL,
			created_at integer NOT NULL,
			last_seen_at integer NOT NULL,
			namespace text NOT NULL,
			PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions (expires_at)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS tenants (
			id text NOT NULL,
			name text NOT NULL,
			status text NOT NULL DEFAULT 'active',
			created_at integer NOT NULL,
			updated_at integer NOT NULL,
			PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_tenants_name ON tenants (name)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS roles (
			id text NOT NULL,
			name text NOT NULL,
			scope text NOT NULL,
			permissions text NOT NULL,
			PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_roles_name ON roles (name)")
		.execute(&mut *tx)
		.await?;

	// scope=platform iff no scope context; enforced at the row level too
	sqlx::query(
		"CREATE TABLE IF NOT EXISTS assignments (
			id text NOT NULL,
			user_id text NOT NULL,
			role_id text NOT NULL,
			scope text NOT NULL,
			scope_context_id text,
			granted_at integer NOT NULL,
			granted_by text,
			PRIMARY KEY(id),
			CHECK ((scope = 'platform') = (scope_context_id IS NULL))
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_unique
			ON assignments (user_id, role_id, scope, scope_context_id)
			WHERE scope_context_id IS NOT NULL",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_assignments_unique_platform
			ON assignments (user_id, role_id, scope)
			WHERE scope_context_id IS NULL",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_assignments_user ON assignments (user_id)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS oauth2_clients (
			id text NOT NULL,
			client_id text NOT NULL,
			tenant_id text NOT NULL,
			client_secret_hash text,
			name text NOT NULL,
			redirect_uris text NOT NULL,
			allowed_scopes text NOT NULL,
			grant_types text NOT NULL,
			response_types text NOT NULL,
			token_endpoint_auth_method text NOT NULL,
			access_token_ttl integer NOT NULL,
			refresh_token_ttl integer NOT NULL,
			id_token_ttl integer NOT NULL,
			is_active integer NOT NULL DEFAULT 1,
			created_at integer NOT NULL,
			updated_at integer NOT NULL,
			deleted_at integer,
			PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_clients_client_id ON oauth2_clients (client_id)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query("CREATE INDEX IF NOT EXISTS idx_clients_tenant ON oauth2_clients (tenant_id)")
		.execute(&mut *tx)
		.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS authorization_codes (
			code text NOT NULL,
			client_id text NOT NULL,
			user_id text NOT NULL,
			redirect_uri text NOT NULL,
			scope text NOT NULL,
			state text,
			nonce text,
			code_challenge text,
			code_challenge_method text,
			expires_at integer NOT NULL,
			is_used integer NOT NULL DEFAULT 0,
			used_at integer,
			created_at integer NOT NULL,
			PRIMARY KEY(code)
	)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS access_tokens (
			id text NOT NULL,
			token_hash text NOT NULL,
			tenant_id text NOT NULL,
			client_id text NOT NULL,
			user_id text NOT NULL,
			scope text NOT NULL,
			expires_at integer NOT NULL,
			is_revoked integer NOT NULL DEFAULT 0,
			revoked_at integer,
			created_at integer NOT NULL,
			PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_access_tokens_hash ON access_tokens (token_hash)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS refresh_tokens (
			id text NOT NULL,
			token_hash text NOT NULL,
			access_token_id text NOT NULL,
			tenant_id text NOT NULL,
			client_id text NOT NULL,
			user_id text NOT NULL,
			scope text NOT NULL,
			expires_at integer NOT NULL,
			is_revoked integer NOT NULL DEFAULT 0,
			revoked_at integer,
			created_at integer NOT NULL,
			PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;
	sqlx::query(
		"CREATE UNIQUE INDEX IF NOT EXISTS idx_refresh_tokens_hash ON refresh_tokens (token_hash)",
	)
	.execute(&mut *tx)
	.await?;

	sqlx::query(
		"CREATE TABLE IF NOT EXISTS signing_keys (
			id text NOT NULL,
			algorithm text NOT NULL,
			public_key_pem text NOT NULL,
			private_key_encrypted blob NOT NULL,
			created_at integer NOT NULL,
			expires_at integer,
			PRIMARY KEY(id)
	)",
	)
	.execute(&mut *tx)
	.await?;

	tx.commit().await
}

// vim: ts=4
