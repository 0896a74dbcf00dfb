use tracing::info;

use crate::domain::User;
use crate::errors::Result;
use crate::http::SharedState;
use crate::types::Role;

const BOOTSTRAP_ADMIN_USERNAME: &str = "admin";
const BOOTSTRAP_ADMIN_EMAIL: &str = "admin@hrms.local";

/// seed a fresh store so the service can authenticate
///
/// the role set is a closed enum and needs no rows; the bootstrap admin is
/// created only when absent, so reseeding an existing store is a no-op
pub fn seed(state: &SharedState) -> Result<()> {
    if state.store.user_by_username(BOOTSTRAP_ADMIN_USERNAME)?.is_some() {
        return Ok(());
    }

    let admin = User::new(
        BOOTSTRAP_ADMIN_USERNAME.to_string(),
        BOOTSTRAP_ADMIN_EMAIL.to_string(),
        state.passwords.hash(&state.config.bootstrap_admin_password),
        vec![Role::Admin],
        state.clock.now(),
    )?;
    state.store.insert_user(&admin)?;
    info!(username = BOOTSTRAP_ADMIN_USERNAME, "seeded bootstrap administrator");
    Ok(())
}
