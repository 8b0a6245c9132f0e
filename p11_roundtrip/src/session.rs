/* session.rs : provider lifecycle, one owning context per program run
   Functions used:
   C_GetFunctionList (on load)
   C_Initialize
   C_GetSlotList
   C_OpenSession
   C_Login
   C_Logout
   C_CloseSession
   C_Finalize
 */

use std::fmt;

use cryptoki::context::{CInitializeArgs, Pkcs11};
use cryptoki::mechanism::Mechanism;
use cryptoki::object::{Attribute, ObjectHandle};
use cryptoki::session::{Session, UserType};
use cryptoki::types::AuthPin;
use function_name::named;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{HsmError, Result};

/// Lifecycle of a provider connection. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Unloaded,
    Loaded,
    Initialized,
    SessionOpen,
    Authenticated,
    LoggedOut,
    SessionClosed,
    Finalized,
}

impl SessionState {
    pub fn next(self) -> Option<SessionState> {
        use SessionState::*;
        match self {
            Unloaded => Some(Loaded),
            Loaded => Some(Initialized),
            Initialized => Some(SessionOpen),
            SessionOpen => Some(Authenticated),
            Authenticated => Some(LoggedOut),
            LoggedOut => Some(SessionClosed),
            SessionClosed => Some(Finalized),
            Finalized => None,
        }
    }
}

/// Key and cipher calls issued through an authenticated session.
///
/// Keys are opaque provider-side handles; raw key material never crosses this boundary.
pub trait Token {
    type Key: Copy + fmt::Debug + fmt::Display;

    fn generate_key(&self, mechanism: &Mechanism<'_>, template: &[Attribute]) -> Result<Self::Key>;

    fn generate_key_pair(
        &self,
        mechanism: &Mechanism<'_>,
        public_template: &[Attribute],
        private_template: &[Attribute],
    ) -> Result<(Self::Key, Self::Key)>;

    /// Single-part encryption; the output buffer is sized by the provider's length query.
    fn encrypt(&self, mechanism: &Mechanism<'_>, key: Self::Key, data: &[u8]) -> Result<Vec<u8>>;

    fn decrypt(&self, mechanism: &Mechanism<'_>, key: Self::Key, data: &[u8]) -> Result<Vec<u8>>;
}

/// Loaded provider plus one authenticated read/write session on a fixed slot.
///
/// Dropping it on an error path closes the session and finalizes/unloads the
/// provider; [`HsmSession::close`] does the same in order.
pub struct HsmSession {
    // field order is drop order: session before provider
    session: Session,
    pkcs11: Pkcs11,
    state: SessionState,
}

fn advance(state: &mut SessionState, to: SessionState) {
    debug_assert_eq!(state.next(), Some(to));
    debug!(from = ?*state, to = ?to, "session state");
    *state = to;
}

impl HsmSession {
    #[named]
    pub fn open(config: &Config) -> Result<Self> {
        debug!(fun = function_name!(), library = %config.library, slot = config.slot_id(), "called");
        let mut state = SessionState::Unloaded;

        let pkcs11 = Pkcs11::new(&config.library).map_err(|source| HsmError::LibraryLoad {
            path: config.library.clone(),
            source,
        })?;
        advance(&mut state, SessionState::Loaded);

        pkcs11
            .initialize(CInitializeArgs::OsThreads)
            .map_err(HsmError::provider("C_Initialize"))?;
        advance(&mut state, SessionState::Initialized);

        let slot = pkcs11
            .get_all_slots()
            .map_err(HsmError::provider("C_GetSlotList"))?
            .into_iter()
            .find(|slot| slot.id() == config.slot_id())
            .ok_or(HsmError::SlotNotFound(config.slot_id()))?;

        let session = pkcs11
            .open_rw_session(slot)
            .map_err(HsmError::provider("C_OpenSession"))?;
        advance(&mut state, SessionState::SessionOpen);

        session
            .login(UserType::User, Some(&AuthPin::new(config.pin().into())))
            .map_err(HsmError::provider("C_Login"))?;
        advance(&mut state, SessionState::Authenticated);

        info!(session = %session, slot = config.slot_id(), "connected");
        Ok(HsmSession { session, pkcs11, state })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Provider session handle, for reporting only.
    pub fn session_handle(&self) -> String {
        self.session.to_string()
    }

    /// Logs out, closes the session and finalizes the provider.
    ///
    /// Only a `C_Logout` failure is returned. cryptoki 0.7 closes the session and
    /// finalizes on drop and from `Pkcs11::finalize(self) -> ()`, so a failing
    /// `C_CloseSession` or `C_Finalize` is only logged by cryptoki (via `log`) and
    /// does not change the exit status.
    #[named]
    pub fn close(self) -> Result<()> {
        debug!(fun = function_name!(), "called");
        let HsmSession { session, pkcs11, mut state } = self;

        session.logout().map_err(HsmError::provider("C_Logout"))?;
        advance(&mut state, SessionState::LoggedOut);

        drop(session);
        advance(&mut state, SessionState::SessionClosed);

        pkcs11.finalize();
        advance(&mut state, SessionState::Finalized);

        info!("disconnected");
        Ok(())
    }
}

impl Token for HsmSession {
    type Key = ObjectHandle;

    fn generate_key(&self, mechanism: &Mechanism<'_>, template: &[Attribute]) -> Result<ObjectHandle> {
        self.session
            .generate_key(mechanism, template)
            .map_err(HsmError::provider("C_GenerateKey"))
    }

    fn generate_key_pair(
        &self,
        mechanism: &Mechanism<'_>,
        public_template: &[Attribute],
        private_template: &[Attribute],
    ) -> Result<(ObjectHandle, ObjectHandle)> {
        self.session
            .generate_key_pair(mechanism, public_template, private_template)
            .map_err(HsmError::provider("C_GenerateKeyPair"))
    }

    /* C_EncryptInit, C_Encrypt(NULL) for the length, C_Encrypt into an exactly sized buffer */
    fn encrypt(&self, mechanism: &Mechanism<'_>, key: ObjectHandle, data: &[u8]) -> Result<Vec<u8>> {
        self.session
            .encrypt(mechanism, key, data)
            .map_err(HsmError::provider("C_Encrypt"))
    }

    fn decrypt(&self, mechanism: &Mechanism<'_>, key: ObjectHandle, data: &[u8]) -> Result<Vec<u8>> {
        self.session
            .decrypt(mechanism, key, data)
            .map_err(HsmError::provider("C_Decrypt"))
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState;

    #[test]
    fn test_session_state_is_strictly_forward() {
        let mut state = SessionState::Unloaded;
        let mut seen = vec![state];
        while let Some(next) = state.next() {
            assert!(next > state);
            state = next;
            seen.push(state);
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(state, SessionState::Finalized);
    }

    #[test]
    fn test_authenticated_precedes_logout() {
        assert_eq!(SessionState::Authenticated.next(), Some(SessionState::LoggedOut));
        assert!(SessionState::SessionOpen < SessionState::Authenticated);
        assert_eq!(SessionState::Finalized.next(), None);
    }
}
