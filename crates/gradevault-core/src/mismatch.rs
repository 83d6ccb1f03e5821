//! What to do when a user's password no longer matches their history.
//!
//! A save that fails verification yields a [`MismatchResolver`] in the
//! [`MismatchState::Undecided`] state. The caller asks the user and feeds the
//! answer back through [`MismatchResolver::resolve`]:
//!
//! | Choice   | History                              | Snapshot |
//! |----------|--------------------------------------|----------|
//! | Continue | untouched, still under the old key   | dropped  |
//! | Delete   | wiped, new namespace under new key   | saved    |
//! | Migrate  | re-encrypted from old key to new key | saved    |

use secrecy::SecretString;
use tracing::info;

use crate::crypto::UserKeyContext;
use crate::error::{Result, VaultError};
use crate::storage::{HistoryEngine, HistoryStore, Snapshot};
use crate::vault::Vault;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchState {
    Undecided,
    Continue,
    Delete,
    Migrate,
}

/// The user's answer to a mismatch prompt.
#[derive(Debug)]
pub enum MismatchChoice {
    Continue,
    Delete,
    /// Re-key the history; requires the password it was encrypted with.
    Migrate { old_password: SecretString },
}

/// Result of [`Vault::save_snapshot`].
#[derive(Debug)]
pub enum SaveAttempt {
    Saved(i64),
    Mismatch(MismatchResolver),
}

/// Result of resolving a mismatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved(i64),
    Skipped,
}

/// Pending mismatch decision for one user.
#[derive(Debug)]
pub struct MismatchResolver {
    vault: Vault,
    context: UserKeyContext,
    store: Option<HistoryStore>,
    state: MismatchState,
}

impl MismatchResolver {
    pub(crate) fn new(vault: Vault, context: UserKeyContext, store: HistoryStore) -> Self {
        Self {
            vault,
            context,
            store: Some(store),
            state: MismatchState::Undecided,
        }
    }

    pub fn state(&self) -> MismatchState {
        self.state
    }

    pub fn username(&self) -> &str {
        self.context.username()
    }

    fn take_store(&mut self) -> Result<HistoryStore> {
        match self.store.take() {
            Some(store) => Ok(store),
            None => self.vault.open(&self.context),
        }
    }

    /// Apply the user's choice and, unless it was `Continue`, save `snapshot`.
    ///
    /// The state records the choice as soon as the history itself has
    /// changed, so a failed save afterwards still reports `Delete` or
    /// `Migrate`. A snapshot whose timestamp the migrated history already
    /// holds yields [`SaveOutcome::Skipped`].
    ///
    /// # Errors
    ///
    /// - `VaultError::InvalidInput` if a choice was already applied
    /// - `VaultError::CredentialMismatch` if the old password given for
    ///   `Migrate` is wrong; the resolver stays undecided and can be retried
    pub fn resolve<S: Snapshot>(&mut self, choice: MismatchChoice, snapshot: &S) -> Result<SaveOutcome> {
        if self.state != MismatchState::Undecided {
            return Err(VaultError::InvalidInput(format!(
                "Mismatch already resolved as {:?}",
                self.state
            )));
        }

        match choice {
            MismatchChoice::Continue => {
                info!(user = %self.username(), "Keeping history under previous password; snapshot not saved");
                self.state = MismatchState::Continue;
                Ok(SaveOutcome::Skipped)
            }
            MismatchChoice::Delete => {
                self.take_store()?.wipe()?;
                self.state = MismatchState::Delete;
                info!(user = %self.username(), "Deleted history");

                let store = self.vault.create_new(&self.context)?;
                store.save(snapshot)?;
                Ok(SaveOutcome::Saved(snapshot.timestamp()))
            }
            MismatchChoice::Migrate { old_password } => {
                let mut store = self.take_store()?;
                if let Err(err) = store.migrate(&old_password, self.context.password()) {
                    self.store = Some(store);
                    return Err(err);
                }
                self.state = MismatchState::Migrate;
                info!(user = %self.username(), "Migrated history to new password");

                match store.save(snapshot) {
                    Ok(()) => Ok(SaveOutcome::Saved(snapshot.timestamp())),
                    Err(VaultError::DuplicateSnapshot(timestamp)) => {
                        info!(user = %self.username(), timestamp, "Snapshot already in migrated history");
                        Ok(SaveOutcome::Skipped)
                    }
                    Err(err) => Err(err),
                }
            }
        }
    }
}
