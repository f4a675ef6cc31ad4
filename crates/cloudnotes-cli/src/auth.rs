//! App password persistence in the system keychain, one entry per profile.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;

use crate::error::CliError;

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "cloudnotes-cli";

type StoreResult<T> = Result<T, CliError>;

#[derive(Clone)]
struct AppPasswordStore {
    username: String,
}

impl AppPasswordStore {
    fn new(profile_name: &str) -> Self {
        Self {
            username: format!("app_password:{profile_name}"),
        }
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self) -> StoreResult<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username)
            .map_err(|error| CliError::Keychain(error.to_string()))
    }

    #[cfg(not(test))]
    fn load(&self) -> StoreResult<Option<String>> {
        match self.entry()?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(CliError::Keychain(error.to_string())),
        }
    }

    #[cfg(test)]
    fn load(&self) -> StoreResult<Option<String>> {
        let guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Keychain(error.to_string()))?;
        Ok(guard.get(&self.username).cloned())
    }

    #[cfg(not(test))]
    fn save(&self, password: &str) -> StoreResult<()> {
        self.entry()?
            .set_password(password)
            .map_err(|error| CliError::Keychain(error.to_string()))
    }

    #[cfg(test)]
    fn save(&self, password: &str) -> StoreResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Keychain(error.to_string()))?;
        guard.insert(self.username.clone(), password.to_string());
        Ok(())
    }

    #[cfg(not(test))]
    fn clear(&self) -> StoreResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(CliError::Keychain(error.to_string())),
        }
    }

    #[cfg(test)]
    fn clear(&self) -> StoreResult<()> {
        let mut guard = Self::test_store()
            .lock()
            .map_err(|error| CliError::Keychain(error.to_string()))?;
        guard.remove(&self.username);
        Ok(())
    }
}

pub fn load_app_password(profile_name: &str) -> StoreResult<Option<String>> {
    AppPasswordStore::new(profile_name)
        .load()
        .map(|password| password.filter(|password| !password.is_empty()))
}

pub fn save_app_password(profile_name: &str, password: &str) -> StoreResult<()> {
    AppPasswordStore::new(profile_name).save(password)
}

pub fn clear_app_password(profile_name: &str) -> StoreResult<()> {
    AppPasswordStore::new(profile_name).clear()
}
