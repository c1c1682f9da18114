//
// Passphrase entry: environment first, then the terminal
//
use rpassword::prompt_password;
use zeroize::Zeroizing;

/// environment variable checked before prompting
pub const PASSWORD_VAR: &str = "VAULT_PASSWORD";

/// Where the passphrase came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Env,
    Prompt,
}

/// Get password from terminal.
/// If password is non-empty, returns Some(p), otherwise prints error message and returns None.
///
/// Single prompt. For new vaults, follow up with confirm_new.
pub fn get_password(prompt: &str) -> Option<Zeroizing<String>> {
    if let Ok(p) = prompt_password(prompt) {
        let p = Zeroizing::new(p);
        if !p.is_empty() {
            return Some(p);
        }
        eprintln!("Password may not be empty.")
    }
    None
}

/// Returns the passphrase from VAULT_PASSWORD, or asks for it
pub fn read_passphrase() -> Option<(Zeroizing<String>, Source)> {
    match std::env::var(PASSWORD_VAR) {
        Ok(p) if !p.is_empty() => Some((Zeroizing::new(p), Source::Env)),
        _ => get_password("Vault password: ").map(|p| (p, Source::Prompt)),
    }
}

/// Asks for the passphrase a second time, when it is about to protect a
/// new vault. Passphrases from the environment are not re-checked.
pub fn confirm_new(passphrase: &str, source: Source) -> bool {
    if source == Source::Env {
        return true;
    }
    match get_password("New vault. Repeat password: ") {
        Some(again) if again.as_str() == passphrase => true,
        Some(_) => {
            eprintln!("Passwords did not match.");
            false
        }
        None => false,
    }
}
